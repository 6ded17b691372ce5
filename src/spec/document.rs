use std::collections::{BTreeMap, BTreeSet};

use http::Method;
use serde_json::Value;

use super::types::{Operation, ParamLocation, Parameter, ParameterOrRef, PathItem, SecurityRequirement, SecurityScheme, SwaggerDoc};

/// One `(method, path template)` pair with its operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationRef<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub operation: &'a Operation,
}

impl OperationRef<'_> {
    /// `operationId`, or `METHOD /path` for anonymous operations.
    pub fn display_id(&self) -> String {
        match &self.operation.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }
}

/// Immutable in-memory API document.
///
/// Keeps both the typed [`SwaggerDoc`] and the raw JSON tree: schemas and
/// `$ref`s are resolved against the raw tree, everything else is read from
/// the typed model.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    raw: Value,
    doc: SwaggerDoc,
    operations: Vec<(Method, String)>,
}

impl SpecDocument {
    pub fn from_value(raw: Value) -> anyhow::Result<Self> {
        let doc: SwaggerDoc = serde_json::from_value(raw.clone())?;
        if !doc.swagger.is_empty() && doc.swagger != "2.0" {
            anyhow::bail!("unsupported swagger version {:?}, expected \"2.0\"", doc.swagger);
        }
        let mut operations: Vec<(Method, String)> = doc
            .paths
            .iter()
            .flat_map(|(path, item)| item.operations().map(move |(method, _)| (method, path.clone())))
            .collect();
        operations.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        Ok(Self { raw, doc, operations })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn doc(&self) -> &SwaggerDoc {
        &self.doc
    }

    /// `basePath` without a trailing slash; empty when absent or `/`.
    pub fn base_path(&self) -> &str {
        self.doc
            .base_path
            .as_deref()
            .map(|p| p.trim_end_matches('/'))
            .unwrap_or("")
    }

    pub fn paths(&self) -> impl Iterator<Item = (&str, &PathItem)> {
        self.doc.paths.iter().map(|(path, item)| (path.as_str(), item))
    }

    /// Every operation, sorted by path then method.
    pub fn operations(&self) -> Vec<OperationRef<'_>> {
        self.operations
            .iter()
            .filter_map(|(method, path)| {
                let operation = self.doc.paths.get(path)?.operation(method)?;
                Some(OperationRef {
                    method,
                    path: path.as_str(),
                    operation,
                })
            })
            .collect()
    }

    pub fn operation(&self, method: &Method, path: &str) -> Option<&Operation> {
        self.doc.paths.get(path)?.operation(method)
    }

    /// Resolve a parameter list entry; `None` for a dangling `$ref`.
    pub fn resolve_parameter<'a>(&'a self, entry: &'a ParameterOrRef) -> Option<&'a Parameter> {
        match entry {
            ParameterOrRef::Parameter(p) => Some(p),
            ParameterOrRef::Ref { reference } => {
                let name = reference.strip_prefix("#/parameters/")?;
                self.doc.parameters.get(name)
            }
        }
    }

    /// Effective parameters of an operation: path-level parameters with
    /// operation-level ones overriding on (name, location). Dangling refs
    /// are skipped; `SpecValidator` reports them.
    pub fn params_for(&self, method: &Method, path: &str) -> Vec<Parameter> {
        let Some(item) = self.doc.paths.get(path) else {
            return Vec::new();
        };
        let mut params: Vec<Parameter> = item
            .parameters
            .iter()
            .filter_map(|p| self.resolve_parameter(p))
            .cloned()
            .collect();
        if let Some(op) = item.operation(method) {
            for param in op.parameters.iter().filter_map(|p| self.resolve_parameter(p)) {
                match params
                    .iter_mut()
                    .find(|existing| existing.name == param.name && existing.location == param.location)
                {
                    Some(existing) => *existing = param.clone(),
                    None => params.push(param.clone()),
                }
            }
        }
        params
    }

    /// Operation `consumes`, falling back to the document default.
    pub fn consumes_for(&self, op: &Operation) -> Vec<String> {
        match &op.consumes {
            Some(list) if !list.is_empty() => list.clone(),
            _ => self.doc.consumes.clone(),
        }
    }

    pub fn produces_for(&self, op: &Operation) -> Vec<String> {
        match &op.produces {
            Some(list) if !list.is_empty() => list.clone(),
            _ => self.doc.produces.clone(),
        }
    }

    /// Operation `security`, falling back to the document default. An
    /// explicit empty list on the operation disables authentication.
    pub fn security_requirements_for(&self, op: &Operation) -> Vec<SecurityRequirement> {
        match &op.security {
            Some(list) => list.clone(),
            None => self.doc.security.clone(),
        }
    }

    /// The `securityDefinitions` entries referenced by an operation.
    pub fn security_definitions_for(&self, op: &Operation) -> BTreeMap<String, SecurityScheme> {
        self.security_requirements_for(op)
            .iter()
            .flat_map(|req| req.keys())
            .filter_map(|name| {
                self.doc
                    .security_definitions
                    .get(name)
                    .map(|scheme| (name.clone(), scheme.clone()))
            })
            .collect()
    }

    pub fn security_definitions(&self) -> &BTreeMap<String, SecurityScheme> {
        &self.doc.security_definitions
    }

    pub fn operation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .operations()
            .iter()
            .filter_map(|op| op.operation.operation_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Media types consumed by operations that take a body.
    pub fn required_consumes(&self) -> BTreeSet<String> {
        self.operations()
            .iter()
            .filter(|op| {
                self.params_for(op.method, op.path)
                    .iter()
                    .any(|p| matches!(p.location, ParamLocation::Body | ParamLocation::FormData))
            })
            .flat_map(|op| self.consumes_for(op.operation))
            .collect()
    }

    pub fn required_produces(&self) -> BTreeSet<String> {
        self.operations()
            .iter()
            .flat_map(|op| self.produces_for(op.operation))
            .collect()
    }

    /// Security scheme names referenced anywhere.
    pub fn required_schemes(&self) -> BTreeSet<String> {
        self.operations()
            .iter()
            .flat_map(|op| self.security_requirements_for(op.operation))
            .flat_map(|req| req.into_keys())
            .collect()
    }
}
