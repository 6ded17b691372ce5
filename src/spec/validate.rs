//! Startup consistency checks for an API document.
//!
//! Run once before any route is built. Every problem found is collected;
//! the pipeline builder refuses to start on a non-empty result.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::document::{OperationRef, SpecDocument};
use super::types::{CollectionFormat, ParamLocation, Parameter, ParameterOrRef, SecurityRequirement, SimpleSchema};
use crate::errors::{ConfigError, ValidationError, ValidationErrorKind};
use crate::formats::FormatRegistry;
use crate::validator::{SchemaArena, SchemaValidator, ValidationResult};

static PATH_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}/]+)\}").expect("path param regex should be valid"));

/// A template segment the router can capture: exactly one `{name}`.
static WHOLE_SEGMENT_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{[^{}/]+\}$").expect("segment param regex should be valid"));

/// JSON schema for Swagger 2.0 documents.
const SWAGGER_2_0_SCHEMA: &str = include_str!("swagger_2_0.json");

/// Depth bound when chasing `allOf` refs for required-property lookups.
const MAX_ALL_OF_DEPTH: usize = 8;

/// Validates the internal consistency of a [`SpecDocument`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecValidator;

impl SpecValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, spec: &SpecDocument) -> ValidationResult {
        let mut result = ValidationResult::new();
        let operations = spec.operations();

        check_document_schema(spec, &mut result);
        check_path_templates(spec, &mut result);
        check_operation_ids(&operations, &mut result);
        check_overlaps(spec, &mut result);

        for (path, item) in spec.paths() {
            check_duplicates(spec, &item.parameters, &format!("path {path}"), &mut result);
            check_unresolved(spec, &item.parameters, &format!("path {path}"), &mut result);
        }

        for op in &operations {
            let op_id = op.display_id();
            check_duplicates(spec, &op.operation.parameters, &format!("operation {op_id:?}"), &mut result);
            check_unresolved(spec, &op.operation.parameters, &format!("operation {op_id:?}"), &mut result);

            let params = spec.params_for(op.method, op.path);
            check_body_params(&params, &op_id, &mut result);
            check_path_params(op.path, &params, &op_id, &mut result);
            check_collection_formats(&params, &op_id, &mut result);
            check_untyped_collections(op, &params, &op_id, &mut result);
            check_security(&spec.security_requirements_for(op.operation), spec, &op_id, &mut result);
        }
        check_security(&spec.doc().security, spec, "document", &mut result);

        for (name, schema) in &spec.doc().definitions {
            let context = format!("definition {name:?}");
            visit_schemas(schema, &mut |node| {
                untyped_schema(node, &context, &mut result);
                required_not_defined(node, spec.raw(), name, &mut result);
            });
        }

        check_schemas_compile(spec, &operations, &mut result);

        if result.is_valid() {
            info!(operations = operations.len(), "API document validated");
        } else {
            for error in result.errors() {
                warn!(kind = %error.kind, path = %error.path, message = %error.message, "API document issue");
            }
        }
        result
    }

    /// `Err(ConfigError::InvalidSpec)` unless the document is consistent.
    pub fn ensure_valid(&self, spec: &SpecDocument) -> Result<(), ConfigError> {
        self.validate(spec).into_result().map_err(ConfigError::InvalidSpec)
    }
}

fn structural(kind: ValidationErrorKind, path: impl Into<String>, message: String) -> ValidationError {
    ValidationError::structural(kind, path, message)
}

/// The raw document against the Swagger 2.0 schema. Violations are
/// reported alongside the semantic checks below.
fn check_document_schema(spec: &SpecDocument, result: &mut ValidationResult) {
    let meta: Value = match serde_json::from_str(SWAGGER_2_0_SCHEMA) {
        Ok(meta) => meta,
        Err(err) => {
            result.add_error(structural(
                ValidationErrorKind::InvalidSchema,
                "",
                format!("Swagger 2.0 schema is unreadable: {err}"),
            ));
            return;
        }
    };
    let mut arena = SchemaArena::new(meta.clone());
    let root = match arena.compile(&meta) {
        Ok(root) => root,
        Err(err) => {
            result.add_error(structural(
                ValidationErrorKind::InvalidSchema,
                "",
                format!("Swagger 2.0 schema does not compile: {err}"),
            ));
            return;
        }
    };
    let formats = FormatRegistry::with_defaults();
    let violations = SchemaValidator::new(&arena, &formats).validate(root, spec.raw());
    for error in violations.errors() {
        result.add_error(structural(
            ValidationErrorKind::DocumentSchema,
            error.path.as_str(),
            format!("document does not conform to Swagger 2.0: {}", error.message),
        ));
    }
}

/// Templated segments must be a single whole `{name}`; the router cannot
/// capture a parameter that shares its segment with literal text.
fn check_path_templates(spec: &SpecDocument, result: &mut ValidationResult) {
    for (path, _) in spec.paths() {
        for segment in path.split('/') {
            if (segment.contains('{') || segment.contains('}')) && !WHOLE_SEGMENT_PARAM.is_match(segment) {
                result.add_error(structural(
                    ValidationErrorKind::InvalidPathTemplate,
                    path,
                    format!("path {path} has a template that does not span a whole segment: {segment}"),
                ));
            }
        }
    }
}

fn check_operation_ids(operations: &[OperationRef<'_>], result: &mut ValidationResult) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for op in operations {
        match op.operation.operation_id.as_deref() {
            Some(id) if !id.is_empty() => *counts.entry(id).or_default() += 1,
            _ => result.add_error(structural(
                ValidationErrorKind::MissingOperationId,
                op.path,
                format!("operation {} {} has no operationId", op.method, op.path),
            )),
        }
    }
    for (id, count) in counts.into_iter().filter(|(_, c)| *c > 1) {
        result.add_error(structural(
            ValidationErrorKind::DuplicateOperationId,
            id,
            format!("{id:?} is defined {count} times"),
        ));
    }
}

/// Templates of the same method that only differ in parameter names match
/// the same requests.
fn check_overlaps(spec: &SpecDocument, result: &mut ValidationResult) {
    let mut seen: HashMap<(String, String), &str> = HashMap::new();
    for (path, item) in spec.paths() {
        let shape = PATH_PARAM.replace_all(path, "!").into_owned();
        for (method, _) in item.operations() {
            let key = (method.to_string(), shape.clone());
            match seen.get(&key) {
                Some(first) => result.add_error(structural(
                    ValidationErrorKind::PathOverlap,
                    path,
                    format!("path {path} overlaps with {first}"),
                )),
                None => {
                    seen.insert(key, path);
                }
            }
        }
    }
}

fn check_duplicates(spec: &SpecDocument, entries: &[ParameterOrRef], context: &str, result: &mut ValidationResult) {
    let mut seen: HashSet<(&str, ParamLocation)> = HashSet::new();
    for param in entries.iter().filter_map(|p| spec.resolve_parameter(p)) {
        if !seen.insert((param.name.as_str(), param.location)) {
            result.add_error(structural(
                ValidationErrorKind::DuplicateParameter,
                param.name.as_str(),
                format!(
                    "duplicate parameter name {:?} for {:?} in {}",
                    param.name,
                    param.location.as_str(),
                    context
                ),
            ));
        }
    }
}

fn check_unresolved(spec: &SpecDocument, entries: &[ParameterOrRef], context: &str, result: &mut ValidationResult) {
    for entry in entries {
        if let ParameterOrRef::Ref { reference } = entry {
            if spec.resolve_parameter(entry).is_none() {
                result.add_error(structural(
                    ValidationErrorKind::UnresolvedReference,
                    reference.as_str(),
                    format!("could not resolve parameter reference {reference:?} in {context}"),
                ));
            }
        }
    }
}

fn check_body_params(params: &[Parameter], op_id: &str, result: &mut ValidationResult) {
    let mut bodies = params.iter().filter(|p| p.is_body());
    let Some(accepted) = bodies.next() else {
        return;
    };
    for dropped in bodies {
        result.add_error(structural(
            ValidationErrorKind::MultipleBodyParams,
            dropped.name.as_str(),
            format!(
                "operation {op_id:?} has more than 1 body param (accepted: {:?}, dropped: {:?})",
                accepted.name, dropped.name
            ),
        ));
    }
}

/// Names of the `{x}` segments of a template.
pub fn template_params(path: &str) -> Vec<&str> {
    PATH_PARAM
        .captures_iter(path)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

fn check_path_params(path: &str, params: &[Parameter], op_id: &str, result: &mut ValidationResult) {
    let in_template = template_params(path);
    let declared: Vec<&str> = params
        .iter()
        .filter(|p| p.location == ParamLocation::Path)
        .map(|p| p.name.as_str())
        .collect();
    for name in &in_template {
        if !declared.contains(name) {
            result.add_error(structural(
                ValidationErrorKind::PathParamUndeclared,
                *name,
                format!("path param {name:?} has no parameter definition in operation {op_id:?}"),
            ));
        }
    }
    for name in &declared {
        if !in_template.contains(name) {
            result.add_error(structural(
                ValidationErrorKind::PathParamNotInPath,
                *name,
                format!("path param {name:?} is not present in the path {path} for operation {op_id:?}"),
            ));
        }
    }
}

fn check_collection_formats(params: &[Parameter], op_id: &str, result: &mut ValidationResult) {
    for param in params {
        if param.simple.collection_format == Some(CollectionFormat::Multi) && !param.location.allows_multi() {
            result.add_error(ValidationError::new(
                ValidationErrorKind::InvalidCollectionFormat,
                param.name.as_str(),
                Some(param.location),
                format!(
                    "the collection format \"multi\" is not supported for the {} param {:?} in operation {op_id:?}",
                    param.location, param.name
                ),
            ));
        }
    }
}

fn untyped_simple(schema: &SimpleSchema, context: &str, result: &mut ValidationResult) {
    let mut current = Some(schema);
    let mut depth = 0;
    while let Some(s) = current {
        if s.is_array() && s.items.is_none() {
            let what = " items".repeat(depth);
            result.add_error(structural(
                ValidationErrorKind::UntypedCollection,
                context,
                format!("{context}{what} is a collection without an element type"),
            ));
        }
        current = s.items.as_deref();
        depth += 1;
    }
}

fn untyped_schema(node: &Map<String, Value>, context: &str, result: &mut ValidationResult) {
    if node.get("type").and_then(Value::as_str) == Some("array") && !node.contains_key("items") {
        result.add_error(structural(
            ValidationErrorKind::UntypedCollection,
            context,
            format!("{context} has a collection without an element type"),
        ));
    }
}

fn check_untyped_collections(op: &OperationRef<'_>, params: &[Parameter], op_id: &str, result: &mut ValidationResult) {
    for param in params {
        match (&param.schema, param.is_body()) {
            (Some(schema), true) => {
                let context = format!("body param {:?} for {op_id:?}", param.name);
                visit_schemas(schema, &mut |node| untyped_schema(node, &context, result));
            }
            _ => untyped_simple(&param.simple, &format!("param {:?} for {op_id:?}", param.name), result),
        }
    }
    for (code, response) in &op.operation.responses {
        if let Some(schema) = &response.schema {
            let context = format!("response {code:?} for {op_id:?}");
            visit_schemas(schema, &mut |node| untyped_schema(node, &context, result));
        }
        for (name, header) in &response.headers {
            untyped_simple(
                &header.simple,
                &format!("header {name:?} in response {code:?} for {op_id:?}"),
                result,
            );
        }
    }
}

fn check_security(requirements: &[SecurityRequirement], spec: &SpecDocument, context: &str, result: &mut ValidationResult) {
    for name in requirements.iter().flat_map(|r| r.keys()) {
        if !spec.security_definitions().contains_key(name) {
            result.add_error(structural(
                ValidationErrorKind::UnknownSecurityScheme,
                name.as_str(),
                format!("security requirement {name:?} for {context:?} has no matching securityDefinitions entry"),
            ));
        }
    }
}

/// Calls `visit` on every inline schema object reachable from `schema`
/// without following `$ref`s.
fn visit_schemas(schema: &Value, visit: &mut dyn FnMut(&Map<String, Value>)) {
    let Value::Object(node) = schema else {
        return;
    };
    visit(node);
    for keyword in ["properties", "patternProperties", "definitions"] {
        if let Some(Value::Object(children)) = node.get(keyword) {
            for child in children.values() {
                visit_schemas(child, visit);
            }
        }
    }
    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(Value::Array(children)) = node.get(keyword) {
            for child in children {
                visit_schemas(child, visit);
            }
        }
    }
    match node.get("items") {
        Some(Value::Array(children)) => children.iter().for_each(|c| visit_schemas(c, visit)),
        Some(child) => visit_schemas(child, visit),
        None => {}
    }
    for keyword in ["additionalProperties", "additionalItems", "not"] {
        if let Some(child @ Value::Object(_)) = node.get(keyword) {
            visit_schemas(child, visit);
        }
    }
}

fn required_not_defined(node: &Map<String, Value>, root: &Value, definition: &str, result: &mut ValidationResult) {
    let Some(Value::Array(required)) = node.get("required") else {
        return;
    };
    for name in required.iter().filter_map(Value::as_str) {
        if !property_defined(node, name, root, 0) {
            result.add_error(structural(
                ValidationErrorKind::RequiredNotDefined,
                definition,
                format!("{name:?} is present in required but not defined as property in definition {definition:?}"),
            ));
        }
    }
}

fn property_defined(node: &Map<String, Value>, name: &str, root: &Value, depth: usize) -> bool {
    if depth > MAX_ALL_OF_DEPTH {
        return true;
    }
    if node
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| props.contains_key(name))
    {
        return true;
    }
    if let Some(Value::Object(patterns)) = node.get("patternProperties") {
        if patterns
            .keys()
            .any(|p| Regex::new(p).map(|re| re.is_match(name)).unwrap_or(false))
        {
            return true;
        }
    }
    match node.get("additionalProperties") {
        Some(Value::Bool(true)) | Some(Value::Object(_)) => return true,
        _ => {}
    }
    let Some(Value::Array(branches)) = node.get("allOf") else {
        return false;
    };
    branches.iter().any(|branch| {
        let resolved = match branch.get("$ref").and_then(Value::as_str) {
            Some(reference) => reference.strip_prefix('#').and_then(|p| root.pointer(p)),
            None => Some(branch),
        };
        resolved
            .and_then(Value::as_object)
            .is_some_and(|obj| property_defined(obj, name, root, depth + 1))
    })
}

/// JSON pointer token escaping (`~` → `~0`, `/` → `~1`).
fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Every schema the pipeline will compile must compile here first:
/// definitions, body and response schemas, and parameter constraints.
fn check_schemas_compile(spec: &SpecDocument, operations: &[OperationRef<'_>], result: &mut ValidationResult) {
    let mut arena = SchemaArena::new(spec.raw().clone());
    for name in spec.doc().definitions.keys() {
        let reference = format!("#/definitions/{}", escape_pointer_token(name));
        if let Err(err) = arena.compile_ref(&reference) {
            result.add_error(structural(
                ValidationErrorKind::InvalidSchema,
                name.as_str(),
                format!("definition {name:?} is invalid: {err}"),
            ));
        }
    }
    for op in operations {
        let op_id = op.display_id();
        for param in spec.params_for(op.method, op.path) {
            if let Err(err) = arena.compile(&param.json_schema()) {
                result.add_error(ValidationError::new(
                    ValidationErrorKind::InvalidSchema,
                    param.name.as_str(),
                    Some(param.location),
                    format!("invalid schema for param {:?} in operation {op_id:?}: {err}", param.name),
                ));
            }
        }
        for (code, response) in &op.operation.responses {
            if let Some(Err(err)) = response.schema.as_ref().map(|s| arena.compile(s)) {
                result.add_error(structural(
                    ValidationErrorKind::InvalidSchema,
                    code.as_str(),
                    format!("invalid schema for response {code:?} in operation {op_id:?}: {err}"),
                ));
            }
        }
    }
}
