//! Schema compilation into an index arena.
//!
//! JSON schemas are compiled once, at startup, into [`SchemaNode`]s stored in
//! a [`SchemaArena`] and addressed by [`SchemaId`]. `$ref`s are resolved at
//! compile time against the root document and memoized by JSON pointer, so a
//! self-referential definition compiles to a cycle in the index graph instead
//! of an infinite tree. Regexes (`pattern`, `patternProperties`) are compiled
//! here too; nothing is parsed on the request path.

use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("could not resolve reference {0:?}")]
    UnresolvedRef(String),
    #[error("only local references are supported, got {0:?}")]
    UnsupportedRef(String),
    #[error("unknown type {0:?}")]
    UnknownType(String),
    #[error("invalid value for {keyword}: {reason}")]
    InvalidKeyword { keyword: &'static str, reason: String },
}

/// Index of a compiled schema inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u32);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => JsonType::Null,
            "boolean" => JsonType::Boolean,
            "integer" => JsonType::Integer,
            "number" => JsonType::Number,
            "string" => JsonType::String,
            "array" => JsonType::Array,
            "object" => JsonType::Object,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Items {
    /// Every element validates against one schema.
    Single(SchemaId),
    /// Positional validation; extras fall to `additionalItems`.
    Tuple(Vec<SchemaId>),
}

/// `additionalItems` / `additionalProperties`.
#[derive(Debug, Clone)]
pub enum Additional {
    Allowed(bool),
    Schema(SchemaId),
}

impl Default for Additional {
    fn default() -> Self {
        Additional::Allowed(true)
    }
}

#[derive(Debug, Clone)]
pub enum Dependency {
    Properties(Vec<String>),
    Schema(SchemaId),
}

#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub regex: Regex,
    pub schema: SchemaId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub limit: f64,
    pub exclusive: bool,
}

/// One compiled schema. Every keyword is optional; an empty node accepts
/// any value.
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    /// Empty means unconstrained.
    pub types: Vec<JsonType>,
    pub format: Option<String>,
    pub enumeration: Option<Vec<Value>>,
    pub default: Option<Value>,

    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,

    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub multiple_of: Option<f64>,

    pub items: Option<Items>,
    pub additional_items: Additional,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,

    pub properties: Vec<(String, SchemaId)>,
    pub required: Vec<String>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub additional_properties: Additional,
    pub pattern_properties: Vec<PatternProperty>,

    pub all_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub not: Option<SchemaId>,
    pub dependencies: Vec<(String, Dependency)>,
}

impl SchemaNode {
    pub fn property(&self, name: &str) -> Option<SchemaId> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, id)| *id)
    }

    pub fn type_names(&self) -> String {
        self.types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Owner of all compiled schemas for one API document.
#[derive(Debug, Clone)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
    root: Value,
    refs: HashMap<String, SchemaId>,
}

impl Default for SchemaArena {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl SchemaArena {
    /// `root` is the document `$ref`s resolve against (usually the whole API
    /// document, so that `#/definitions/Pet` works).
    pub fn new(root: Value) -> Self {
        Self {
            nodes: Vec::new(),
            root,
            refs: HashMap::new(),
        }
    }

    pub fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Compile `schema` and everything it references.
    pub fn compile(&mut self, schema: &Value) -> Result<SchemaId, SchemaError> {
        if let Some(obj) = schema.as_object() {
            if let (1, Some(reference)) = (obj.len(), obj.get("$ref").and_then(Value::as_str)) {
                return self.compile_ref(reference);
            }
        }
        let node = self.build_node(schema)?;
        Ok(self.push(node))
    }

    /// Compile the schema a local `$ref` points at, reusing a previous
    /// compilation of the same pointer.
    pub fn compile_ref(&mut self, reference: &str) -> Result<SchemaId, SchemaError> {
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| SchemaError::UnsupportedRef(reference.to_string()))?;
        if let Some(id) = self.refs.get(pointer) {
            return Ok(*id);
        }
        let target = self
            .root
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;

        // Reserve the slot before descending so recursive refs find it.
        let id = self.push(SchemaNode::default());
        self.refs.insert(pointer.to_string(), id);
        match self.build_node(&target) {
            Ok(node) => {
                self.nodes[id.index()] = node;
                Ok(id)
            }
            Err(err) => {
                self.refs.remove(pointer);
                Err(err)
            }
        }
    }

    fn push(&mut self, node: SchemaNode) -> SchemaId {
        let id = SchemaId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn build_node(&mut self, schema: &Value) -> Result<SchemaNode, SchemaError> {
        let obj = match schema {
            Value::Object(obj) => obj,
            Value::Bool(true) => return Ok(SchemaNode::default()),
            Value::Bool(false) => {
                let anything = self.push(SchemaNode::default());
                return Ok(SchemaNode {
                    not: Some(anything),
                    ..SchemaNode::default()
                });
            }
            other => {
                return Err(SchemaError::InvalidKeyword {
                    keyword: "schema",
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let mut node = SchemaNode::default();

        // A $ref with siblings: the siblings still apply, the target is
        // folded in through allOf.
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let target = self.compile_ref(reference)?;
            node.all_of.push(target);
        }

        node.types = parse_types(obj.get("type"))?;
        node.format = obj.get("format").and_then(Value::as_str).map(str::to_string);
        node.enumeration = match obj.get("enum") {
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => return Err(invalid("enum", "expected an array")),
            None => None,
        };
        node.default = obj.get("default").cloned();

        node.min_length = usize_keyword(obj, "minLength")?;
        node.max_length = usize_keyword(obj, "maxLength")?;
        node.pattern = match obj.get("pattern").and_then(Value::as_str) {
            Some(p) => Some(compile_regex(p)?),
            None => None,
        };

        node.minimum = bound(obj, "minimum", "exclusiveMinimum", |a, b| a > b)?;
        node.maximum = bound(obj, "maximum", "exclusiveMaximum", |a, b| a < b)?;
        node.multiple_of = match obj.get("multipleOf") {
            Some(v) => match v.as_f64() {
                Some(m) if m > 0.0 => Some(m),
                _ => return Err(invalid("multipleOf", "expected a number greater than 0")),
            },
            None => None,
        };

        node.items = match obj.get("items") {
            Some(Value::Array(list)) => Some(Items::Tuple(self.compile_all(list)?)),
            Some(single) => Some(Items::Single(self.compile(single)?)),
            None => None,
        };
        node.additional_items = self.additional(obj.get("additionalItems"))?;
        node.min_items = usize_keyword(obj, "minItems")?;
        node.max_items = usize_keyword(obj, "maxItems")?;
        node.unique_items = obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);

        if let Some(props) = obj.get("properties") {
            let props = props
                .as_object()
                .ok_or_else(|| invalid("properties", "expected an object"))?;
            for (name, schema) in props {
                let id = self.compile(schema)?;
                node.properties.push((name.clone(), id));
            }
        }
        node.required = match obj.get("required") {
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid("required", "expected an array of strings"))
                })
                .collect::<Result<_, _>>()?,
            // Swagger parameters use a boolean `required`; not a schema keyword.
            Some(Value::Bool(_)) | None => Vec::new(),
            Some(_) => return Err(invalid("required", "expected an array of strings")),
        };
        node.min_properties = usize_keyword(obj, "minProperties")?;
        node.max_properties = usize_keyword(obj, "maxProperties")?;
        node.additional_properties = self.additional(obj.get("additionalProperties"))?;
        if let Some(patterns) = obj.get("patternProperties") {
            let patterns = patterns
                .as_object()
                .ok_or_else(|| invalid("patternProperties", "expected an object"))?;
            for (pattern, schema) in patterns {
                let regex = compile_regex(pattern)?;
                let schema = self.compile(schema)?;
                node.pattern_properties.push(PatternProperty { regex, schema });
            }
        }

        node.all_of.extend(self.compile_list(obj, "allOf")?);
        node.any_of = self.compile_list(obj, "anyOf")?;
        node.one_of = self.compile_list(obj, "oneOf")?;
        node.not = match obj.get("not") {
            Some(schema) => Some(self.compile(schema)?),
            None => None,
        };
        if let Some(deps) = obj.get("dependencies") {
            let deps = deps
                .as_object()
                .ok_or_else(|| invalid("dependencies", "expected an object"))?;
            for (key, dep) in deps {
                let dependency = match dep {
                    Value::Array(names) => Dependency::Properties(
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect(),
                    ),
                    schema => Dependency::Schema(self.compile(schema)?),
                };
                node.dependencies.push((key.clone(), dependency));
            }
        }

        Ok(node)
    }

    fn compile_all(&mut self, schemas: &[Value]) -> Result<Vec<SchemaId>, SchemaError> {
        schemas.iter().map(|s| self.compile(s)).collect()
    }

    fn compile_list(
        &mut self,
        obj: &Map<String, Value>,
        keyword: &'static str,
    ) -> Result<Vec<SchemaId>, SchemaError> {
        match obj.get(keyword) {
            Some(Value::Array(list)) => self.compile_all(list),
            Some(_) => Err(invalid(keyword, "expected an array of schemas")),
            None => Ok(Vec::new()),
        }
    }

    fn additional(&mut self, value: Option<&Value>) -> Result<Additional, SchemaError> {
        Ok(match value {
            None => Additional::Allowed(true),
            Some(Value::Bool(allowed)) => Additional::Allowed(*allowed),
            Some(schema) => Additional::Schema(self.compile(schema)?),
        })
    }
}

fn invalid(keyword: &'static str, reason: &str) -> SchemaError {
    SchemaError::InvalidKeyword {
        keyword,
        reason: reason.to_string(),
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

fn parse_types(value: Option<&Value>) -> Result<Vec<JsonType>, SchemaError> {
    let names: Vec<&str> = match value {
        None => return Ok(Vec::new()),
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
        Some(_) => return Err(invalid("type", "expected a string or an array of strings")),
    };
    let mut types = Vec::with_capacity(names.len());
    for name in names {
        // Swagger's `file` only appears on formData parameters and responses;
        // there is no JSON value to constrain.
        if name == "file" {
            continue;
        }
        types.push(JsonType::parse(name).ok_or_else(|| SchemaError::UnknownType(name.to_string()))?);
    }
    Ok(types)
}

fn usize_keyword(obj: &Map<String, Value>, keyword: &'static str) -> Result<Option<usize>, SchemaError> {
    match obj.get(keyword) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid(keyword, "expected a non-negative integer")),
    }
}

/// Reads `minimum`/`maximum` with either the boolean (draft 4) or the numeric
/// (draft 6) form of the exclusive keyword. When both numeric forms are
/// present the tighter one wins.
fn bound(
    obj: &Map<String, Value>,
    keyword: &'static str,
    exclusive_keyword: &'static str,
    tighter: fn(f64, f64) -> bool,
) -> Result<Option<Bound>, SchemaError> {
    let limit = match obj.get(keyword) {
        Some(v) => Some(v.as_f64().ok_or_else(|| invalid(keyword, "expected a number"))?),
        None => None,
    };
    Ok(match (limit, obj.get(exclusive_keyword)) {
        (Some(limit), Some(Value::Bool(exclusive))) => Some(Bound {
            limit,
            exclusive: *exclusive,
        }),
        (limit, Some(Value::Number(n))) => {
            let exclusive_limit = n
                .as_f64()
                .ok_or_else(|| invalid(exclusive_keyword, "expected a number"))?;
            match limit {
                Some(inclusive) if tighter(inclusive, exclusive_limit) => Some(Bound {
                    limit: inclusive,
                    exclusive: false,
                }),
                _ => Some(Bound {
                    limit: exclusive_limit,
                    exclusive: true,
                }),
            }
        }
        (Some(limit), _) => Some(Bound {
            limit,
            exclusive: false,
        }),
        (None, _) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_recursive_definition() {
        let doc = json!({
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "integer"},
                        "next": {"$ref": "#/definitions/Node"}
                    }
                }
            }
        });
        let mut arena = SchemaArena::new(doc);
        let id = arena.compile(&json!({"$ref": "#/definitions/Node"})).unwrap();
        let next = arena.get(id).property("next").unwrap();
        assert_eq!(next, id);
        // Compiling the same ref again reuses the slot.
        let again = arena.compile_ref("#/definitions/Node").unwrap();
        assert_eq!(again, id);
    }

    #[test]
    fn test_compile_rejects_bad_input() {
        let mut arena = SchemaArena::default();
        assert!(matches!(
            arena.compile(&json!({"pattern": "(unclosed"})),
            Err(SchemaError::InvalidRegex { .. })
        ));
        assert!(matches!(
            arena.compile(&json!({"$ref": "#/definitions/Missing"})),
            Err(SchemaError::UnresolvedRef(_))
        ));
        assert!(matches!(
            arena.compile(&json!({"$ref": "other.json#/Pet"})),
            Err(SchemaError::UnsupportedRef(_))
        ));
        assert!(matches!(
            arena.compile(&json!({"type": "decimal"})),
            Err(SchemaError::UnknownType(_))
        ));
    }

    #[test]
    fn test_exclusive_bounds_both_drafts() {
        let mut arena = SchemaArena::default();
        let draft4 = arena
            .compile(&json!({"maximum": 10, "exclusiveMaximum": true}))
            .unwrap();
        assert_eq!(
            arena.get(draft4).maximum,
            Some(Bound {
                limit: 10.0,
                exclusive: true
            })
        );
        let draft6 = arena.compile(&json!({"exclusiveMinimum": 3})).unwrap();
        assert_eq!(
            arena.get(draft6).minimum,
            Some(Bound {
                limit: 3.0,
                exclusive: true
            })
        );
    }

    #[test]
    fn test_tuple_items_and_additional() {
        let mut arena = SchemaArena::default();
        let id = arena
            .compile(&json!({
                "items": [{"type": "string"}, {"type": "integer"}],
                "additionalItems": false
            }))
            .unwrap();
        let node = arena.get(id);
        assert!(matches!(node.items, Some(Items::Tuple(ref ids)) if ids.len() == 2));
        assert!(matches!(node.additional_items, Additional::Allowed(false)));
    }
}
