use std::fmt;

use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Number, Value};

use crate::spec::ParamLocation;

/// An uploaded `file` form part.
#[derive(Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Decoded form body: text fields in arrival order plus file parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FileHandle>,
}

impl FormData {
    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn file(&self, name: &str) -> Option<&FileHandle> {
        self.files.iter().find(|f| f.field == name)
    }
}

/// A parameter value coerced to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Array(Vec<ParamValue>),
    File(FileHandle),
    /// Body parameters and object-typed values.
    Json(Value),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParamValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// JSON view used for schema validation and handler payloads.
    ///
    /// Dates and bytes render back to their wire text so `format` checks
    /// see what the client sent; files render as their metadata.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
            ParamValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            ParamValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            ParamValue::Array(items) => Value::Array(items.iter().map(ParamValue::to_json).collect()),
            ParamValue::File(file) => {
                let mut obj = Map::new();
                obj.insert("field".into(), Value::String(file.field.clone()));
                if let Some(name) = &file.filename {
                    obj.insert("filename".into(), Value::String(name.clone()));
                }
                obj.insert("size".into(), Value::from(file.bytes.len()));
                Value::Object(obj)
            }
            ParamValue::Json(v) => v.clone(),
        }
    }
}

/// One bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub location: ParamLocation,
    pub value: ParamValue,
}

/// Typed parameters of one request, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundRequest {
    params: Vec<BoundParam>,
}

impl BoundRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, location: ParamLocation, value: ParamValue) {
        self.params.push(BoundParam {
            name: name.to_string(),
            location,
            value,
        });
    }

    /// First parameter with this name, whatever its location.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn get_in(&self, name: &str, location: ParamLocation) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|p| p.name == name && p.location == location)
            .map(|p| &p.value)
    }

    /// The body parameter's value, if one was bound.
    pub fn body(&self) -> Option<&Value> {
        self.params
            .iter()
            .find(|p| p.location == ParamLocation::Body)
            .and_then(|p| p.value.as_json())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `{name: value}` object of every non-body parameter.
    pub fn params_json(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .filter(|p| p.location != ParamLocation::Body)
                .map(|p| (p.name.clone(), p.value.to_json()))
                .collect(),
        )
    }
}
