//! String → typed value coercion for non-body parameters.

use serde_json::Value;

use super::value::ParamValue;
use crate::formats::{decode_base64, parse_date, parse_date_time};
use crate::spec::{CollectionFormat, SimpleSchema};

const TRUTHY: [&str; 10] = ["true", "1", "yes", "ok", "y", "on", "selected", "checked", "t", "enabled"];

/// Target of a scalar coercion, derived from `type` + `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Date,
    DateTime,
    Byte,
    String,
}

impl ScalarKind {
    pub fn from_schema(type_name: Option<&str>, format: Option<&str>) -> Self {
        match (type_name, format) {
            (Some("boolean"), _) => ScalarKind::Bool,
            (Some("integer"), Some("int32")) => ScalarKind::Int32,
            (Some("integer"), _) => ScalarKind::Int64,
            (Some("number"), Some("float")) => ScalarKind::Float,
            (Some("number"), _) => ScalarKind::Double,
            (_, Some("date")) => ScalarKind::Date,
            (_, Some("date-time")) => ScalarKind::DateTime,
            (_, Some("byte")) => ScalarKind::Byte,
            _ => ScalarKind::String,
        }
    }

    /// Type name used in parse failure messages.
    pub fn expected(self) -> &'static str {
        match self {
            ScalarKind::Bool => "boolean",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "date-time",
            ScalarKind::Byte => "byte",
            ScalarKind::String => "string",
        }
    }
}

/// How one parameter (or one level of `items`) turns text into a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoder {
    Scalar(ScalarKind),
    /// JSON-encoded text, for `object`-typed simple parameters.
    Object,
    Array {
        format: CollectionFormat,
        items: Box<Decoder>,
    },
}

impl Decoder {
    pub fn for_schema(schema: &SimpleSchema) -> Self {
        match schema.type_name.as_deref() {
            Some("array") => Decoder::Array {
                format: schema.collection_format(),
                items: Box::new(
                    schema
                        .items
                        .as_deref()
                        .map(Decoder::for_schema)
                        .unwrap_or(Decoder::Scalar(ScalarKind::String)),
                ),
            },
            Some("object") => Decoder::Object,
            other => Decoder::Scalar(ScalarKind::from_schema(other, schema.format.as_deref())),
        }
    }
}

/// A coercion failure: the offending element path suffix and raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct CoerceError {
    /// `""` for the value itself, `"1"` or `"1.0"` for array elements.
    pub suffix: String,
    pub expected: &'static str,
    pub raw: String,
}

pub fn coerce_scalar(kind: ScalarKind, raw: &str) -> Option<ParamValue> {
    let trimmed = raw.trim();
    match kind {
        ScalarKind::Bool => Some(ParamValue::Bool(is_truthy(trimmed))),
        ScalarKind::Int32 => trimmed.parse::<i32>().ok().map(|i| ParamValue::Int(i64::from(i))),
        ScalarKind::Int64 => trimmed.parse::<i64>().ok().map(ParamValue::Int),
        ScalarKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.abs() <= f64::from(f32::MAX))
            .map(ParamValue::Float),
        ScalarKind::Double => trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(ParamValue::Float),
        ScalarKind::Date => parse_date(trimmed).map(ParamValue::Date),
        ScalarKind::DateTime => parse_date_time(trimmed).map(ParamValue::DateTime),
        ScalarKind::Byte => decode_base64(trimmed).map(ParamValue::Bytes),
        ScalarKind::String => Some(ParamValue::String(raw.to_string())),
    }
}

pub fn is_truthy(raw: &str) -> bool {
    TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(raw))
}

/// Split one collection value, trimming items and dropping empty ones.
/// `multi` has no in-value separator and yields the value whole.
pub fn split_collection(raw: &str, format: CollectionFormat) -> Vec<&str> {
    match format.separator() {
        Some(sep) => raw.split(sep).map(str::trim).filter(|s| !s.is_empty()).collect(),
        None => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed]
            }
        }
    }
}

/// Decode one or more raw occurrences. Several occurrences only reach an
/// array decoder with the `multi` format; otherwise the first is used.
pub fn decode(decoder: &Decoder, occurrences: &[&str]) -> Result<ParamValue, Vec<CoerceError>> {
    match decoder {
        Decoder::Array {
            format: CollectionFormat::Multi,
            items,
        } => decode_items(items, occurrences.iter().flat_map(|raw| split_multi_item(raw, items))),
        Decoder::Array { format, items } => {
            let raw = occurrences.first().copied().unwrap_or("");
            decode_items(items, split_collection(raw, *format).into_iter())
        }
        _ => decode_one(decoder, occurrences.first().copied().unwrap_or("")),
    }
}

/// With `multi`, each occurrence is one element; a nested array element is
/// still split by its own format.
fn split_multi_item<'a>(raw: &'a str, items: &Decoder) -> Vec<&'a str> {
    match items {
        Decoder::Array { .. } => vec![raw],
        _ => split_collection(raw, CollectionFormat::Multi),
    }
}

fn decode_one(decoder: &Decoder, raw: &str) -> Result<ParamValue, Vec<CoerceError>> {
    match decoder {
        Decoder::Scalar(kind) => coerce_scalar(*kind, raw).ok_or_else(|| {
            vec![CoerceError {
                suffix: String::new(),
                expected: kind.expected(),
                raw: raw.to_string(),
            }]
        }),
        Decoder::Object => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_object)
            .map(ParamValue::Json)
            .ok_or_else(|| {
                vec![CoerceError {
                    suffix: String::new(),
                    expected: "object",
                    raw: raw.to_string(),
                }]
            }),
        Decoder::Array { format, items } => {
            let inner = match format {
                CollectionFormat::Multi => CollectionFormat::Csv,
                other => *other,
            };
            decode_items(items, split_collection(raw, inner).into_iter())
        }
    }
}

fn decode_items<'a>(items: &Decoder, parts: impl Iterator<Item = &'a str>) -> Result<ParamValue, Vec<CoerceError>> {
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for (index, part) in parts.enumerate() {
        match decode_one(items, part) {
            Ok(value) => values.push(value),
            Err(inner) => errors.extend(inner.into_iter().map(|mut e| {
                e.suffix = if e.suffix.is_empty() {
                    index.to_string()
                } else {
                    format!("{index}.{}", e.suffix)
                };
                e
            })),
        }
    }
    if errors.is_empty() {
        Ok(ParamValue::Array(values))
    } else {
        Err(errors)
    }
}

/// Convert a declared `default` into a typed value. String defaults go
/// through the same coercion as wire text.
pub fn from_default(decoder: &Decoder, default: &Value) -> ParamValue {
    match (decoder, default) {
        (Decoder::Array { items, .. }, Value::Array(values)) => {
            ParamValue::Array(values.iter().map(|v| from_default(items, v)).collect())
        }
        (Decoder::Array { .. }, Value::String(raw)) => decode(decoder, &[raw.as_str()]).unwrap_or(ParamValue::Json(default.clone())),
        (Decoder::Scalar(kind), Value::String(raw)) => {
            coerce_scalar(*kind, raw).unwrap_or_else(|| ParamValue::String(raw.clone()))
        }
        (_, Value::Bool(b)) => ParamValue::Bool(*b),
        (_, Value::Number(n)) => match n.as_i64() {
            Some(i) => ParamValue::Int(i),
            None => n.as_f64().map(ParamValue::Float).unwrap_or(ParamValue::Null),
        },
        (_, Value::Null) => ParamValue::Null,
        _ => ParamValue::Json(default.clone()),
    }
}
