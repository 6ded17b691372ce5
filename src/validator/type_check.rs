use serde_json::{Number, Value};

use super::result::ValidationResult;
use super::schema::{JsonType, SchemaNode};
use crate::errors::{subject, ValidationError, ValidationErrorKind};
use crate::formats::{FormatOutcome, FormatRegistry, NUMERIC_FORMATS};
use crate::spec::ParamLocation;

/// JSON type of a value. Integral floats count as integers whatever their
/// magnitude; width limits belong to `numeric_format_fits`.
pub fn value_type(value: &Value) -> JsonType {
    match value {
        Value::Null => JsonType::Null,
        Value::Bool(_) => JsonType::Boolean,
        Value::Number(n) if is_integral(n) => JsonType::Integer,
        Value::Number(_) => JsonType::Number,
        Value::String(_) => JsonType::String,
        Value::Array(_) => JsonType::Array,
        Value::Object(_) => JsonType::Object,
    }
}

fn is_integral(n: &Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

/// `integer` is a subtype of `number`; an empty type set accepts anything.
pub fn type_matches(types: &[JsonType], actual: JsonType) -> bool {
    types.is_empty()
        || types.contains(&actual)
        || (actual == JsonType::Integer && types.contains(&JsonType::Number))
}

pub(super) fn check_type(
    node: &SchemaNode,
    value: &Value,
    path: &str,
    location: Option<ParamLocation>,
) -> ValidationResult {
    let actual = value_type(value);
    if type_matches(&node.types, actual) {
        return ValidationResult::new();
    }
    ValidationResult::from_error(ValidationError::invalid_type(
        path,
        location,
        &node.type_names(),
        actual.as_str(),
    ))
}

pub(super) fn check_format(
    node: &SchemaNode,
    value: &Value,
    formats: &FormatRegistry,
    path: &str,
    location: Option<ParamLocation>,
) -> ValidationResult {
    let Some(format) = node.format.as_deref() else {
        return ValidationResult::new();
    };
    let error = match value {
        Value::String(s) if !NUMERIC_FORMATS.contains(&format) => match formats.validate(format, s) {
            FormatOutcome::Valid => None,
            FormatOutcome::Invalid => Some(format_error(path, location, format, s)),
            FormatOutcome::Unknown => Some(ValidationError::new(
                ValidationErrorKind::UnknownFormat,
                path,
                location,
                format!("{} has unknown format {:?}", subject(path, location), format),
            )),
        },
        Value::Number(n) if !numeric_format_fits(format, n) => {
            Some(format_error(path, location, format, &n.to_string()))
        }
        _ => None,
    };
    error.map(ValidationResult::from_error).unwrap_or_default()
}

fn format_error(path: &str, location: Option<ParamLocation>, format: &str, raw: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidFormat,
        path,
        location,
        format!("{} must be of type {}: {:?}", subject(path, location), format, raw),
    )
}

/// Width check for numeric formats. Narrower values satisfy wider formats:
/// an int32 is a valid int64, a float a valid double.
pub fn numeric_format_fits(format: &str, n: &Number) -> bool {
    match format {
        "int32" => integral_value(n).is_some_and(|v| i32::try_from(v).is_ok()),
        "int64" => integral_value(n).is_some(),
        "float" => n.as_f64().is_some_and(|f| f.abs() <= f64::from(f32::MAX)),
        _ => true,
    }
}

fn integral_value(n: &Number) -> Option<i64> {
    if let Some(v) = n.as_i64() {
        return Some(v);
    }
    if n.is_u64() {
        return None;
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_type_widening() {
        assert_eq!(value_type(&json!(3)), JsonType::Integer);
        assert_eq!(value_type(&json!(3.0)), JsonType::Integer);
        assert_eq!(value_type(&json!(3.5)), JsonType::Number);
        assert_eq!(value_type(&json!(1e20)), JsonType::Integer);
        assert!(type_matches(&[JsonType::Number], JsonType::Integer));
        assert!(!type_matches(&[JsonType::Integer], JsonType::Number));
        assert!(!type_matches(&[JsonType::String], JsonType::Null));
        assert!(type_matches(&[JsonType::String, JsonType::Null], JsonType::Null));
        assert!(type_matches(&[], JsonType::Null));
    }

    #[test]
    fn test_numeric_format_widths() {
        let small = json!(42);
        let big = json!(3_000_000_000i64);
        let huge = json!(u64::MAX);
        let n = |v: &Value| match v {
            Value::Number(n) => n.clone(),
            other => panic!("not a number: {other}"),
        };
        assert!(numeric_format_fits("int32", &n(&small)));
        assert!(!numeric_format_fits("int32", &n(&big)));
        assert!(numeric_format_fits("int64", &n(&big)));
        assert!(!numeric_format_fits("int64", &n(&huge)));
        assert!(numeric_format_fits("float", &n(&json!(1.5))));
        assert!(!numeric_format_fits("float", &n(&json!(1e300))));
        assert!(numeric_format_fits("double", &n(&json!(1e300))));
    }
}
