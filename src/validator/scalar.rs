use serde_json::{Number, Value};

use super::result::ValidationResult;
use super::schema::{Bound, SchemaNode};
use crate::errors::{subject, ValidationError, ValidationErrorKind};
use crate::spec::ParamLocation;

fn error(kind: ValidationErrorKind, path: &str, location: Option<ParamLocation>, detail: String) -> ValidationError {
    ValidationError::new(kind, path, location, format!("{} {}", subject(path, location), detail))
}

/// Length (in code points) and pattern constraints.
pub(crate) fn check_string(
    node: &SchemaNode,
    value: &str,
    path: &str,
    location: Option<ParamLocation>,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let length = value.chars().count();
    if let Some(max) = node.max_length {
        if length > max {
            result.add_error(error(
                ValidationErrorKind::TooLong,
                path,
                location,
                format!("should be at most {max} chars long"),
            ));
        }
    }
    if let Some(min) = node.min_length {
        if length < min {
            result.add_error(error(
                ValidationErrorKind::TooShort,
                path,
                location,
                format!("should be at least {min} chars long"),
            ));
        }
    }
    if let Some(pattern) = &node.pattern {
        if !pattern.is_match(value) {
            result.add_error(error(
                ValidationErrorKind::PatternMismatch,
                path,
                location,
                format!("should match '{}'", pattern.as_str()),
            ));
        }
    }
    result
}

/// multipleOf and the (exclusive) bounds.
pub(crate) fn check_number(
    node: &SchemaNode,
    value: &Number,
    path: &str,
    location: Option<ParamLocation>,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let Some(v) = value.as_f64() else {
        return result;
    };
    if let Some(factor) = node.multiple_of {
        if !is_multiple_of(value, factor) {
            result.add_error(error(
                ValidationErrorKind::MultipleOf,
                path,
                location,
                format!("should be a multiple of {factor}"),
            ));
        }
    }
    if let Some(Bound { limit, exclusive }) = node.maximum {
        if exclusive && v >= limit {
            result.add_error(error(
                ValidationErrorKind::Maximum,
                path,
                location,
                format!("should be less than {limit}"),
            ));
        } else if !exclusive && v > limit {
            result.add_error(error(
                ValidationErrorKind::Maximum,
                path,
                location,
                format!("should be less than or equal to {limit}"),
            ));
        }
    }
    if let Some(Bound { limit, exclusive }) = node.minimum {
        if exclusive && v <= limit {
            result.add_error(error(
                ValidationErrorKind::Minimum,
                path,
                location,
                format!("should be greater than {limit}"),
            ));
        } else if !exclusive && v < limit {
            result.add_error(error(
                ValidationErrorKind::Minimum,
                path,
                location,
                format!("should be greater than or equal to {limit}"),
            ));
        }
    }
    result
}

/// Integer division when both sides are integral, otherwise a quotient check
/// tolerant of binary float representation (0.3 is a multiple of 0.1).
fn is_multiple_of(value: &Number, factor: f64) -> bool {
    if let Some(v) = value.as_i64() {
        if factor.fract() == 0.0 && factor.abs() < i64::MAX as f64 {
            return v % (factor as i64) == 0;
        }
    }
    let Some(v) = value.as_f64() else {
        return false;
    };
    let quotient = v / factor;
    (quotient - quotient.round()).abs() <= 1e-9 * quotient.abs().max(1.0)
}

pub(crate) fn check_enum(
    node: &SchemaNode,
    value: &Value,
    path: &str,
    location: Option<ParamLocation>,
) -> ValidationResult {
    let Some(allowed) = &node.enumeration else {
        return ValidationResult::new();
    };
    if allowed.iter().any(|candidate| json_equal(candidate, value)) {
        return ValidationResult::new();
    }
    ValidationResult::from_error(error(
        ValidationErrorKind::EnumMismatch,
        path,
        location,
        format!("should be one of {}", Value::Array(allowed.clone())),
    ))
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return i == j;
            }
            if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
                return i == j;
            }
            x.as_f64() == y.as_f64()
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| json_equal(l, r)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(v: Value) -> Number {
        match v {
            Value::Number(n) => n,
            other => panic!("not a number: {other}"),
        }
    }

    #[test]
    fn test_multiple_of() {
        assert!(is_multiple_of(&num(json!(49)), 7.0));
        assert!(!is_multiple_of(&num(json!(50)), 7.0));
        assert!(is_multiple_of(&num(json!(0.3)), 0.1));
        assert!(!is_multiple_of(&num(json!(0.35)), 0.1));
        assert!(is_multiple_of(&num(json!(7.5)), 2.5));
    }

    #[test]
    fn test_json_equal_numbers() {
        assert!(json_equal(&json!(1), &json!(1.0)));
        assert!(json_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!json_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!json_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_string_length_counts_code_points() {
        let node = SchemaNode {
            max_length: Some(3),
            ..SchemaNode::default()
        };
        assert!(check_string(&node, "héé", "name", None).is_valid());
        let result = check_string(&node, "héééé", "name", Some(ParamLocation::Query));
        assert_eq!(
            result.errors()[0].message,
            "name in query should be at most 3 chars long"
        );
    }
}
