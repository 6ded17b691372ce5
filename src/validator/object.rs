use serde_json::{Map, Value};

use super::core::{child_path, Walker};
use super::result::ValidationResult;
use super::schema::{Additional, SchemaId, SchemaNode};
use crate::errors::{subject, ValidationError, ValidationErrorKind};

pub(super) fn check(
    walker: &mut Walker<'_>,
    node: &SchemaNode,
    object: &Map<String, Value>,
    path: &str,
) -> ValidationResult {
    let location = walker.location;
    let mut result = ValidationResult::new();

    if let Some(max) = node.max_properties {
        if object.len() > max {
            result.add_error(ValidationError::new(
                ValidationErrorKind::TooManyProperties,
                path,
                location,
                format!("{} should have at most {max} properties", subject(path, location)),
            ));
        }
    }
    if let Some(min) = node.min_properties {
        if object.len() < min {
            result.add_error(ValidationError::new(
                ValidationErrorKind::TooFewProperties,
                path,
                location,
                format!("{} should have at least {min} properties", subject(path, location)),
            ));
        }
    }

    for name in &node.required {
        if !object.contains_key(name) {
            result.add_error(ValidationError::required(&child_path(path, name), location));
        }
    }

    for (key, value) in object {
        let child = child_path(path, key);
        let declared = node.property(key);
        let patterns: Vec<SchemaId> = node
            .pattern_properties
            .iter()
            .filter(|p| p.regex.is_match(key))
            .map(|p| p.schema)
            .collect();

        if let Some(schema) = declared {
            result.merge(walker.validate(schema, value, &child));
        }
        for schema in &patterns {
            result.merge(walker.validate(*schema, value, &child));
        }
        if declared.is_some() || !patterns.is_empty() {
            continue;
        }
        match &node.additional_properties {
            Additional::Allowed(true) => {}
            Additional::Allowed(false) => {
                let message = format!("{} is a forbidden property", subject(&child, location));
                result.add_error(ValidationError::new(
                    ValidationErrorKind::ForbiddenProperty,
                    child,
                    location,
                    message,
                ));
            }
            Additional::Schema(schema) => result.merge(walker.validate(*schema, value, &child)),
        }
    }

    result
}
