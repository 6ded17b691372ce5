use serde_json::Value;

use super::core::{child_path, Walker};
use super::result::ValidationResult;
use super::scalar::json_equal;
use super::schema::{Additional, Items, SchemaNode};
use crate::errors::{subject, ValidationError, ValidationErrorKind};

pub(super) fn check(walker: &mut Walker<'_>, node: &SchemaNode, items: &[Value], path: &str) -> ValidationResult {
    let location = walker.location;
    let mut result = ValidationResult::new();
    let error = |kind, detail: String| {
        ValidationError::new(kind, path, location, format!("{} {}", subject(path, location), detail))
    };

    if let Some(max) = node.max_items {
        if items.len() > max {
            result.add_error(error(
                ValidationErrorKind::TooManyItems,
                format!("should have at most {max} items"),
            ));
        }
    }
    if let Some(min) = node.min_items {
        if items.len() < min {
            result.add_error(error(
                ValidationErrorKind::TooFewItems,
                format!("should have at least {min} items"),
            ));
        }
    }
    if node.unique_items && has_duplicates(items) {
        result.add_error(error(
            ValidationErrorKind::DuplicateItems,
            "shouldn't contain duplicates".to_string(),
        ));
    }

    match &node.items {
        Some(Items::Single(schema)) => {
            for (i, item) in items.iter().enumerate() {
                result.merge(walker.validate(*schema, item, &child_path(path, i)));
            }
        }
        Some(Items::Tuple(schemas)) => {
            for (i, (schema, item)) in schemas.iter().zip(items).enumerate() {
                result.merge(walker.validate(*schema, item, &child_path(path, i)));
            }
            if items.len() > schemas.len() {
                match &node.additional_items {
                    Additional::Allowed(true) => {}
                    Additional::Allowed(false) => result.add_error(error(
                        ValidationErrorKind::AdditionalItems,
                        "array doesn't allow for additional items".to_string(),
                    )),
                    Additional::Schema(schema) => {
                        for (i, item) in items.iter().enumerate().skip(schemas.len()) {
                            result.merge(walker.validate(*schema, item, &child_path(path, i)));
                        }
                    }
                }
            }
        }
        None => {}
    }
    result
}

fn has_duplicates(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].iter().any(|b| json_equal(a, b)))
}
