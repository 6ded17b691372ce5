//! allOf / anyOf / oneOf / not / dependencies.
//!
//! When an `anyOf` or `oneOf` has no passing branch, the branch with the
//! highest match count (first one on ties) is reported alongside the
//! aggregate error, so callers see why the closest candidate failed.

use serde_json::Value;

use super::core::{child_path, Walker};
use super::result::ValidationResult;
use super::schema::{Dependency, SchemaId, SchemaNode};
use crate::errors::{subject, ValidationError, ValidationErrorKind};

pub(super) fn check(walker: &mut Walker<'_>, node: &SchemaNode, value: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if !node.all_of.is_empty() {
        result.merge(all_of(walker, &node.all_of, value, path));
    }
    if !node.any_of.is_empty() {
        result.merge(any_of(walker, &node.any_of, value, path));
    }
    if !node.one_of.is_empty() {
        result.merge(one_of(walker, &node.one_of, value, path));
    }
    if let Some(schema) = node.not {
        result.merge(not(walker, schema, value, path));
    }
    if let Value::Object(object) = value {
        for (key, dependency) in &node.dependencies {
            if !object.contains_key(key) {
                continue;
            }
            match dependency {
                Dependency::Properties(names) => {
                    let child = child_path(path, key);
                    for name in names.iter().filter(|n| !object.contains_key(n.as_str())) {
                        result.add_error(ValidationError::new(
                            ValidationErrorKind::Dependency,
                            child.clone(),
                            walker.location,
                            format!("{} has a dependency on {}", subject(&child, walker.location), name),
                        ));
                    }
                }
                Dependency::Schema(schema) => result.merge(walker.validate(*schema, value, path)),
            }
        }
    }
    result
}

fn aggregate(walker: &Walker<'_>, kind: ValidationErrorKind, path: &str, what: &str) -> ValidationError {
    ValidationError::new(
        kind,
        path,
        walker.location,
        format!("{} {}", subject(path, walker.location), what),
    )
}

fn keep_best(best: &mut Option<ValidationResult>, candidate: ValidationResult) {
    match best {
        Some(current) if current.match_count() >= candidate.match_count() => {}
        _ => *best = Some(candidate),
    }
}

fn all_of(walker: &mut Walker<'_>, schemas: &[SchemaId], value: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut passed = 0;
    for schema in schemas {
        let branch = walker.validate(*schema, value, path);
        if branch.is_valid() {
            passed += 1;
        }
        result.merge(branch);
    }
    if passed == schemas.len() {
        result.inc();
    } else {
        result.add_error(aggregate(
            walker,
            ValidationErrorKind::AllOf,
            path,
            "must validate all the schemas (allOf)",
        ));
    }
    result
}

fn any_of(walker: &mut Walker<'_>, schemas: &[SchemaId], value: &Value, path: &str) -> ValidationResult {
    let mut best = None;
    for schema in schemas {
        let branch = walker.validate(*schema, value, path);
        if branch.is_valid() {
            let mut result = branch;
            result.inc();
            return result;
        }
        keep_best(&mut best, branch);
    }
    let mut result = ValidationResult::from_error(aggregate(
        walker,
        ValidationErrorKind::AnyOf,
        path,
        "must validate at least one schema (anyOf)",
    ));
    if let Some(best) = best {
        result.merge(best);
    }
    result
}

fn one_of(walker: &mut Walker<'_>, schemas: &[SchemaId], value: &Value, path: &str) -> ValidationResult {
    let mut best = None;
    let mut passing = None;
    let mut passed = 0;
    for schema in schemas {
        let branch = walker.validate(*schema, value, path);
        if branch.is_valid() {
            passed += 1;
            passing.get_or_insert(branch);
        } else {
            keep_best(&mut best, branch);
        }
    }
    match (passed, passing) {
        (1, Some(mut result)) => {
            result.inc();
            result
        }
        (0, _) => {
            let mut result = ValidationResult::from_error(aggregate(
                walker,
                ValidationErrorKind::OneOf,
                path,
                "must validate one and only one schema (oneOf)",
            ));
            if let Some(best) = best {
                result.merge(best);
            }
            result
        }
        _ => ValidationResult::from_error(aggregate(
            walker,
            ValidationErrorKind::OneOf,
            path,
            "must validate one and only one schema (oneOf)",
        )),
    }
}

fn not(walker: &mut Walker<'_>, schema: SchemaId, value: &Value, path: &str) -> ValidationResult {
    let branch = walker.validate(schema, value, path);
    if branch.is_valid() {
        return ValidationResult::from_error(aggregate(
            walker,
            ValidationErrorKind::Not,
            path,
            "must not validate the schema (not)",
        ));
    }
    let mut result = ValidationResult::new();
    result.inc();
    result
}
