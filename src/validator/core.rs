use std::fmt::Display;

use serde_json::Value;

use super::result::ValidationResult;
use super::schema::{Additional, SchemaArena, SchemaId, SchemaNode};
use super::{array, composition, object, scalar, type_check};
use crate::errors::{subject, ValidationError, ValidationErrorKind};
use crate::formats::FormatRegistry;
use crate::spec::ParamLocation;

/// Recursion bound when no runtime configuration overrides it.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// The closed set of sub-validators, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorKind {
    Type,
    Format,
    String,
    Number,
    Array,
    Enum,
    Object,
    Composition,
}

impl ValidatorKind {
    pub const ORDER: [ValidatorKind; 8] = [
        ValidatorKind::Type,
        ValidatorKind::Format,
        ValidatorKind::String,
        ValidatorKind::Number,
        ValidatorKind::Array,
        ValidatorKind::Enum,
        ValidatorKind::Object,
        ValidatorKind::Composition,
    ];

    /// Whether this validator has anything to check for `value` under `node`.
    pub fn applies(self, node: &SchemaNode, value: &Value) -> bool {
        match self {
            ValidatorKind::Type => !node.types.is_empty(),
            ValidatorKind::Format => {
                node.format.is_some() && (value.is_string() || value.is_number())
            }
            ValidatorKind::Composition => {
                !node.all_of.is_empty()
                    || !node.any_of.is_empty()
                    || !node.one_of.is_empty()
                    || node.not.is_some()
                    || (!node.dependencies.is_empty() && value.is_object())
            }
            ValidatorKind::String => {
                value.is_string()
                    && (node.min_length.is_some() || node.max_length.is_some() || node.pattern.is_some())
            }
            ValidatorKind::Number => {
                value.is_number()
                    && (node.multiple_of.is_some() || node.minimum.is_some() || node.maximum.is_some())
            }
            ValidatorKind::Array => {
                value.is_array()
                    && (node.items.is_some()
                        || node.min_items.is_some()
                        || node.max_items.is_some()
                        || node.unique_items)
            }
            ValidatorKind::Enum => node.enumeration.is_some(),
            ValidatorKind::Object => {
                value.is_object()
                    && (!node.properties.is_empty()
                        || !node.required.is_empty()
                        || node.min_properties.is_some()
                        || node.max_properties.is_some()
                        || !node.pattern_properties.is_empty()
                        || !matches!(node.additional_properties, Additional::Allowed(true)))
            }
        }
    }
}

/// Validates JSON values against schemas compiled in a [`SchemaArena`].
///
/// Cheap to construct and `Copy`; callers build one per validation from the
/// shared arena and format registry.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    arena: &'a SchemaArena,
    formats: &'a FormatRegistry,
    max_depth: usize,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(arena: &'a SchemaArena, formats: &'a FormatRegistry) -> Self {
        Self {
            arena,
            formats,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validate(&self, schema: SchemaId, value: &Value) -> ValidationResult {
        self.validate_at(schema, value, "", None)
    }

    /// Validate with a path prefix and, for parameters, the location the
    /// value was read from. Both end up in every reported error.
    pub fn validate_at(
        &self,
        schema: SchemaId,
        value: &Value,
        path: &str,
        location: Option<ParamLocation>,
    ) -> ValidationResult {
        let mut walker = Walker {
            validator: *self,
            location,
            visiting: Vec::new(),
        };
        walker.validate(schema, value, path)
    }

    pub(super) fn formats(&self) -> &'a FormatRegistry {
        self.formats
    }
}

/// State of one validation descent.
pub(super) struct Walker<'a> {
    validator: SchemaValidator<'a>,
    pub(super) location: Option<ParamLocation>,
    /// (schema, value address) pairs on the current descent.
    visiting: Vec<(SchemaId, usize)>,
}

impl<'a> Walker<'a> {
    pub(super) fn validate(&mut self, id: SchemaId, value: &Value, path: &str) -> ValidationResult {
        if self.visiting.len() >= self.validator.max_depth {
            let message = format!(
                "{} exceeds the maximum schema depth of {}",
                subject(path, self.location),
                self.validator.max_depth
            );
            return ValidationResult::from_error(ValidationError::new(
                ValidationErrorKind::DepthExceeded,
                path,
                self.location,
                message,
            ));
        }

        // Re-entering the same schema with the same value can only come from
        // a $ref loop that consumed no input.
        let key = (id, value as *const Value as usize);
        if self.visiting.contains(&key) {
            let mut satisfied = ValidationResult::new();
            satisfied.inc();
            return satisfied;
        }
        self.visiting.push(key);

        let node = self.validator.arena.get(id);
        let mut result = ValidationResult::new();
        for kind in ValidatorKind::ORDER {
            if !kind.applies(node, value) {
                continue;
            }
            let outcome = self.run(kind, node, value, path);
            let type_mismatch = kind == ValidatorKind::Type && outcome.has_errors();
            if outcome.is_valid() {
                result.inc();
            }
            result.merge(outcome);
            if type_mismatch {
                break;
            }
        }

        self.visiting.pop();
        result
    }

    fn run(&mut self, kind: ValidatorKind, node: &SchemaNode, value: &Value, path: &str) -> ValidationResult {
        let location = self.location;
        match (kind, value) {
            (ValidatorKind::Type, _) => type_check::check_type(node, value, path, location),
            (ValidatorKind::Format, _) => {
                type_check::check_format(node, value, self.validator.formats(), path, location)
            }
            (ValidatorKind::Composition, _) => composition::check(self, node, value, path),
            (ValidatorKind::String, Value::String(s)) => scalar::check_string(node, s, path, location),
            (ValidatorKind::Number, Value::Number(n)) => scalar::check_number(node, n, path, location),
            (ValidatorKind::Array, Value::Array(items)) => array::check(self, node, items, path),
            (ValidatorKind::Enum, _) => scalar::check_enum(node, value, path, location),
            (ValidatorKind::Object, Value::Object(map)) => object::check(self, node, map, path),
            _ => ValidationResult::new(),
        }
    }
}

pub(super) fn child_path(path: &str, segment: impl Display) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}
