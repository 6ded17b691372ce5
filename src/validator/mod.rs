//! # Schema Validator
//!
//! JSON-schema validation for request bodies and parameter values.
//!
//! ## Architecture
//!
//! Schemas are compiled once into a [`SchemaArena`] ([`schema`]). Validation
//! walks the arena with a fixed, closed set of sub-validators
//! ([`ValidatorKind`]), each guarded by an `applies` predicate:
//!
//! ```text
//! Type -> Format -> String -> Number -> Array -> Enum -> Object -> Composition
//! ```
//!
//! Errors accumulate into a [`ValidationResult`]; nothing short-circuits
//! except a type mismatch, which skips the remaining checks for that node
//! (a string has no `maximum` worth reporting once it should have been a
//! number).
//!
//! ## Cycles
//!
//! `$ref` cycles are indices pointing back up the arena. The walker keeps
//! the (schema, value) pairs of its current descent and treats a repeat as
//! satisfied; a configurable depth limit bounds everything else.
//!
//! ## Example
//!
//! ```rust
//! use brrtcontract::formats::FormatRegistry;
//! use brrtcontract::validator::{SchemaArena, SchemaValidator};
//! use serde_json::json;
//!
//! let mut arena = SchemaArena::default();
//! let factor = arena
//!     .compile(&json!({"type": "number", "multipleOf": 7, "maximum": 49, "minimum": 14}))
//!     .unwrap();
//! let formats = FormatRegistry::default();
//! let validator = SchemaValidator::new(&arena, &formats);
//!
//! assert!(validator.validate(factor, &json!(49)).is_valid());
//! assert!(!validator.validate(factor, &json!(50)).is_valid());
//! ```

mod array;
mod composition;
mod core;
mod object;
mod result;
mod scalar;
pub mod schema;
mod type_check;

pub use self::core::{SchemaValidator, ValidatorKind, DEFAULT_MAX_DEPTH};
pub use result::ValidationResult;
pub use scalar::json_equal;
pub use schema::{JsonType, SchemaArena, SchemaError, SchemaId, SchemaNode};
pub use type_check::{numeric_format_fits, type_matches, value_type};
