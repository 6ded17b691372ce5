//! # Parameter Binder
//!
//! Turns the raw parts of a request into typed, validated parameter values.
//!
//! A [`ParameterBinder`] is built once per operation from its effective
//! parameter list. Each parameter gets a binding descriptor: where to read
//! it from, how to split and coerce the text ([`coerce`]), and a schema
//! compiled from its own validation keywords. Binding never stops at the
//! first bad parameter; every failure lands in the returned
//! [`ValidationResult`](crate::validator::ValidationResult).

pub mod coerce;
mod core;
mod value;

pub use self::core::{ParameterBinder, RawParts};
pub use value::{BoundParam, BoundRequest, FileHandle, FormData, ParamValue};
