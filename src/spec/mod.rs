//! # API Document
//!
//! Swagger 2.0 document model, loading, and startup consistency checks.
//!
//! - [`types`]: serde model of the document (`paths`, parameters,
//!   security definitions)
//! - [`SpecDocument`]: immutable loaded document with effective parameter,
//!   media type, and security lookups per operation
//! - [`load_spec`]: YAML or JSON loading
//! - [`SpecValidator`]: collects every structural problem before serving

mod document;
mod load;
pub mod types;
mod validate;

pub use document::{OperationRef, SpecDocument};
pub use load::{load_spec, load_spec_from_json, load_spec_from_str, load_spec_from_yaml};
pub use types::{
    CollectionFormat, Header, Operation, ParamLocation, Parameter, ParameterOrRef, PathItem, Response,
    SecurityRequirement, SecurityScheme, SecuritySchemeType, SimpleSchema, SwaggerDoc,
};
pub use validate::{template_params, SpecValidator};
