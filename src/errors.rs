//! Error taxonomy shared by every layer of the contract pipeline.
//!
//! Two families live here:
//!
//! - [`ValidationError`] values accumulate inside a
//!   [`ValidationResult`](crate::validator::ValidationResult). They are data,
//!   never early returns: the schema validator, the parameter binder and the
//!   spec validator all collect as many as they can find.
//! - [`PipelineError`] and [`ConfigError`] are ordinary `Result` errors. A
//!   pipeline error terminates one request with a status code; a config error
//!   stops the pipeline from being built at all.

use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

use crate::spec::ParamLocation;
use crate::validator::ValidationResult;

/// Coarse grouping of validation failures.
///
/// Drives status selection: any [`ErrorCategory::Parse`] error turns a
/// validation failure into a 400, everything else is reported as 422.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// The API document itself is inconsistent.
    Structural,
    /// Raw input could not be decoded into the declared type.
    Parse,
    /// A decoded value violates a constraint.
    Validation,
    /// A required value is absent.
    Required,
    /// allOf / anyOf / oneOf / not aggregate failures.
    Composition,
}

/// Every distinct failure the validators can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    // schema / value constraints
    InvalidType,
    InvalidFormat,
    UnknownFormat,
    TooLong,
    TooShort,
    PatternMismatch,
    EnumMismatch,
    MultipleOf,
    Maximum,
    Minimum,
    TooManyItems,
    TooFewItems,
    DuplicateItems,
    AdditionalItems,
    TooManyProperties,
    TooFewProperties,
    ForbiddenProperty,
    Required,
    Dependency,
    AllOf,
    AnyOf,
    OneOf,
    Not,
    DepthExceeded,
    // binding
    ParseFailure,
    InvalidCollectionFormat,
    InvalidContentType,
    // document structure
    DocumentSchema,
    InvalidPathTemplate,
    PathParamUndeclared,
    PathParamNotInPath,
    DuplicateParameter,
    MultipleBodyParams,
    PathOverlap,
    UntypedCollection,
    RequiredNotDefined,
    InvalidSchema,
    UnresolvedReference,
    MissingOperationId,
    DuplicateOperationId,
    UnknownSecurityScheme,
}

impl ValidationErrorKind {
    pub fn category(self) -> ErrorCategory {
        use ValidationErrorKind::*;
        match self {
            Required => ErrorCategory::Required,
            AllOf | AnyOf | OneOf | Not => ErrorCategory::Composition,
            ParseFailure | InvalidContentType => ErrorCategory::Parse,
            InvalidCollectionFormat | DocumentSchema | InvalidPathTemplate | PathParamUndeclared
            | PathParamNotInPath
            | DuplicateParameter | MultipleBodyParams | PathOverlap | UntypedCollection
            | RequiredNotDefined | InvalidSchema | UnresolvedReference | MissingOperationId
            | DuplicateOperationId | UnknownSecurityScheme => ErrorCategory::Structural,
            _ => ErrorCategory::Validation,
        }
    }

    /// Stable machine-readable name, used as `code` in error bodies.
    pub fn as_str(self) -> &'static str {
        use ValidationErrorKind::*;
        match self {
            InvalidType => "invalid_type",
            InvalidFormat => "invalid_format",
            UnknownFormat => "unknown_format",
            TooLong => "too_long",
            TooShort => "too_short",
            PatternMismatch => "pattern",
            EnumMismatch => "enum",
            MultipleOf => "multiple_of",
            Maximum => "maximum",
            Minimum => "minimum",
            TooManyItems => "max_items",
            TooFewItems => "min_items",
            DuplicateItems => "unique_items",
            AdditionalItems => "additional_items",
            TooManyProperties => "max_properties",
            TooFewProperties => "min_properties",
            ForbiddenProperty => "forbidden_property",
            Required => "required",
            Dependency => "dependency",
            AllOf => "all_of",
            AnyOf => "any_of",
            OneOf => "one_of",
            Not => "not",
            DepthExceeded => "depth_exceeded",
            ParseFailure => "parse",
            InvalidCollectionFormat => "collection_format",
            InvalidContentType => "content_type",
            DocumentSchema => "document_schema",
            InvalidPathTemplate => "path_template",
            PathParamUndeclared => "path_param_undeclared",
            PathParamNotInPath => "path_param_not_in_path",
            DuplicateParameter => "duplicate_parameter",
            MultipleBodyParams => "multiple_body_params",
            PathOverlap => "path_overlap",
            UntypedCollection => "untyped_collection",
            RequiredNotDefined => "required_not_defined",
            InvalidSchema => "invalid_schema",
            UnresolvedReference => "unresolved_reference",
            MissingOperationId => "missing_operation_id",
            DuplicateOperationId => "duplicate_operation_id",
            UnknownSecurityScheme => "unknown_security_scheme",
        }
    }
}

impl Display for ValidationErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accumulated validation failure.
///
/// `path` is the dotted location of the offending value (`pet.tags.1`), or the
/// parameter name for parameter-level failures. `location` is set whenever the
/// value came from a request parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    #[serde(rename = "code")]
    pub kind: ValidationErrorKind,
    pub path: String,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<ParamLocation>,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        path: impl Into<String>,
        location: Option<ParamLocation>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            location,
            message: message.into(),
        }
    }

    /// Document-level error, not tied to any request value.
    pub fn structural(kind: ValidationErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, path, None, message)
    }

    pub fn required(path: &str, location: Option<ParamLocation>) -> Self {
        let message = format!("{} is required", subject(path, location));
        Self::new(ValidationErrorKind::Required, path, location, message)
    }

    pub fn invalid_type(path: &str, location: Option<ParamLocation>, expected: &str, actual: &str) -> Self {
        let message = format!(
            "{} must be of type {}: {:?}",
            subject(path, location),
            expected,
            actual
        );
        Self::new(ValidationErrorKind::InvalidType, path, location, message)
    }

    /// The raw text could not be decoded as `expected`.
    pub fn parse_failure(path: &str, location: Option<ParamLocation>, expected: &str, raw: &str) -> Self {
        let message = format!(
            "{} must be of type {}: {:?}",
            subject(path, location),
            expected,
            raw
        );
        Self::new(ValidationErrorKind::ParseFailure, path, location, message)
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Human-readable subject of a message: `limit in query`, `pet.name in body`.
pub(crate) fn subject(path: &str, location: Option<ParamLocation>) -> String {
    let name = if path.is_empty() { "value" } else { path };
    match location {
        Some(loc) => format!("{name} in {loc}"),
        None => name.to_string(),
    }
}

/// Terminal outcome of a request that did not reach a handler, or whose
/// handler output could not be produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("path {path} was not found")]
    NotFound { path: String },

    #[error("method {method} is not allowed, but [{}] are", .allowed.join(","))]
    MethodNotAllowed { method: String, allowed: Vec<String> },

    #[error("unsupported media type {content_type:?}, only {allowed:?} are allowed")]
    UnsupportedMediaType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("none of the produced media types {offered:?} is acceptable for {accept:?}")]
    NotAcceptable { accept: String, offered: Vec<String> },

    #[error("unauthenticated for {operation}")]
    Unauthenticated { operation: String, reason: Option<String> },

    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("validation failure list ({} errors)", .0.errors().len())]
    Validation(ValidationResult),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            PipelineError::NotFound { .. } => 404,
            PipelineError::MethodNotAllowed { .. } => 405,
            PipelineError::UnsupportedMediaType { .. } => 415,
            PipelineError::NotAcceptable { .. } => 406,
            PipelineError::Unauthenticated { .. } => 401,
            PipelineError::PayloadTooLarge { .. } => 413,
            PipelineError::Validation(result) => {
                if result.has_category(ErrorCategory::Parse) {
                    400
                } else {
                    422
                }
            }
            PipelineError::Internal(_) => 500,
        }
    }
}

/// Startup failure: the pipeline refuses to be built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the API document is invalid ({} errors)", .0.errors().len())]
    InvalidSpec(ValidationResult),

    #[error("failed to compile schema for {context}: {source}")]
    Schema {
        context: String,
        #[source]
        source: crate::validator::SchemaError,
    },

    #[error("invalid parameter configuration for operation {operation}: {result}")]
    Binder {
        operation: String,
        result: ValidationResult,
    },

    #[error("no handler registered for operation {0}")]
    MissingHandler(String),

    #[error("no authenticator registered for security scheme {0}")]
    MissingAuthenticator(String),

    #[error("no {direction} registered for media type {media_type}")]
    MissingCodec {
        media_type: String,
        direction: &'static str,
    },

    #[error("unsupported HTTP method {method} on {path}")]
    UnsupportedMethod { method: String, path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_message_names_location() {
        let err = ValidationError::required("limit", Some(ParamLocation::Query));
        assert_eq!(err.message, "limit in query is required");
        assert_eq!(err.category(), ErrorCategory::Required);
    }

    #[test]
    fn test_validation_status_depends_on_parse_errors() {
        let mut result = ValidationResult::new();
        result.add_error(ValidationError::required("id", Some(ParamLocation::Path)));
        assert_eq!(PipelineError::Validation(result.clone()).status(), 422);

        result.add_error(ValidationError::parse_failure(
            "limit",
            Some(ParamLocation::Query),
            "integer",
            "ten",
        ));
        assert_eq!(PipelineError::Validation(result).status(), 400);
    }

    #[test]
    fn test_method_not_allowed_message() {
        let err = PipelineError::MethodNotAllowed {
            method: "DELETE".into(),
            allowed: vec!["GET".into(), "POST".into()],
        };
        assert_eq!(err.to_string(), "method DELETE is not allowed, but [GET,POST] are");
        assert_eq!(err.status(), 405);
    }
}
