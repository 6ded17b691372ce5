//! # brrtcontract
//!
//! **brrtcontract** enforces a [Swagger 2.0](https://swagger.io/specification/v2/) API
//! contract at request time: it validates the document itself, routes requests to
//! operations, negotiates media types, authenticates, binds and validates every
//! declared parameter, and hands typed values to your handlers.
//!
//! ## Architecture
//!
//! - **[`spec`]** - Swagger 2.0 loading, the in-memory document and the [`spec::SpecValidator`]
//! - **[`validator`]** - JSON-schema validation over a compiled schema arena
//! - **[`formats`]** - Named string formats (`date-time`, `uuid`, `email`, ...)
//! - **[`binder`]** - Per-operation parameter binding and coercion
//! - **[`router`]** - Radix-tree routing with 404/405 discrimination
//! - **[`negotiate`]** - `Content-Type` and `Accept` negotiation
//! - **[`codec`]** - Body consumers and producers per media type
//! - **[`security`]** - Authenticator seam plus Basic and API key adapters
//! - **[`dispatcher`]** - `operationId` → handler dispatch
//! - **[`server`]** - The [`server::RequestPipeline`] tying it all together
//! - **[`config`]**, **[`runtime_config`]** - Immutable configuration
//! - **[`otel`]** - Structured logging setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Pipeline as RequestPipeline
//!     participant Router
//!     participant Neg as ContentNegotiator
//!     participant Auth as Authenticators
//!     participant Binder as ParameterBinder
//!     participant Schema as SchemaValidator
//!     participant Handler
//!
//!     Client->>Pipeline: RawRequest
//!     Pipeline->>Router: lookup(method, path)
//!     alt No route
//!         Router-->>Client: 404, or 405 + Allow
//!     end
//!     Pipeline->>Neg: Content-Type / Accept
//!     alt Not negotiable
//!         Neg-->>Client: 415 / 406
//!     end
//!     Pipeline->>Auth: security requirements
//!     alt Nobody applies or credentials rejected
//!         Auth-->>Client: 401
//!     end
//!     Pipeline->>Binder: bind(path, query, headers, form, body)
//!     Binder->>Schema: validate each value
//!     alt Any error
//!         Binder-->>Client: 400 (parse) / 422, every error listed
//!     end
//!     Pipeline->>Handler: HandlerRequest
//!     Handler-->>Pipeline: HandlerResponse
//!     Pipeline-->>Client: encoded by the negotiated producer
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use brrtcontract::dispatcher::{HandlerRequest, HandlerResponse};
//! use brrtcontract::server::{RawRequest, RequestPipeline};
//! use brrtcontract::spec::load_spec;
//! use http::Method;
//! use serde_json::json;
//!
//! let spec = load_spec("swagger.yaml").expect("load API document");
//! let pipeline = RequestPipeline::builder(spec)
//!     .handler("listPets", |req: HandlerRequest| {
//!         let limit = req.get_query_param("limit").and_then(|v| v.as_i64()).unwrap_or(20);
//!         HandlerResponse::json(200, json!({ "limit": limit }))
//!     })
//!     .build()
//!     .expect("API contract is consistent");
//!
//! let response = pipeline.handle(RawRequest::new(Method::GET, "/v1/pets?limit=10"));
//! assert_eq!(response.status(), 200);
//! ```
//!
//! ## Threading
//!
//! Everything is synchronous. A built [`server::RequestPipeline`] is immutable and
//! `Send + Sync`; call `handle` from as many threads as your server runs.

pub mod binder;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod formats;
pub mod ids;
pub mod negotiate;
pub mod otel;
pub mod router;
pub mod runtime_config;
pub mod security;
pub mod server;
pub mod spec;
pub mod validator;

pub use config::ContractConfig;
pub use errors::{ConfigError, ErrorCategory, PipelineError, ValidationError, ValidationErrorKind};
pub use server::{RawRequest, RequestPipeline};
pub use spec::{load_spec, load_spec_from_str, SpecDocument, SpecValidator};
pub use validator::{SchemaValidator, ValidationResult};
