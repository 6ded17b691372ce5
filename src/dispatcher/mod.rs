//! # Dispatcher
//!
//! Maps an operation's `operationId` to the handler registered for it.
//!
//! Handlers are plain synchronous functions (or [`Handler`] impls) taking a
//! [`HandlerRequest`] whose parameters are already bound and validated,
//! and returning a [`HandlerResponse`] whose JSON body the pipeline
//! encodes with the negotiated producer.
//!
//! ```rust
//! use brrtcontract::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
//! use serde_json::json;
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register("getPet", |req: HandlerRequest| {
//!     let id = req.get_path_param("id").and_then(|v| v.as_i64());
//!     HandlerResponse::json(200, json!({ "id": id }))
//! });
//! assert!(dispatcher.contains("getPet"));
//! ```

mod core;

pub use self::core::{Dispatcher, Handler, HandlerRequest, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS};
