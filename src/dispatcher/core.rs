use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use http::{HeaderMap, Method};
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{debug, error, info, warn};

use crate::binder::{BoundRequest, ParamValue};
use crate::errors::PipelineError;
use crate::ids::RequestId;
use crate::security::Principal;
use crate::spec::ParamLocation;

/// Response headers kept inline up to this count.
pub const MAX_INLINE_HEADERS: usize = 16;

pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A request that passed routing, negotiation, authentication and
/// binding.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    pub operation_id: String,
    pub params: BoundRequest,
    pub headers: HeaderMap,
    pub principal: Option<Principal>,
    /// Media type the response will be encoded as.
    pub response_type: String,
}

impl HandlerRequest {
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get_in(name, ParamLocation::Path)
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get_in(name, ParamLocation::Query)
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.params.body()
    }
}

/// What a handler returns. The body is encoded by the producer of the
/// negotiated media type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self { status, headers, body }
    }

    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, HeaderVec::new(), body)
    }

    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (names compare case-insensitively).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }
}

pub trait Handler: Send + Sync {
    fn handle(&self, req: HandlerRequest) -> HandlerResponse;
}

impl<F> Handler for F
where
    F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync,
{
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        self(req)
    }
}

/// `operationId` → handler.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("Dispatcher").field("handlers", &names).finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for an operation, replacing any previous one.
    pub fn register(&mut self, operation_id: impl Into<String>, handler: impl Handler + 'static) {
        let operation_id = operation_id.into();
        if self.handlers.insert(operation_id.clone(), Arc::new(handler)).is_some() {
            warn!(operation_id = %operation_id, "Replaced existing handler");
        }
        info!(
            operation_id = %operation_id,
            total_handlers = self.handlers.len(),
            "Handler registered"
        );
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.handlers.contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `req.operation_id`. A panicking handler becomes
    /// an internal error instead of unwinding into the caller.
    pub fn dispatch(&self, req: HandlerRequest) -> Result<HandlerResponse, PipelineError> {
        let Some(handler) = self.handlers.get(&req.operation_id) else {
            error!(operation_id = %req.operation_id, "No handler registered for operation");
            return Err(PipelineError::Internal(format!(
                "no handler registered for operation {}",
                req.operation_id
            )));
        };

        let request_id = req.request_id;
        let operation_id = req.operation_id.clone();
        debug!(
            request_id = %request_id,
            operation_id = %operation_id,
            params = req.params.len(),
            "Handler execution start"
        );
        let execution_start = Instant::now();

        match catch_unwind(AssertUnwindSafe(|| handler.handle(req))) {
            Ok(response) => {
                debug!(
                    request_id = %request_id,
                    operation_id = %operation_id,
                    status = response.status,
                    duration_us = execution_start.elapsed().as_micros(),
                    "Handler execution complete"
                );
                Ok(response)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                error!(
                    request_id = %request_id,
                    operation_id = %operation_id,
                    panic = %message,
                    "Handler panicked"
                );
                Err(PipelineError::Internal(format!("handler for {operation_id} panicked")))
            }
        }
    }
}
