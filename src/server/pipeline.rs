use std::sync::Arc;
use std::time::Instant;

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Response};
use tracing::{debug, error, info, info_span, warn};

use super::request::{parse_query, read_limited, BodyRead, RawRequest};
use super::response::{write_handler_response, write_json_error};
use crate::binder::RawParts;
use crate::codec::{CodecError, Decoded};
use crate::config::ContractConfig;
use crate::dispatcher::{Dispatcher, Handler, HandlerRequest, HandlerResponse};
use crate::errors::{ConfigError, PipelineError, ValidationError, ValidationErrorKind};
use crate::ids::RequestId;
use crate::negotiate::{media_type_essence, ContentNegotiator};
use crate::router::{RouteMatch, Router};
use crate::security::{authorize, AuthContext, Principal};
use crate::spec::{ParamLocation, SpecDocument, SpecValidator};
use crate::validator::{SchemaArena, SchemaValidator, ValidationResult};

/// Per-request progress, in order. A failure at any stage produces that
/// stage's error response and skips the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Routed,
    Negotiated,
    Authenticated,
    Bound,
    Dispatched,
    Responded,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Routed => "routed",
            Stage::Negotiated => "negotiated",
            Stage::Authenticated => "authenticated",
            Stage::Bound => "bound",
            Stage::Dispatched => "dispatched",
            Stage::Responded => "responded",
        }
    }
}

/// Methods whose requests may carry a body that `consumes` applies to.
fn may_carry_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Routing, negotiation, authentication, binding and dispatch for every
/// operation of one API document.
///
/// Everything is built and checked up front; `handle` only reads shared
/// state and is safe to call from any number of threads.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    spec: Arc<SpecDocument>,
    config: Arc<ContractConfig>,
    arena: Arc<SchemaArena>,
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
}

/// Collects handlers and configuration before the pipeline is checked and
/// built.
#[derive(Debug)]
pub struct PipelineBuilder {
    spec: SpecDocument,
    config: Arc<ContractConfig>,
    dispatcher: Dispatcher,
}

impl PipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: impl Into<Arc<ContractConfig>>) -> Self {
        self.config = config.into();
        self
    }

    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn handler(mut self, operation_id: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.dispatcher.register(operation_id, handler);
        self
    }

    pub fn build(self) -> Result<RequestPipeline, ConfigError> {
        RequestPipeline::new(self.spec, self.config, self.dispatcher)
    }
}

impl RequestPipeline {
    pub fn builder(spec: SpecDocument) -> PipelineBuilder {
        PipelineBuilder {
            spec,
            config: Arc::new(ContractConfig::default()),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Validate the document, build every route and check that each one
    /// has a handler, each referenced security scheme an authenticator and
    /// each concrete media type a codec.
    pub fn new(
        spec: SpecDocument,
        config: impl Into<Arc<ContractConfig>>,
        dispatcher: Dispatcher,
    ) -> Result<Self, ConfigError> {
        let config = config.into();
        let build_start = Instant::now();

        SpecValidator::new().ensure_valid(&spec)?;

        let mut arena = SchemaArena::new(spec.raw().clone());
        let router = Router::from_spec(&spec, &mut arena, &config)?;

        for route in router.routes() {
            if !dispatcher.contains(&route.operation_id) {
                error!(operation_id = %route.operation_id, "No handler registered for operation");
                return Err(ConfigError::MissingHandler(route.operation_id.clone()));
            }
            if route.binder.takes_body() {
                check_codecs(&route.consumes, "consumer", |m| config.codecs().consumer(m).is_some())?;
            }
            check_codecs(&route.produces, "producer", |m| config.codecs().producer(m).is_some())?;
        }
        for scheme in spec.required_schemes() {
            if !config.authenticators().contains(&scheme) {
                error!(scheme = %scheme, "No authenticator registered for security scheme");
                return Err(ConfigError::MissingAuthenticator(scheme));
            }
        }

        info!(
            routes = router.routes().len(),
            schemas = arena.len(),
            handlers = dispatcher.len(),
            base_path = %router.base_path(),
            duration_ms = build_start.elapsed().as_millis(),
            "Request pipeline built"
        );

        Ok(Self {
            spec: Arc::new(spec),
            config,
            arena: Arc::new(arena),
            router: Arc::new(router),
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn spec(&self) -> &SpecDocument {
        &self.spec
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    fn validator(&self) -> SchemaValidator<'_> {
        SchemaValidator::new(&self.arena, self.config.formats()).with_max_depth(self.config.runtime().max_schema_depth)
    }

    /// Run one request through every stage. Never panics on request
    /// input; every failure becomes an error response.
    pub fn handle(&self, req: RawRequest) -> Response<Vec<u8>> {
        let request_id = RequestId::from_headers(&req.headers);
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %req.method,
            path = %req.path()
        );
        let _entered = span.enter();
        let start = Instant::now();

        let mut stage = Stage::Received;
        let response = match self.process(req, request_id, &mut stage) {
            Ok(response) => response,
            Err(err) => {
                let status = err.status();
                if status >= 500 {
                    error!(stage = stage.as_str(), status, error = %err, "Request failed");
                } else {
                    debug!(stage = stage.as_str(), status, error = %err, "Request rejected");
                }
                write_json_error(&err, request_id)
            }
        };

        info!(
            status = response.status().as_u16(),
            stage = stage.as_str(),
            duration_us = start.elapsed().as_micros(),
            "Request completed"
        );
        response
    }

    fn process(&self, mut req: RawRequest, request_id: RequestId, stage: &mut Stage) -> Result<Response<Vec<u8>>, PipelineError> {
        let route_match = self.route(&req.method, &req.uri)?;
        let route = Arc::clone(&route_match.route);
        *stage = Stage::Routed;

        let content_type = if may_carry_body(&req.method) && (route.binder.takes_body() || req.has_body()) {
            Some(ContentNegotiator::validate_content_type(&route.consumes, req.content_type())?)
        } else {
            None
        };
        let accept = req.headers.get(ACCEPT).and_then(|v| v.to_str().ok());
        let response_type = ContentNegotiator::negotiate_accept(&route.produces, accept)?;
        *stage = Stage::Negotiated;

        let query = parse_query(req.query_string());
        let principal = self.authenticate(&req, &route_match, &query)?;
        *stage = Stage::Authenticated;

        let decoded = match content_type.as_deref() {
            Some(media_type) if route.binder.takes_body() => self.read_body(&mut req, media_type)?,
            _ => None,
        };
        let (form, body) = match decoded {
            Some(Decoded::Form(form)) => (Some(form), None),
            Some(Decoded::Value(value)) => (None, Some(value)),
            None => (None, None),
        };
        let raw = RawParts {
            path_params: &route_match.path_params,
            query: &query,
            headers: Some(&req.headers),
            form: form.as_ref(),
            body: body.as_ref(),
        };
        let (params, result) = route.binder.bind(&raw, &self.validator());
        if result.has_errors() {
            return Err(PipelineError::Validation(result));
        }
        *stage = Stage::Bound;

        let path = req.path().to_string();
        let RawRequest { method, headers, .. } = req;
        let handler_response = self.dispatcher.dispatch(HandlerRequest {
            request_id,
            method,
            path,
            operation_id: route.operation_id.clone(),
            params,
            headers,
            principal,
            response_type: response_type.clone(),
        })?;
        *stage = Stage::Dispatched;

        let response = self.encode(&handler_response, &response_type, request_id)?;
        *stage = Stage::Responded;
        Ok(response)
    }

    fn route(&self, method: &Method, uri: &str) -> Result<RouteMatch, PipelineError> {
        if let Some(found) = self.router.lookup(method, uri) {
            return Ok(found);
        }
        let allowed = self.router.other_methods(method, uri);
        let path = uri.split_once('?').map_or(uri, |(p, _)| p).to_string();
        if allowed.is_empty() {
            Err(PipelineError::NotFound { path })
        } else {
            Err(PipelineError::MethodNotAllowed {
                method: method.to_string(),
                allowed: allowed.iter().map(|m| m.as_str().to_string()).collect(),
            })
        }
    }

    fn authenticate(
        &self,
        req: &RawRequest,
        route_match: &RouteMatch,
        query: &[(String, String)],
    ) -> Result<Option<Principal>, PipelineError> {
        let route = &route_match.route;
        if route.security.is_empty() {
            return Ok(None);
        }
        let ctx = AuthContext {
            method: &req.method,
            path: req.path(),
            headers: &req.headers,
            query,
            definitions: self.spec.security_definitions(),
        };
        authorize(&route.security, self.config.authenticators(), &ctx, &route.operation_id)
    }

    /// Read and decode the body with the consumer for `media_type`. An
    /// empty body decodes to nothing and is left to the binder's required
    /// checks.
    fn read_body(&self, req: &mut RawRequest, media_type: &str) -> Result<Option<Decoded>, PipelineError> {
        let limit = self.config.runtime().max_body_bytes;
        if req.content_length().is_some_and(|len| len > limit as u64) {
            return Err(PipelineError::PayloadTooLarge { limit });
        }
        let bytes = match read_limited(&mut req.body, limit) {
            Ok(BodyRead::Complete(bytes)) => bytes,
            Ok(BodyRead::TooLarge) => return Err(PipelineError::PayloadTooLarge { limit }),
            Err(err) => return Err(body_error(format!("failed to read request body: {err}"))),
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        let consumer = self.config.codecs().consumer(media_type).ok_or_else(|| {
            PipelineError::Internal(format!("no consumer registered for {media_type}"))
        })?;
        let full_type = req.content_type().unwrap_or(media_type);
        let read_start = Instant::now();
        match consumer.consume_with_type(full_type, &mut bytes.as_slice()) {
            Ok(decoded) => {
                debug!(
                    media_type,
                    body_size_bytes = bytes.len(),
                    parse_duration_us = read_start.elapsed().as_micros(),
                    "Request body decoded"
                );
                Ok(Some(decoded))
            }
            Err(CodecError::Malformed { reason, .. }) => {
                Err(body_error(format!("malformed {media_type} body: {reason}")))
            }
            Err(err) => Err(body_error(err.to_string())),
        }
    }

    fn encode(
        &self,
        response: &HandlerResponse,
        response_type: &str,
        request_id: RequestId,
    ) -> Result<Response<Vec<u8>>, PipelineError> {
        if response.body.is_null() {
            return Ok(write_handler_response(response, Vec::new(), response_type, request_id));
        }
        // a handler that sets its own Content-Type picks the producer too
        let media_type = response.get_header(CONTENT_TYPE.as_str()).unwrap_or(response_type);
        let producer = self.config.codecs().producer(media_type).ok_or_else(|| {
            PipelineError::Internal(format!("no producer registered for {media_type}"))
        })?;
        let mut body = Vec::new();
        producer
            .produce(&response.body, &mut body)
            .map_err(|err| PipelineError::Internal(format!("failed to encode response as {media_type}: {err}")))?;
        Ok(write_handler_response(response, body, response_type, request_id))
    }
}

fn body_error(message: String) -> PipelineError {
    PipelineError::Validation(ValidationResult::from_error(ValidationError::new(
        ValidationErrorKind::ParseFailure,
        "body",
        Some(ParamLocation::Body),
        message,
    )))
}

fn check_codecs(media_types: &[String], direction: &'static str, registered: impl Fn(&str) -> bool) -> Result<(), ConfigError> {
    for media_type in media_types {
        if media_type.contains('*') {
            continue;
        }
        if !registered(media_type) {
            warn!(media_type = %media_type, direction, "No codec registered for media type");
            return Err(ConfigError::MissingCodec {
                media_type: media_type_essence(media_type).unwrap_or_else(|| media_type.clone()),
                direction,
            });
        }
    }
    Ok(())
}
