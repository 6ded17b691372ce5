//! # Security
//!
//! Authenticator invocation for operations that declare `security`.
//!
//! An operation's `security` is a list of alternative requirements; each
//! requirement names one or more schemes that must all pass. For every
//! scheme the registered [`Authenticator`] first says whether it *applies*
//! (its credentials are present), then whether they are valid:
//!
//! 1. requirements are tried in declaration order;
//! 2. a requirement applies when every one of its schemes applies;
//! 3. the first applicable requirement decides: all schemes succeed and
//!    the request is authenticated, or it is rejected with the first
//!    error;
//! 4. no applicable requirement means 401.
//!
//! An empty requirement (`{}`) allows anonymous access.
//!
//! The credential checks themselves are the caller's: [`BasicAuth`] and
//! [`ApiKeyAuth`] only extract credentials and hand them to a closure.
//!
//! ```rust
//! use brrtcontract::security::{ApiKeyAuth, ApiKeyLocation, Principal};
//!
//! let auth = ApiKeyAuth::new("X-API-Key", ApiKeyLocation::Header, |key: &str| {
//!     if key == "secret" {
//!         Ok(Principal::new("service-account"))
//!     } else {
//!         Err("unknown key".to_string())
//!     }
//! });
//! # let _ = auth;
//! ```

mod api_key;
mod basic;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::spec::{SecurityRequirement, SecurityScheme};

pub use api_key::{ApiKeyAuth, ApiKeyLocation};
pub use basic::BasicAuth;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub name: String,
    /// Scheme that produced this principal.
    pub scheme: String,
    pub claims: Value,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scheme: String::new(),
            claims: Value::Null,
        }
    }

    #[must_use]
    pub fn with_claims(mut self, claims: Value) -> Self {
        self.claims = claims;
        self
    }
}

/// What one authenticator made of a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthOutcome {
    /// The credentials this authenticator handles are present.
    pub applies: bool,
    pub principal: Option<Principal>,
    pub error: Option<String>,
}

impl AuthOutcome {
    pub fn not_applicable() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            applies: true,
            principal: Some(principal),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            applies: true,
            principal: None,
            error: Some(error.into()),
        }
    }
}

/// Request view handed to authenticators.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub query: &'a [(String, String)],
    /// Name of the scheme being checked, as declared in `securityDefinitions`.
    pub scheme_name: &'a str,
    pub scheme: Option<&'a SecurityScheme>,
    /// Scopes the requirement asks for (OAuth2).
    pub scopes: &'a [String],
}

impl<'a> AuthRequest<'a> {
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[inline]
    pub fn get_query(&self, name: &str) -> Option<&'a str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn get_cookie(&self, name: &str) -> Option<&'a str> {
        self.headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|c| c.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| k.trim() == name)
            .map(|(_, v)| v.trim())
    }
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, req: &AuthRequest<'_>) -> AuthOutcome;
}

impl<F> Authenticator for F
where
    F: Fn(&AuthRequest<'_>) -> AuthOutcome + Send + Sync,
{
    fn authenticate(&self, req: &AuthRequest<'_>) -> AuthOutcome {
        self(req)
    }
}

/// Security scheme name → authenticator.
#[derive(Clone, Default)]
pub struct AuthenticatorRegistry {
    by_scheme: HashMap<String, Arc<dyn Authenticator>>,
}

impl fmt::Debug for AuthenticatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<&String> = self.by_scheme.keys().collect();
        schemes.sort();
        f.debug_struct("AuthenticatorRegistry").field("schemes", &schemes).finish()
    }
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: impl Into<String>, authenticator: impl Authenticator + 'static) {
        self.by_scheme.insert(scheme.into(), Arc::new(authenticator));
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Authenticator>> {
        self.by_scheme.get(scheme)
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.by_scheme.contains_key(scheme)
    }
}

/// Everything about the request except the scheme being checked.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub query: &'a [(String, String)],
    pub definitions: &'a std::collections::BTreeMap<String, SecurityScheme>,
}

/// Run the authenticators of `requirements` against a request.
///
/// `Ok(None)` for operations without requirements or when an anonymous
/// (`{}`) alternative is reached.
pub fn authorize(
    requirements: &[SecurityRequirement],
    registry: &AuthenticatorRegistry,
    ctx: &AuthContext<'_>,
    operation: &str,
) -> Result<Option<Principal>, PipelineError> {
    if requirements.is_empty() {
        return Ok(None);
    }

    'requirements: for requirement in requirements {
        if requirement.is_empty() {
            debug!(operation, "Anonymous access allowed");
            return Ok(None);
        }

        let mut outcomes = Vec::with_capacity(requirement.len());
        for (scheme_name, scopes) in requirement {
            let Some(authenticator) = registry.get(scheme_name) else {
                warn!(operation, scheme = %scheme_name, "No authenticator registered for scheme");
                continue 'requirements;
            };
            let request = AuthRequest {
                method: ctx.method,
                path: ctx.path,
                headers: ctx.headers,
                query: ctx.query,
                scheme_name,
                scheme: ctx.definitions.get(scheme_name),
                scopes,
            };
            let outcome = authenticator.authenticate(&request);
            if !outcome.applies {
                continue 'requirements;
            }
            outcomes.push((scheme_name, outcome));
        }

        // first applicable requirement decides
        let mut principal = None;
        for (scheme_name, outcome) in outcomes {
            match (outcome.error, outcome.principal) {
                (None, Some(mut found)) => {
                    if found.scheme.is_empty() {
                        found.scheme = scheme_name.clone();
                    }
                    principal.get_or_insert(found);
                }
                (error, _) => {
                    let reason = error.unwrap_or_else(|| format!("{scheme_name} credentials were not accepted"));
                    debug!(operation, scheme = %scheme_name, reason = %reason, "Authentication rejected");
                    return Err(PipelineError::Unauthenticated {
                        operation: operation.to_string(),
                        reason: Some(reason),
                    });
                }
            }
        }
        debug!(operation, principal = ?principal.as_ref().map(|p| &p.name), "Authenticated");
        return Ok(principal);
    }

    Err(PipelineError::Unauthenticated {
        operation: operation.to_string(),
        reason: None,
    })
}
