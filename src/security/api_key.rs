use std::fmt;

use super::{AuthOutcome, AuthRequest, Authenticator, Principal};
use crate::spec::{SecurityScheme, SecuritySchemeType};

type KeyCheck = dyn Fn(&str) -> Result<Principal, String> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// API key in a named header or query parameter, checked by the caller.
pub struct ApiKeyAuth {
    name: String,
    location: ApiKeyLocation,
    check: Box<KeyCheck>,
}

impl fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("name", &self.name)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl ApiKeyAuth {
    pub fn new<F>(name: impl Into<String>, location: ApiKeyLocation, check: F) -> Self
    where
        F: Fn(&str) -> Result<Principal, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            location,
            check: Box::new(check),
        }
    }

    /// Take the key name and location from an `apiKey` security definition.
    pub fn from_scheme<F>(scheme: &SecurityScheme, check: F) -> Option<Self>
    where
        F: Fn(&str) -> Result<Principal, String> + Send + Sync + 'static,
    {
        if scheme.scheme_type != SecuritySchemeType::ApiKey {
            return None;
        }
        let location = match scheme.location.as_deref()? {
            "header" => ApiKeyLocation::Header,
            "query" => ApiKeyLocation::Query,
            _ => return None,
        };
        Some(Self::new(scheme.name.clone()?, location, check))
    }
}

impl Authenticator for ApiKeyAuth {
    fn authenticate(&self, req: &AuthRequest<'_>) -> AuthOutcome {
        let key = match self.location {
            ApiKeyLocation::Header => req.get_header(&self.name),
            ApiKeyLocation::Query => req.get_query(&self.name),
        };
        match key.filter(|k| !k.is_empty()) {
            None => AuthOutcome::not_applicable(),
            Some(key) => match (self.check)(key) {
                Ok(principal) => AuthOutcome::authenticated(principal),
                Err(reason) => AuthOutcome::rejected(reason),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};
    use serde_json::json;

    fn check(key: &str) -> Result<Principal, String> {
        if key == "k1" {
            Ok(Principal::new("robot"))
        } else {
            Err("unknown key".into())
        }
    }

    #[test]
    fn test_query_key_from_scheme() {
        let scheme: SecurityScheme =
            serde_json::from_value(json!({"type": "apiKey", "name": "api_key", "in": "query"})).unwrap();
        let auth = ApiKeyAuth::from_scheme(&scheme, check).unwrap();
        let headers = HeaderMap::new();
        let query = vec![("api_key".to_string(), "k1".to_string())];
        let req = AuthRequest {
            method: &Method::GET,
            path: "/",
            headers: &headers,
            query: &query,
            scheme_name: "api_key",
            scheme: Some(&scheme),
            scopes: &[],
        };
        assert_eq!(auth.authenticate(&req).principal.map(|p| p.name), Some("robot".into()));
    }

    #[test]
    fn test_header_key_rejected() {
        let auth = ApiKeyAuth::new("X-API-Key", ApiKeyLocation::Header, check);
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "nope".parse().unwrap());
        let req = AuthRequest {
            method: &Method::GET,
            path: "/",
            headers: &headers,
            query: &[],
            scheme_name: "key",
            scheme: None,
            scopes: &[],
        };
        let outcome = auth.authenticate(&req);
        assert!(outcome.applies);
        assert_eq!(outcome.error.as_deref(), Some("unknown key"));
    }

    #[test]
    fn test_basic_scheme_is_not_api_key() {
        let scheme: SecurityScheme = serde_json::from_value(json!({"type": "basic"})).unwrap();
        assert!(ApiKeyAuth::from_scheme(&scheme, check).is_none());
    }
}
