//! Authentication: requirement alternatives, anonymous access and the
//! bundled Basic / API key authenticators.

mod common;

use std::collections::BTreeMap;

use base64::Engine;
use brrtcontract::dispatcher::{HandlerRequest, HandlerResponse};
use brrtcontract::errors::PipelineError;
use brrtcontract::security::{
    authorize, ApiKeyAuth, AuthContext, AuthOutcome, AuthRequest, AuthenticatorRegistry, BasicAuth, Principal,
};
use brrtcontract::server::{RawRequest, RequestPipeline};
use brrtcontract::spec::{load_spec_from_yaml, SecurityRequirement, SecurityScheme};
use brrtcontract::ContractConfig;
use common::{json_body, query};
use http::{HeaderMap, Method};
use serde_json::json;

fn requirement(schemes: &[&str]) -> SecurityRequirement {
    schemes.iter().map(|s| (s.to_string(), Vec::new())).collect()
}

fn basic_header(user: &str, pass: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
}

fn registry() -> AuthenticatorRegistry {
    let mut registry = AuthenticatorRegistry::new();
    registry.register(
        "basic",
        BasicAuth::new(|user: &str, pass: &str| {
            if user == "admin" && pass == "hunter2" {
                Ok(Principal::new(user))
            } else {
                Err("invalid credentials".to_string())
            }
        }),
    );
    registry.register("token", |req: &AuthRequest<'_>| match req.get_query("token") {
        None => AuthOutcome::not_applicable(),
        Some("t0k3n") => AuthOutcome::authenticated(Principal::new("token-user").with_claims(json!({"scope": "read"}))),
        Some(_) => AuthOutcome::rejected("expired token"),
    });
    registry
}

fn check(
    requirements: &[SecurityRequirement],
    headers: &HeaderMap,
    query: &[(String, String)],
) -> Result<Option<Principal>, PipelineError> {
    let definitions = BTreeMap::new();
    let ctx = AuthContext {
        method: &Method::GET,
        path: "/reports",
        headers,
        query,
        definitions: &definitions,
    };
    authorize(requirements, &registry(), &ctx, "getReports")
}

#[test]
fn test_no_requirements_means_no_principal() {
    assert_eq!(check(&[], &HeaderMap::new(), &[]).unwrap(), None);
}

#[test]
fn test_second_alternative_used_when_first_does_not_apply() {
    let principal = check(
        &[requirement(&["basic"]), requirement(&["token"])],
        &HeaderMap::new(),
        &query(&[("token", "t0k3n")]),
    )
    .unwrap()
    .unwrap();
    assert_eq!(principal.name, "token-user");
    assert_eq!(principal.scheme, "token");
    assert_eq!(principal.claims["scope"], "read");
}

#[test]
fn test_first_applicable_rejection_is_final() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", basic_header("admin", "wrong").parse().unwrap());
    let err = check(
        &[requirement(&["basic"]), requirement(&["token"])],
        &headers,
        &query(&[("token", "t0k3n")]),
    )
    .unwrap_err();
    assert_eq!(err.status(), 401);
    match err {
        PipelineError::Unauthenticated { operation, reason } => {
            assert_eq!(operation, "getReports");
            assert_eq!(reason.as_deref(), Some("invalid credentials"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_anonymous_alternative_after_failed_applicability() {
    let result = check(&[requirement(&["token"]), requirement(&[])], &HeaderMap::new(), &[]).unwrap();
    assert_eq!(result, None);
}

#[test]
fn test_no_applicable_alternative_is_401_without_reason() {
    let err = check(&[requirement(&["basic"]), requirement(&["token"])], &HeaderMap::new(), &[]).unwrap_err();
    assert!(matches!(err, PipelineError::Unauthenticated { reason: None, .. }));
}

#[test]
fn test_unregistered_scheme_skips_alternative() {
    let principal = check(
        &[requirement(&["oauth"]), requirement(&["token"])],
        &HeaderMap::new(),
        &query(&[("token", "t0k3n")]),
    )
    .unwrap();
    assert_eq!(principal.map(|p| p.name).as_deref(), Some("token-user"));
}

#[test]
fn test_malformed_basic_credentials_rejected() {
    for value in ["Basic !!!not-base64!!!", "Basic YWRtaW4="] {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        let err = check(&[requirement(&["basic"])], &headers, &[]).unwrap_err();
        assert!(
            matches!(err, PipelineError::Unauthenticated { reason: Some(_), .. }),
            "{value} should be rejected"
        );
    }
}

#[test]
fn test_bearer_header_is_not_basic() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Bearer abc".parse().unwrap());
    let err = check(&[requirement(&["basic"])], &headers, &[]).unwrap_err();
    assert!(matches!(err, PipelineError::Unauthenticated { reason: None, .. }));
}

const REPORTS: &str = r#"
swagger: "2.0"
info:
  title: Reports
  version: "1"
produces: [application/json]
securityDefinitions:
  key:
    type: apiKey
    name: api_key
    in: query
security:
  - key: []
paths:
  /reports:
    get:
      operationId: listReports
      responses:
        "200":
          description: ok
  /health:
    get:
      operationId: health
      security: []
      responses:
        "200":
          description: ok
  /public:
    get:
      operationId: publicReports
      security:
        - key: []
        - {}
      responses:
        "200":
          description: ok
"#;

fn reports_pipeline() -> RequestPipeline {
    let spec = load_spec_from_yaml(REPORTS).unwrap();
    let scheme: &SecurityScheme = &spec.security_definitions()["key"];
    let auth = ApiKeyAuth::from_scheme(scheme, |key: &str| {
        if key == "k-1" {
            Ok(Principal::new("reporter"))
        } else {
            Err("unknown key".to_string())
        }
    })
    .unwrap();
    let whoami = |req: HandlerRequest| HandlerResponse::json(200, json!({ "principal": req.principal.map(|p| p.name) }));
    RequestPipeline::builder(spec)
        .config(ContractConfig::default().with_authenticator("key", auth))
        .handler("listReports", whoami)
        .handler("health", whoami)
        .handler("publicReports", whoami)
        .build()
        .unwrap()
}

#[test]
fn test_query_api_key_through_pipeline() {
    let pipeline = reports_pipeline();
    let res = pipeline.handle(RawRequest::new(Method::GET, "/reports?api_key=k-1"));
    assert_eq!(res.status(), 200);
    assert_eq!(json_body(&res)["principal"], "reporter");

    let res = pipeline.handle(RawRequest::new(Method::GET, "/reports?api_key=nope"));
    assert_eq!(res.status(), 401);
    assert!(json_body(&res)["message"].as_str().unwrap().contains("unknown key"));

    assert_eq!(pipeline.handle(RawRequest::new(Method::GET, "/reports")).status(), 401);
}

#[test]
fn test_operation_level_empty_security_overrides_global() {
    let pipeline = reports_pipeline();
    let res = pipeline.handle(RawRequest::new(Method::GET, "/health"));
    assert_eq!(res.status(), 200);
    assert_eq!(json_body(&res)["principal"], serde_json::Value::Null);
}

#[test]
fn test_anonymous_alternative_through_pipeline() {
    let pipeline = reports_pipeline();
    let res = pipeline.handle(RawRequest::new(Method::GET, "/public"));
    assert_eq!(res.status(), 200);
    assert_eq!(json_body(&res)["principal"], serde_json::Value::Null);

    let res = pipeline.handle(RawRequest::new(Method::GET, "/public?api_key=k-1"));
    assert_eq!(json_body(&res)["principal"], "reporter");
}
