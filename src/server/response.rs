use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Response, StatusCode};
use serde_json::{json, Map, Value};

use crate::dispatcher::HandlerResponse;
use crate::errors::{PipelineError, ValidationError};
use crate::ids::{RequestId, REQUEST_ID_HEADER};

const JSON: &str = "application/json";

/// JSON body for a failed request: `code` and `message`, plus `errors` for
/// validation failures.
pub fn error_body(err: &PipelineError) -> Value {
    let message = match err {
        PipelineError::Unauthenticated {
            reason: Some(reason), ..
        } => format!("{err}: {reason}"),
        _ => err.to_string(),
    };
    let mut body = json!({ "code": err.status(), "message": message });
    if let (PipelineError::Validation(result), Value::Object(map)) = (err, &mut body) {
        map.insert(
            "errors".to_string(),
            Value::Array(result.errors().iter().map(error_entry).collect()),
        );
    }
    body
}

fn error_entry(error: &ValidationError) -> Value {
    let mut entry = Map::new();
    entry.insert("code".into(), Value::from(error.kind.as_str()));
    entry.insert("path".into(), Value::from(error.path.as_str()));
    if let Some(location) = error.location {
        entry.insert("in".into(), Value::from(location.as_str()));
    }
    entry.insert("message".into(), Value::from(error.message.as_str()));
    Value::Object(entry)
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn set_header(res: &mut Response<Vec<u8>>, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        res.headers_mut().insert(name, value);
    }
}

pub fn write_json_error(err: &PipelineError, request_id: RequestId) -> Response<Vec<u8>> {
    let mut res = Response::new(error_body(err).to_string().into_bytes());
    *res.status_mut() = status_code(err.status());
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    if let PipelineError::MethodNotAllowed { allowed, .. } = err {
        set_header(&mut res, ALLOW.as_str(), &allowed.join(","));
    }
    set_header(&mut res, REQUEST_ID_HEADER, &request_id.to_string());
    res
}

/// Wrap an encoded handler body. Handler headers are copied as-is;
/// `Content-Type` falls back to the negotiated media type.
pub fn write_handler_response(
    response: &HandlerResponse,
    body: Vec<u8>,
    content_type: &str,
    request_id: RequestId,
) -> Response<Vec<u8>> {
    let mut res = Response::new(body);
    *res.status_mut() = status_code(response.status);
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_ref()), HeaderValue::from_str(value)) {
            res.headers_mut().append(name, value);
        }
    }
    if !res.body().is_empty() && !res.headers().contains_key(CONTENT_TYPE) {
        set_header(&mut res, CONTENT_TYPE.as_str(), content_type);
    }
    set_header(&mut res, REQUEST_ID_HEADER, &request_id.to_string());
    res
}
