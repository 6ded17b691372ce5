use std::fmt;

use base64::Engine;

use super::{AuthOutcome, AuthRequest, Authenticator, Principal};

type BasicCheck = dyn Fn(&str, &str) -> Result<Principal, String> + Send + Sync;

/// HTTP Basic: applies when `Authorization: Basic ...` is present and
/// hands the decoded user and password to the caller's check.
pub struct BasicAuth {
    check: Box<BasicCheck>,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth").finish_non_exhaustive()
    }
}

impl BasicAuth {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Principal, String> + Send + Sync + 'static,
    {
        Self { check: Box::new(check) }
    }
}

/// `(user, password)` from an `Authorization` value; `None` when it is not
/// Basic, `Some(Err)` when it is Basic but malformed.
fn credentials(header: &str) -> Option<Result<(String, String), &'static str>> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = match base64::engine::general_purpose::STANDARD.decode(rest.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return Some(Err("basic credentials are not valid base64")),
    };
    let Ok(text) = String::from_utf8(decoded) else {
        return Some(Err("basic credentials are not valid UTF-8"));
    };
    Some(
        text.split_once(':')
            .map(|(user, pass)| (user.to_string(), pass.to_string()))
            .ok_or("basic credentials lack a ':' separator"),
    )
}

impl Authenticator for BasicAuth {
    fn authenticate(&self, req: &AuthRequest<'_>) -> AuthOutcome {
        let Some(found) = req.get_header("authorization").and_then(credentials) else {
            return AuthOutcome::not_applicable();
        };
        match found.map_err(str::to_string).and_then(|(user, pass)| (self.check)(&user, &pass)) {
            Ok(principal) => AuthOutcome::authenticated(principal),
            Err(reason) => AuthOutcome::rejected(reason),
        }
    }
}
