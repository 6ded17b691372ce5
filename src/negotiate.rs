//! # Content Negotiation
//!
//! Request `Content-Type` is checked against an operation's `consumes`;
//! the response media type is picked from its `produces` by the client's
//! `Accept` header, following RFC 7231 §5.3:
//!
//! - every range carries a quality (`q`, default 1);
//! - an offer takes the quality of the most specific range matching it
//!   (`type/sub;param` > `type/sub` > `type/*` > `*/*`);
//! - `q=0` rules an offer out;
//! - the highest quality wins, ties go to the first offer.

use tracing::debug;

use crate::errors::PipelineError;

/// Media type assumed for requests without a `Content-Type` header.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A parsed media type or media range, lowercased.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub main: String,
    pub sub: String,
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// Parse `type/subtype;k=v;...`. A lone `*` reads as `*/*`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        let (main, sub) = match essence.as_str() {
            "*" => ("*".to_string(), "*".to_string()),
            other => {
                let (main, sub) = other.split_once('/')?;
                (main.trim().to_string(), sub.trim().to_string())
            }
        };
        if main.is_empty() || sub.is_empty() || (main == "*" && sub != "*") {
            return None;
        }
        let params = parts
            .filter_map(|p| {
                let (k, v) = p.split_once('=')?;
                Some((k.trim().to_ascii_lowercase(), v.trim().trim_matches('"').to_string()))
            })
            .collect();
        Some(Self { main, sub, params })
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main, self.sub)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Whether this range covers `offer`. Range parameters must all be
    /// present on the offer.
    pub fn covers(&self, offer: &MediaType) -> bool {
        let type_ok = self.main == "*" || self.main == offer.main;
        let sub_ok = self.sub == "*" || self.sub == offer.sub;
        type_ok
            && sub_ok
            && self
                .params
                .iter()
                .all(|(k, v)| offer.param(k).is_some_and(|ov| ov.eq_ignore_ascii_case(v)))
    }

    /// Ordering key for "more specific overrides less specific".
    fn specificity(&self) -> (u8, usize) {
        let level = match (self.main.as_str(), self.sub.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        };
        (level, self.params.len())
    }
}

/// Lowercased `type/subtype` of a header value, parameters stripped.
pub fn media_type_essence(raw: &str) -> Option<String> {
    MediaType::parse(raw).map(|m| m.essence())
}

#[derive(Debug, Clone)]
struct AcceptRange {
    range: MediaType,
    quality: f32,
}

fn parse_accept(header: &str) -> Vec<AcceptRange> {
    header
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .filter_map(|part| {
            let mut range = MediaType::parse(part)?;
            // parameters after q are accept-extensions, not range parameters
            let q_at = range.params.iter().position(|(k, _)| k == "q");
            let quality = match q_at {
                Some(i) => {
                    let q = range.params[i].1.parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q))?;
                    range.params.truncate(i);
                    q
                }
                None => 1.0,
            };
            Some(AcceptRange { range, quality })
        })
        .collect()
}

/// Most specific range covering `offer`; the earliest listed wins a tie.
fn most_specific<'r>(ranges: &'r [AcceptRange], offer: &MediaType) -> Option<&'r AcceptRange> {
    ranges
        .iter()
        .filter(|r| r.range.covers(offer))
        .fold(None, |best: Option<&AcceptRange>, r| match best {
            Some(b) if b.range.specificity() >= r.range.specificity() => Some(b),
            _ => Some(r),
        })
}

/// Stateless checks of request and response media types.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentNegotiator;

impl ContentNegotiator {
    /// Check the request `Content-Type` against `consumes` and return its
    /// essence. Entries of `consumes` may be ranges (`application/*`).
    pub fn validate_content_type(consumes: &[String], header: Option<&str>) -> Result<String, PipelineError> {
        let raw = header.map(str::trim).filter(|h| !h.is_empty()).unwrap_or(DEFAULT_CONTENT_TYPE);
        let unsupported = || PipelineError::UnsupportedMediaType {
            content_type: raw.to_string(),
            allowed: consumes.to_vec(),
        };
        let actual = MediaType::parse(raw).ok_or_else(unsupported)?;
        let accepted = consumes
            .iter()
            .filter_map(|c| MediaType::parse(c))
            .any(|allowed| {
                (allowed.main == "*" || allowed.main == actual.main) && (allowed.sub == "*" || allowed.sub == actual.sub)
            });
        if accepted {
            Ok(actual.essence())
        } else {
            debug!(content_type = %raw, consumes = ?consumes, "Content-Type rejected");
            Err(unsupported())
        }
    }

    /// Pick the response media type from `produces`.
    ///
    /// An absent or empty `Accept` picks the first offer.
    pub fn negotiate_accept(produces: &[String], accept: Option<&str>) -> Result<String, PipelineError> {
        let not_acceptable = || PipelineError::NotAcceptable {
            accept: accept.unwrap_or_default().to_string(),
            offered: produces.to_vec(),
        };
        let header = match accept.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => return produces.first().cloned().ok_or_else(not_acceptable),
        };
        let ranges = parse_accept(header);

        let mut best: Option<(&String, f32)> = None;
        for offer in produces {
            let Some(parsed) = MediaType::parse(offer) else {
                continue;
            };
            let quality = most_specific(&ranges, &parsed).map_or(0.0, |r| r.quality);
            if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
                best = Some((offer, quality));
            }
        }

        match best {
            Some((offer, quality)) => {
                debug!(accept = %header, selected = %offer, quality, "Response media type negotiated");
                Ok(offer.clone())
            }
            None => Err(not_acceptable()),
        }
    }
}
