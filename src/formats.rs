//! # String Formats
//!
//! Registry of named string formats (`date-time`, `uuid`, `email`, ...) checked
//! by the schema validator whenever a string value carries a `format`.
//!
//! A format that is not registered is reported as an *unknown format* error
//! rather than silently accepted, so callers that use custom formats must
//! register them before building the pipeline:
//!
//! ```rust
//! use brrtcontract::formats::FormatRegistry;
//!
//! let mut formats = FormatRegistry::default();
//! formats.register("semver", |s| s.split('.').count() == 3);
//! assert!(formats.is_valid("semver", "1.2.3"));
//! ```
//!
//! The numeric formats (`int32`, `int64`, `float`, `double`) are not string
//! formats; they are enforced by the type checker and never consult the
//! registry.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Predicate deciding whether a string satisfies a format.
pub type FormatCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Formats handled by the type checker rather than the registry.
pub const NUMERIC_FORMATS: [&str; 4] = ["int32", "int64", "float", "double"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    Valid,
    Invalid,
    Unknown,
}

#[derive(Clone)]
pub struct FormatRegistry {
    checks: HashMap<String, FormatCheck>,
}

impl Debug for FormatRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.checks.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FormatRegistry").field("formats", &names).finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// Registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Registry preloaded with the Swagger 2.0 formats and the common
    /// extensions (`uuid`, `email`, `hostname`, `ipv4`, ...).
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("date", |s| parse_date(s).is_some());
        registry.register("date-time", |s| parse_date_time(s).is_some());
        registry.register("byte", |s| decode_base64(s).is_some());
        registry.register("binary", |_| true);
        registry.register("password", |_| true);
        registry.register("uri", is_uri);
        registry.register("email", is_email);
        registry.register("hostname", is_hostname);
        registry.register("ipv4", |s| s.parse::<Ipv4Addr>().is_ok());
        registry.register("ipv6", |s| s.parse::<Ipv6Addr>().is_ok());
        registry.register("uuid", |s| uuid::Uuid::parse_str(s).is_ok());
        registry.register("uuid3", |s| is_uuid_version(s, 3));
        registry.register("uuid4", |s| is_uuid_version(s, 4));
        registry.register("uuid5", |s| is_uuid_version(s, 5));
        registry.register("hexcolor", |s| HEX_COLOR.is_match(s));
        registry.register("rgbcolor", |s| RGB_COLOR.is_match(s));
        registry.register("isbn10", is_isbn10);
        registry.register("isbn13", is_isbn13);
        registry.register("isbn", |s| is_isbn10(s) || is_isbn13(s));
        registry.register("creditcard", is_credit_card);
        registry.register("ssn", |s| SSN.is_match(s));
        registry.register("duration", |s| DURATION.is_match(s));
        registry
    }

    /// Register (or replace) a format.
    pub fn register<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.checks.insert(name.into(), Arc::new(check));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    pub fn validate(&self, name: &str, value: &str) -> FormatOutcome {
        match self.checks.get(name) {
            Some(check) if check(value) => FormatOutcome::Valid,
            Some(_) => FormatOutcome::Invalid,
            None => FormatOutcome::Unknown,
        }
    }

    /// True only for a registered format that accepts `value`.
    pub fn is_valid(&self, name: &str, value: &str) -> bool {
        self.validate(name, value) == FormatOutcome::Valid
    }
}

/// Full-date per RFC 3339 (`2024-02-29`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Date-time per RFC 3339. A missing offset is read as UTC, and a space is
/// accepted in place of the `T` separator.
pub fn parse_date_time(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let normalized = s.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Standard base64, falling back to the URL-safe alphabet.
pub fn decode_base64(s: &str) -> Option<Vec<u8>> {
    STANDARD.decode(s).or_else(|_| URL_SAFE.decode(s)).ok()
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("email regex should be valid")
});

static HOSTNAME_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
        .expect("hostname label regex should be valid")
});

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("hexcolor regex should be valid"));

static RGB_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgb\(\s*(?:0|[1-9]\d?|1\d\d?|2[0-4]\d|25[0-5])\s*,\s*(?:0|[1-9]\d?|1\d\d?|2[0-4]\d|25[0-5])\s*,\s*(?:0|[1-9]\d?|1\d\d?|2[0-4]\d|25[0-5])\s*\)$")
        .expect("rgbcolor regex should be valid")
});

static SSN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}[- ]?\d{2}[- ]?\d{4}$").expect("ssn regex should be valid"));

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)?\s*(?:ns|us|µs|ms|s|m|h|d|w)\s*)+$")
        .expect("duration regex should be valid")
});

fn is_uri(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

fn is_email(s: &str) -> bool {
    s.len() <= 254 && EMAIL.is_match(s)
}

fn is_hostname(s: &str) -> bool {
    let host = s.strip_suffix('.').unwrap_or(s);
    !host.is_empty() && host.len() <= 255 && host.split('.').all(|label| HOSTNAME_LABEL.is_match(label))
}

fn is_uuid_version(s: &str, version: usize) -> bool {
    uuid::Uuid::parse_str(s)
        .map(|u| u.get_version_num() == version)
        .unwrap_or(false)
}

fn isbn_digits(s: &str) -> Vec<char> {
    s.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

fn is_isbn10(s: &str) -> bool {
    let digits = isbn_digits(s);
    if digits.len() != 10 {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in digits.iter().enumerate() {
        let value = match (i, c) {
            (9, 'X' | 'x') => 10,
            (_, c) => match c.to_digit(10) {
                Some(d) => d,
                None => return false,
            },
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

fn is_isbn13(s: &str) -> bool {
    let digits = isbn_digits(s);
    if digits.len() != 13 {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in digits.iter().enumerate() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        sum += if i % 2 == 0 { d } else { d * 3 };
    }
    sum % 10 == 0
}

/// Luhn checksum over 12 to 19 digits, ignoring spaces and dashes.
fn is_credit_card(s: &str) -> bool {
    let digits: Vec<u32> = match s
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<_>>>()
    {
        Some(d) => d,
        None => return false,
    };
    if !(12..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                *d
            }
        })
        .sum();
    sum % 10 == 0
}
