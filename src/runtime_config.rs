//! # Runtime Configuration
//!
//! Knobs that bound per-request work, loaded from the environment at
//! startup or embedded in a larger YAML/JSON config file.
//!
//! ## Environment Variables
//!
//! ### `BRRTC_MAX_BODY_BYTES`
//!
//! Largest request body read before answering 413. Accepts a plain byte
//! count or a `k`/`m` suffixed size (`512k`, `10m`).
//!
//! Default: `10m` (10 MiB)
//!
//! ### `BRRTC_MAX_SCHEMA_DEPTH`
//!
//! Deepest schema/value nesting the schema validator descends before
//! reporting a `depth_exceeded` error. Guards against hostile deeply
//! nested bodies.
//!
//! Default: `128`
//!
//! ### `BRRTC_DEFAULT_CONSUMES` / `BRRTC_DEFAULT_PRODUCES`
//!
//! Media type assumed for operations whose document declares no
//! `consumes` / `produces`, neither on the operation nor globally.
//!
//! Default: `application/json`
//!
//! ## Usage
//!
//! ```rust
//! use brrtcontract::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.max_body_bytes > 0);
//! ```
//!
//! ```bash
//! export BRRTC_MAX_BODY_BYTES=2m
//! export BRRTC_MAX_SCHEMA_DEPTH=64
//! ```

use std::env;

use serde::Deserialize;

use crate::validator::DEFAULT_MAX_DEPTH;

pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub max_body_bytes: usize,
    pub max_schema_depth: usize,
    pub default_consumes: String,
    pub default_produces: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_schema_depth: DEFAULT_MAX_DEPTH,
            default_consumes: DEFAULT_MEDIA_TYPE.to_string(),
            default_produces: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from `BRRTC_*` variables; unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_body_bytes: lookup("BRRTC_MAX_BODY_BYTES")
                .and_then(|v| parse_size(&v))
                .unwrap_or(defaults.max_body_bytes),
            max_schema_depth: lookup("BRRTC_MAX_SCHEMA_DEPTH")
                .and_then(|v| v.trim().parse().ok())
                .filter(|depth| *depth > 0)
                .unwrap_or(defaults.max_schema_depth),
            default_consumes: lookup("BRRTC_DEFAULT_CONSUMES")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_consumes),
            default_produces: lookup("BRRTC_DEFAULT_PRODUCES")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_produces),
        }
    }
}

/// `1024`, `512k`, `10m` (binary multiples, case-insensitive).
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim().to_ascii_lowercase();
    let (digits, multiplier) = match raw.chars().last()? {
        'k' => (&raw[..raw.len() - 1], 1024),
        'm' => (&raw[..raw.len() - 1], 1024 * 1024),
        _ => (raw.as_str(), 1),
    };
    digits.trim().parse::<usize>().ok()?.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("512K"), Some(512 * 1024));
        assert_eq!(parse_size("10m"), Some(DEFAULT_MAX_BODY_BYTES));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn test_from_lookup_keeps_defaults_for_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("BRRTC_MAX_BODY_BYTES", "2k"),
            ("BRRTC_MAX_SCHEMA_DEPTH", "zero"),
            ("BRRTC_DEFAULT_PRODUCES", "text/plain"),
        ]
        .into_iter()
        .collect();
        let config = RuntimeConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_body_bytes, 2048);
        assert_eq!(config.max_schema_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.default_consumes, DEFAULT_MEDIA_TYPE);
        assert_eq!(config.default_produces, "text/plain");
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let config: RuntimeConfig = serde_yaml::from_str("max_body_bytes: 4096\n").unwrap();
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.max_schema_depth, DEFAULT_MAX_DEPTH);
    }
}
