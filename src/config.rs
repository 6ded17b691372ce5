//! Immutable contract configuration.
//!
//! A [`ContractConfig`] is assembled once at startup, then shared (behind
//! an `Arc`) by route building, parameter binding, schema validation and
//! the request pipeline. Nothing in it changes while requests are served.

use std::sync::Arc;

use crate::codec::{CodecRegistry, Consumer, Producer};
use crate::formats::FormatRegistry;
use crate::runtime_config::RuntimeConfig;
use crate::security::{Authenticator, AuthenticatorRegistry};

#[derive(Debug, Default)]
pub struct ContractConfig {
    formats: FormatRegistry,
    codecs: CodecRegistry,
    authenticators: AuthenticatorRegistry,
    runtime: RuntimeConfig,
}

impl ContractConfig {
    /// Default formats and codecs, no authenticators, runtime knobs from
    /// the `BRRTC_*` environment.
    pub fn from_env() -> Self {
        Self {
            runtime: RuntimeConfig::from_env(),
            ..Self::default()
        }
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn authenticators(&self) -> &AuthenticatorRegistry {
        &self.authenticators
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    #[must_use]
    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    #[must_use]
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn with_format<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.formats.register(name, check);
        self
    }

    #[must_use]
    pub fn with_consumer(mut self, media_type: &str, consumer: impl Consumer + 'static) -> Self {
        self.codecs.register_consumer(media_type, consumer);
        self
    }

    #[must_use]
    pub fn with_producer(mut self, media_type: &str, producer: impl Producer + 'static) -> Self {
        self.codecs.register_producer(media_type, producer);
        self
    }

    /// Register the authenticator for a `securityDefinitions` entry.
    #[must_use]
    pub fn with_authenticator(mut self, scheme: impl Into<String>, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticators.register(scheme, authenticator);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
