//! Configuration structures for S4 clients.
//!
//! [`S4ClientConfig`] gathers everything needed to reach one hosted repository:
//! the S4 domain, the user/database/repository identifiers, the API key pair and
//! the request tuning knobs. It is typically deserialized from a settings file.

use crate::client::{ClientConfig, RetryPolicy};
use crate::types::{ApiCredentials, RepositoryLocation, DEFAULT_HOST};
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for an S4 repository client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct S4ClientConfig {
    /// S4 domain (`rdf.<host>` serves the SPARQL endpoints)
    #[validate(length(min = 1))]
    #[serde(default = "default_host")]
    pub host: String,

    /// User identifier
    #[validate(length(min = 1))]
    pub user_id: String,

    /// Database identifier
    #[validate(length(min = 1))]
    pub db_id: String,

    /// Repository name
    #[validate(length(min = 1))]
    pub repository: String,

    /// API key identifier
    #[validate(length(min = 1))]
    pub api_key: String,

    /// API key secret
    pub key_secret: SecretString,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of retry attempts for queries
    #[validate(range(min = 0, max = 10))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

impl S4ClientConfig {
    /// Create a new client configuration with required parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier or the API key is empty, or if the
    /// resulting endpoint URL is invalid.
    pub fn new(location: &RepositoryLocation, credentials: &ApiCredentials) -> Result<Self, Error> {
        let config = Self {
            host: location.host().to_string(),
            user_id: location.user_id().to_string(),
            db_id: location.db_id().to_string(),
            repository: location.repository().to_string(),
            api_key: credentials.api_key().to_string(),
            key_secret: SecretString::from(credentials.key_secret().to_string()),
            tls_verify: default_tls_verify(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        };

        config.check()?;
        Ok(config)
    }

    /// Run field validation and check that the endpoint URLs can be built.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first problem found.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        self.statements_url()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        Ok(())
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set maximum retry attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The repository this configuration points at.
    #[must_use]
    pub fn location(&self) -> RepositoryLocation {
        RepositoryLocation::new(&self.user_id, &self.db_id, &self.repository).with_host(&self.host)
    }

    /// The API key pair.
    #[must_use]
    pub fn credentials(&self) -> ApiCredentials {
        ApiCredentials::new(&self.api_key, self.key_secret.expose_secret())
    }

    /// SPARQL update endpoint for the configured repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifiers do not form a valid URL.
    pub fn statements_url(&self) -> Result<Url, Error> {
        self.location().statements_url()
    }

    /// HTTP settings derived from this configuration.
    #[must_use]
    pub fn http_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(self.timeout())
            .with_tls_verify(self.tls_verify)
            .with_retry_policy(RetryPolicy::new().with_max_retries(self.max_retries))
    }
}
