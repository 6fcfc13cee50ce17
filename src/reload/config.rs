//! Client configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! is a valid configuration:
//!
//! ```json
//! {
//!   "events_path": "/sse",
//!   "retry_ms": 3000,
//!   "connect_timeout_ms": 10000,
//!   "max_document_size": 8388608,
//!   "user_agent": null
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_BODY_SIZE, HttpClient};
use crate::sse::DEFAULT_RETRY;

/// Errors produced while loading a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Settings for a [`ReloadClient`](super::ReloadClient).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use livereload::reload::ClientConfig;
///
/// let config = ClientConfig::from_json_str(r#"{ "retry_ms": 500 }"#).unwrap();
/// assert_eq!(config.events_path, "/sse");
/// assert_eq!(config.retry_interval(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Path of the event stream, on the page's origin.
    pub events_path: String,
    /// Reconnection time until the server sends `retry:`.
    pub retry_ms: u64,
    /// TCP connect timeout for every request.
    pub connect_timeout_ms: u64,
    /// Largest document a refetch accepts, in bytes.
    pub max_document_size: usize,
    /// `User-Agent` override.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            events_path: "/sse".to_owned(),
            retry_ms: DEFAULT_RETRY.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_document_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] for malformed JSON or unknown fields,
    /// [`ConfigError::Invalid`] for values that fail [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events_path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "events_path",
                reason: "must not be empty",
            });
        }
        if self.retry_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "retry_ms",
                reason: "must be greater than zero",
            });
        }
        if self.max_document_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_document_size",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn events_path(mut self, path: impl Into<String>) -> Self {
        self.events_path = path.into();
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry_ms = retry.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn max_document_size(mut self, max_bytes: usize) -> Self {
        self.max_document_size = max_bytes;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// An [`HttpClient`] carrying these settings.
    pub fn http_client(&self) -> HttpClient {
        let client = HttpClient::new()
            .connect_timeout(self.connect_timeout_duration())
            .max_body_size(self.max_document_size);
        match &self.user_agent {
            Some(agent) => client.user_agent(agent.clone()),
            None => client,
        }
    }
}
