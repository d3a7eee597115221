//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::classify::Classifier;
use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `install_timeout_ms` is below `timeout_ms` or exceeds 10 minutes
    /// - `generation` or `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - a route field does not start with `/`
    /// - a rule pattern does not compile
    ///
    /// Returns `ConfigError::Missing` if the static asset list is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.install_timeout_ms < self.timeout_ms {
            return Err(ConfigError::Invalid {
                field: "install_timeout_ms".into(),
                reason: "must be at least timeout_ms".into(),
            });
        }
        if self.install_timeout_ms > 600_000 {
            return Err(ConfigError::Invalid {
                field: "install_timeout_ms".into(),
                reason: "must not exceed 10 minutes (600000ms)".into(),
            });
        }

        if self.generation.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "generation".into(), reason: "must not be empty".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        let origin = self.origin_url()?;

        let routes = [
            ("offline_path", &self.offline_path),
            ("refresh_path", &self.refresh_path),
            ("share_path", &self.share_path),
            ("share_redirect", &self.share_redirect),
            ("shared_payload_path", &self.shared_payload_path),
        ];
        for (field, value) in routes {
            if !value.starts_with('/') {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must start with '/'".into() });
            }
        }

        if self.mutation_queue_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "mutation_queue_prefix".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.static_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_assets".into(),
                hint: "list at least the application shell, e.g. \"/\"".into(),
            });
        }

        Classifier::new(origin, &self.rules)
            .map_err(|e| ConfigError::Invalid { field: "rules".into(), reason: e.to_string() })?;

        if self.rules.is_empty() {
            tracing::warn!("rule table is empty; every request will be passed through");
        }

        Ok(())
    }
}
