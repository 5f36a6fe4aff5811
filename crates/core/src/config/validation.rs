//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

const MAX_BYTES: std::ops::RangeInclusive<usize> = 1..=50 * 1024 * 1024;
const TIMEOUT_MS: std::ops::RangeInclusive<u64> = 100..=300_000;

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a non-http(s) origin, an asset
    /// origin that is not an absolute URL, `max_bytes` outside 1 byte to
    /// 50MB, `timeout_ms` outside 100ms to 5 minutes, or an empty user agent
    /// or cache version.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "must be http or https"));
        }

        if let Some(bad) = self.asset_origins.iter().find(|o| url::Url::parse(o).is_err()) {
            return Err(invalid("asset_origins", format!("not an absolute URL: {bad}")));
        }

        if !MAX_BYTES.contains(&self.max_bytes) {
            return Err(invalid("max_bytes", format!("must be between 1 and {} bytes", MAX_BYTES.end())));
        }
        if !TIMEOUT_MS.contains(&self.timeout_ms) {
            return Err(invalid("timeout_ms", "must be between 100ms and 5 minutes (300000ms)"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.cache_version.trim().is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        if !self.core_assets.contains(&self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline page is not a core asset; offline navigations will have no fallback"
            );
        }

        Ok(())
    }
}
