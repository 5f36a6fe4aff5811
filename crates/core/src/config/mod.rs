//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWTIER_*)
//! 2. TOML config file (if SWTIER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::TierNames;

mod validation;

pub use validation::ConfigError;

/// Path classification rules consumed by the strategy selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRules {
    /// Substrings marking dynamic or mutating endpoints.
    #[serde(default = "default_api_markers")]
    pub api_markers: Vec<String>,

    /// Path prefix under which image assets live.
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    /// Top-level application sections (prefix match). `/` is always exact.
    #[serde(default = "default_app_routes")]
    pub app_routes: Vec<String>,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self {
            api_markers: default_api_markers(),
            image_prefix: default_image_prefix(),
            app_routes: default_app_routes(),
        }
    }
}

fn default_api_markers() -> Vec<String> {
    ["/api/", "/generate", "/chat", "/submit"].map(String::from).to_vec()
}

fn default_image_prefix() -> String {
    "/static/images/".into()
}

fn default_app_routes() -> Vec<String> {
    ["/dashboard", "/syllabi", "/assignments", "/todos", "/study-plans"]
        .map(String::from)
        .to_vec()
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWTIER_*)
/// 2. TOML config file (if SWTIER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trusted origin of the application being cached.
    ///
    /// Set via SWTIER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Third-party asset origins that are intercepted and cached too.
    #[serde(default = "default_asset_origins")]
    pub asset_origins: Vec<String>,

    /// Prefix shared by every tier name of this application.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version suffix of the tier names. Bumping it retires every older tier
    /// on the next activation.
    ///
    /// Set via SWTIER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SWTIER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upper bound on every network fetch in milliseconds.
    ///
    /// Set via SWTIER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cookie header sent when the credential scope of a fetch allows it.
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// Page served to navigations when both network and cache fail.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Image served when an image cannot be fetched.
    #[serde(default = "default_offline_placeholder")]
    pub offline_placeholder: String,

    /// Resources that must be cached at install for offline operation.
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,

    /// Resources cached best-effort after activation.
    #[serde(default = "default_secondary_assets")]
    pub secondary_assets: Vec<String>,

    #[serde(default)]
    pub routing: RoutingRules,
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_asset_origins() -> Vec<String> {
    vec!["https://cdn.jsdelivr.net".into(), "https://cdnjs.cloudflare.com".into()]
}

fn default_cache_prefix() -> String {
    "ai-learning".into()
}

fn default_cache_version() -> String {
    "v2".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swtier-cache.sqlite")
}

fn default_user_agent() -> String {
    "swtier/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_offline_page() -> String {
    "/offline".into()
}

fn default_offline_placeholder() -> String {
    "/static/images/offline-placeholder.png".into()
}

fn default_core_assets() -> Vec<String> {
    [
        "/",
        "/offline",
        "/static/manifest.json",
        "/static/js/register-sw.js",
        "/static/images/icon-192x192.png",
        "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css",
    ]
    .map(String::from)
    .to_vec()
}

fn default_secondary_assets() -> Vec<String> {
    [
        "/login",
        "/register",
        "/dashboard",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css",
        "https://cdn.jsdelivr.net/npm/axios/dist/axios.min.js",
        "/static/images/icon-512x512.png",
        "/static/images/icon-152x152.png",
        "/static/images/icon-180x180.png",
        "/static/images/icon-167x167.png",
        "/static/images/favicon-32x32.png",
        "/static/images/favicon-16x16.png",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            asset_origins: default_asset_origins(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            session_cookie: None,
            offline_page: default_offline_page(),
            offline_placeholder: default_offline_placeholder(),
            core_assets: default_core_assets(),
            secondary_assets: default_secondary_assets(),
            routing: RoutingRules::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The known-tier set of the current version.
    pub fn tier_names(&self) -> TierNames {
        TierNames::new(&self.cache_prefix, &self.cache_version)
    }

    /// Parsed trusted origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve a configured path or absolute URL against the trusted origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if either the origin or the joined URL
    /// fails to parse.
    pub fn resolve(&self, path_or_url: &str) -> Result<Url, ConfigError> {
        self.origin_url()?.join(path_or_url).map_err(|e| ConfigError::Invalid {
            field: "asset".into(),
            reason: format!("{path_or_url}: {e}"),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWTIER_`
    /// 2. TOML file from `SWTIER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWTIER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWTIER_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "http://localhost:5000");
        assert_eq!(config.cache_prefix, "ai-learning");
        assert_eq!(config.cache_version, "v2");
        assert_eq!(config.db_path, PathBuf::from("./swtier-cache.sqlite"));
        assert_eq!(config.timeout_ms, 15_000);
        assert_eq!(config.offline_page, "/offline");
        assert!(config.core_assets.contains(&"/offline".to_string()));
        assert_eq!(config.secondary_assets.len(), 11);
        assert!(config.session_cookie.is_none());
        assert_eq!(config.routing.image_prefix, "/static/images/");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(15_000));
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let config = AppConfig::default();
        assert_eq!(config.resolve("/offline").unwrap().as_str(), "http://localhost:5000/offline");
        assert_eq!(
            config.resolve("https://cdn.jsdelivr.net/npm/axios/dist/axios.min.js").unwrap().host_str(),
            Some("cdn.jsdelivr.net")
        );
    }

    #[test]
    fn test_resolve_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(config.resolve("/"), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_load_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("SWTIER_CACHE_VERSION", "v3");
            jail.set_env("SWTIER_TIMEOUT_MS", "2500");
            jail.set_env("SWTIER_ROUTING__IMAGE_PREFIX", "/img/");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, "v3");
            assert_eq!(config.timeout_ms, 2500);
            assert_eq!(config.routing.image_prefix, "/img/");
            assert_eq!(config.routing.app_routes, default_app_routes());
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "swtier.toml",
                r#"
                origin = "https://learn.example.com"
                cache_prefix = ""
                core_assets = ["/", "/offline"]
                "#,
            )?;
            jail.set_env("SWTIER_CONFIG_FILE", "swtier.toml");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.origin, "https://learn.example.com");
            assert_eq!(config.core_assets.len(), 2);
            assert_eq!(config.tier_names().name(crate::cache::TierPurpose::Static), "static-v2");
            Ok(())
        });
    }
}
