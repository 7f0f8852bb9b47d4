//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::routes::{PatternSpec, RouteConfig};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Transport timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Origin of the application the engine serves, e.g. `https://app.example.com`.
    ///
    /// Relative manifest paths resolve against it and requests to any other
    /// origin are passed through unless allow-listed.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Deployment generation tag. Bumping it is the only upgrade mechanism.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Name prefix of the precache namespace.
    #[serde(default = "default_precache_prefix")]
    pub precache_prefix: String,

    /// Name prefix of the runtime namespace.
    #[serde(default = "default_runtime_prefix")]
    pub runtime_prefix: String,

    /// Assets fetched and stored during install, in order.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Shell document served to offline navigations.
    #[serde(default = "default_navigation_fallback")]
    pub navigation_fallback: String,

    /// Activate right after a successful install.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Take control of already-open clients on activation.
    #[serde(default = "default_true")]
    pub clients_claim: bool,

    /// Third-party hosts whose requests are intercepted.
    #[serde(default = "default_third_party_allowlist")]
    pub third_party_allowlist: Vec<String>,

    /// Routing rule sets.
    #[serde(default = "default_routes")]
    pub routes: RouteConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_generation() -> String {
    "v1".into()
}

fn default_precache_prefix() -> String {
    "app-shell".into()
}

fn default_runtime_prefix() -> String {
    "app-runtime".into()
}

fn default_precache_manifest() -> Vec<String> {
    ["/", "/index.html", "/manifest.json", "/favicon.ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_navigation_fallback() -> String {
    "/index.html".into()
}

fn default_true() -> bool {
    true
}

fn default_third_party_allowlist() -> Vec<String> {
    ["fonts.googleapis.com", "fonts.gstatic.com", "www.googletagmanager.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_routes() -> RouteConfig {
    let no_cache = ["/sitemap.xml", "/robots.txt", "/manifest.json"]
        .into_iter()
        .map(|s| PatternSpec::PathSuffix(s.into()))
        .collect();

    let network_first = ["api.", "www.googletagmanager.com", "www.google-analytics.com", "fonts.googleapis.com"]
        .into_iter()
        .map(|s| PatternSpec::HostPrefix(s.into()))
        .collect();

    let mut cache_first: Vec<PatternSpec> =
        ["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "js", "css", "woff", "woff2"]
            .into_iter()
            .map(|s| PatternSpec::Extension(s.into()))
            .collect();
    cache_first.push(PatternSpec::HostPrefix("fonts.gstatic.com".into()));

    RouteConfig { no_cache, network_first, cache_first }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            origin: default_origin(),
            generation: default_generation(),
            precache_prefix: default_precache_prefix(),
            runtime_prefix: default_runtime_prefix(),
            precache_manifest: default_precache_manifest(),
            navigation_fallback: default_navigation_fallback(),
            skip_waiting: true,
            clients_claim: true,
            third_party_allowlist: default_third_party_allowlist(),
            routes: default_routes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the current-generation precache namespace, e.g. `app-shell-v1`.
    pub fn precache_name(&self) -> String {
        format!("{}-{}", self.precache_prefix, self.generation)
    }

    /// Name of the current-generation runtime namespace, e.g. `app-runtime-v1`.
    pub fn runtime_name(&self) -> String {
        format!("{}-{}", self.runtime_prefix, self.generation)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
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
        assert_eq!(config.db_path, PathBuf::from("./shellcache.sqlite"));
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 10_485_760);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.generation, "v1");
        assert_eq!(config.precache_manifest, vec!["/", "/index.html", "/manifest.json", "/favicon.ico"]);
        assert_eq!(config.navigation_fallback, "/index.html");
        assert!(config.skip_waiting);
        assert!(config.clients_claim);
        assert_eq!(config.routes.no_cache.len(), 3);
    }

    #[test]
    fn test_namespace_names() {
        let config = AppConfig { generation: "v7".into(), ..Default::default() };
        assert_eq!(config.precache_name(), "app-shell-v7");
        assert_eq!(config.runtime_name(), "app-runtime-v7");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_load_env_overrides_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "shellcache.toml",
                r#"
                generation = "v2"
                origin = "https://app.example.com"
                precache_manifest = ["/", "/index.html"]

                [routes]
                no_cache = [{ kind = "path_suffix", value = "/sitemap.xml" }]
                "#,
            )?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "shellcache.toml");
            jail.set_env("SHELLCACHE_GENERATION", "v3");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.generation, "v3");
            assert_eq!(config.origin, "https://app.example.com");
            assert_eq!(config.precache_manifest, vec!["/", "/index.html"]);
            assert_eq!(config.routes.no_cache, vec![PatternSpec::PathSuffix("/sitemap.xml".into())]);
            assert_eq!(config.routes.cache_first, default_routes().cache_first);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("SHELLCACHE_TIMEOUT_MS", "5");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
            Ok(())
        });
    }
}
