//! Resolved per-generation worker configuration.

use shellcache_core::{AppConfig, Error, PatternRegistry};
use url::Url;

use crate::fetch::{canonicalize, resolve};

/// Everything a worker generation needs, resolved up front: namespace
/// names, absolute manifest URLs, the routing table and origin scope.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub generation: String,
    pub precache_name: String,
    pub runtime_name: String,
    pub precache_prefix: String,
    pub runtime_prefix: String,
    pub manifest: Vec<Url>,
    pub navigation_fallback: Url,
    /// Lowercase third-party hosts that are intercepted.
    pub third_party_allowlist: Vec<String>,
    pub registry: PatternRegistry,
    pub skip_waiting: bool,
    pub clients_claim: bool,
}

impl WorkerConfig {
    /// Resolve application configuration into a worker configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for an unusable origin, manifest entry or
    /// fallback, and `Error::InvalidInput` for a route pattern that does not compile.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let resolve_path = |path: &str| resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")));

        let manifest = config
            .precache_manifest
            .iter()
            .map(|path| resolve_path(path))
            .collect::<Result<Vec<_>, _>>()?;
        let navigation_fallback = resolve_path(&config.navigation_fallback)?;

        Ok(Self {
            generation: config.generation.clone(),
            precache_name: config.precache_name(),
            runtime_name: config.runtime_name(),
            precache_prefix: config.precache_prefix.clone(),
            runtime_prefix: config.runtime_prefix.clone(),
            manifest,
            navigation_fallback,
            third_party_allowlist: config
                .third_party_allowlist
                .iter()
                .map(|host| host.trim().to_ascii_lowercase())
                .collect(),
            registry: PatternRegistry::from_config(&config.routes)?,
            skip_waiting: config.skip_waiting,
            clients_claim: config.clients_claim,
            origin,
        })
    }

    /// Generation tag of a precache namespace, e.g. `v1` for `app-shell-v1`.
    /// `None` for runtime namespaces and unrelated names.
    pub fn generation_of<'a>(&self, namespace: &'a str) -> Option<&'a str> {
        if namespace
            .strip_prefix(self.runtime_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
        {
            return None;
        }

        namespace
            .strip_prefix(self.precache_prefix.as_str())?
            .strip_prefix('-')
            .filter(|generation| !generation.is_empty())
    }

    /// Runtime namespace paired with a generation tag.
    pub fn runtime_for(&self, generation: &str) -> String {
        format!("{}-{}", self.runtime_prefix, generation)
    }

    /// Same origin as the application, or an allow-listed third-party host.
    pub fn is_in_scope(&self, url: &Url) -> bool {
        if url.origin() == self.origin.origin() {
            return true;
        }

        url.host_str().is_some_and(|host| {
            self.third_party_allowlist
                .iter()
                .any(|allowed| host.eq_ignore_ascii_case(allowed))
        })
    }
}
