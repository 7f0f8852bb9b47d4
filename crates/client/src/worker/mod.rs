//! Lifecycle controller.
//!
//! `OfflineWorker` owns one generation of the application cache and reacts
//! to the three signals a hosting runtime delivers:
//!
//! ```text
//! Uninstalled --install--> Installing --ok--> Installed --activate--> Activating --> Active
//!      ^                        |
//!      +--------failure---------+
//! ```
//!
//! Install fetches the whole precache manifest before writing anything, so a
//! failed install leaves no trace and the previous generation keeps serving.
//! Activation deletes every namespace that does not belong to this
//! generation. Intercepts route each request through a strategy. Until this
//! generation is active, the newest generation already in the store keeps
//! serving; with none stored, requests go straight to the network.

mod config;

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use shellcache_core::{CacheDb, Error, Request, Response};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::Fetcher;
use crate::strategy::{BackgroundWrites, Served, Strategy, StrategyContext};

pub use config::WorkerConfig;

/// Lifecycle state of a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninstalled,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Active,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of intercepting a request.
#[derive(Debug, Clone)]
pub enum Interception {
    /// The worker produced the response.
    Respond { served: Served, strategy: Strategy },
    /// Not handled; the host fetches it as if no worker were installed.
    Passthrough,
}

/// What an activation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Stale namespaces removed.
    pub deleted: Vec<String>,
    /// Whether open clients are now controlled by this generation.
    pub claimed: bool,
}

#[derive(Debug)]
struct Lifecycle {
    state: WorkerState,
    claimed: bool,
}

/// One generation of the offline cache engine.
pub struct OfflineWorker {
    config: WorkerConfig,
    ctx: StrategyContext,
    lifecycle: RwLock<Lifecycle>,
}

impl OfflineWorker {
    /// Create a worker for the configured generation. Nothing is fetched or
    /// stored until `on_install`.
    pub fn new(config: WorkerConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Self {
        let ctx = StrategyContext {
            db,
            fetcher,
            precache: config.precache_name.clone(),
            runtime: config.runtime_name.clone(),
            shell: Request::get(config.navigation_fallback.clone()),
            writes: BackgroundWrites::new(),
        };

        Self { config, ctx, lifecycle: RwLock::new(Lifecycle { state: WorkerState::Uninstalled, claimed: false }) }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.ctx.db
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state
    }

    /// Whether this generation controls already-open clients.
    pub async fn is_controlling(&self) -> bool {
        self.lifecycle.read().await.claimed
    }

    /// Handle the install signal: precache the manifest, all or nothing.
    ///
    /// With `skip_waiting` set the worker activates right away.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the worker is `Uninstalled`
    /// - `Error::PrecacheFailed` if any manifest asset fails to fetch or is not `ok`
    pub async fn on_install(&self) -> Result<WorkerState, Error> {
        self.transition(&[WorkerState::Uninstalled], WorkerState::Installing).await?;
        tracing::info!(
            generation = %self.config.generation,
            assets = self.config.manifest.len(),
            "installing"
        );

        match self.precache().await {
            Ok(()) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(namespace = %self.config.precache_name, "installed");
            }
            Err(e) => {
                self.set_state(WorkerState::Uninstalled).await;
                tracing::warn!(generation = %self.config.generation, error = %e, "install failed");
                return Err(e);
            }
        }

        if self.config.skip_waiting {
            tracing::debug!("skip_waiting set, activating immediately");
            self.on_activate().await?;
        }

        Ok(self.state().await)
    }

    async fn precache(&self) -> Result<(), Error> {
        let fetches = self.config.manifest.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .ctx
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.to_string(), reason: e.to_string() })?;

            if !response.ok() {
                return Err(Error::PrecacheFailed { url: url.to_string(), reason: format!("status {}", response.status) });
            }

            Ok::<(Request, Response), Error>((request, response))
        });

        let entries = try_join_all(fetches).await?;
        self.ctx.db.put_entries(&self.config.precache_name, &entries).await
    }

    /// Handle the activate signal: delete stale namespaces, then claim clients.
    ///
    /// Activating an active worker does nothing.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the worker is `Installed` or `Active`
    /// - store errors from the cleanup; the worker returns to `Installed`
    pub async fn on_activate(&self) -> Result<Activation, Error> {
        if self.state().await == WorkerState::Active {
            tracing::debug!("already active");
            return Ok(Activation { deleted: Vec::new(), claimed: self.is_controlling().await });
        }

        self.transition(&[WorkerState::Installed], WorkerState::Activating).await?;

        let current: HashSet<String> = [self.config.precache_name.clone(), self.config.runtime_name.clone()].into();
        let deleted = match self.ctx.db.cleanup_generations(&current).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                return Err(e);
            }
        };

        if !deleted.is_empty() {
            tracing::info!(deleted = ?deleted, "removed stale cache generations");
        }

        let claimed = self.config.clients_claim;
        {
            let mut lifecycle = self.lifecycle.write().await;
            lifecycle.state = WorkerState::Active;
            lifecycle.claimed = claimed;
        }
        tracing::info!(generation = %self.config.generation, claimed, "active");

        Ok(Activation { deleted, claimed })
    }

    /// Handle an intercepted request.
    ///
    /// Foreign-origin requests (unless allow-listed) and non-GET requests
    /// pass through. Until the worker is active, a previously stored
    /// generation serves them; without one they go to the network without
    /// touching any namespace.
    ///
    /// # Errors
    ///
    /// Returns the strategy's network error when no fallback applies.
    pub async fn on_intercept(&self, request: &Request) -> Result<Interception, Error> {
        if !self.config.is_in_scope(&request.url) {
            tracing::debug!(url = %request.url, "foreign origin, passing through");
            return Ok(Interception::Passthrough);
        }

        if !request.is_cacheable() {
            tracing::debug!(method = %request.method, url = %request.url, "non-GET, passing through");
            return Ok(Interception::Passthrough);
        }

        let active = self.state().await == WorkerState::Active;
        let previous = if active { None } else { self.previous_generation().await };
        let ctx = previous.as_ref().unwrap_or(&self.ctx);

        let strategy = if active || previous.is_some() {
            Strategy::from(self.config.registry.classify(&request.url))
        } else {
            Strategy::NetworkOnly
        };

        tracing::debug!(url = %request.url, strategy = strategy.as_str(), namespace = %ctx.precache, "routing");
        let served = strategy.execute(ctx, request).await?;

        Ok(Interception::Respond { served, strategy })
    }

    /// The newest stored generation other than this one, if any.
    async fn previous_generation(&self) -> Option<StrategyContext> {
        let namespaces = match self.ctx.db.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                tracing::warn!(error = %e, "could not list namespaces");
                return None;
            }
        };

        let (precache, generation) = namespaces.iter().rev().find_map(|name| {
            if *name == self.config.precache_name {
                return None;
            }
            let generation = self.config.generation_of(name)?;
            Some((name.clone(), generation.to_string()))
        })?;

        Some(StrategyContext { runtime: self.config.runtime_for(&generation), precache, ..self.ctx.clone() })
    }

    /// Wait for detached runtime-cache writes to finish.
    pub async fn settle(&self) {
        self.ctx.writes.settle().await;
    }

    /// Number of detached writes still running.
    pub fn pending_writes(&self) -> usize {
        self.ctx.writes.pending()
    }

    /// Resolve a path against the application origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        crate::fetch::resolve(&self.config.origin, input).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    async fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), Error> {
        let mut lifecycle = self.lifecycle.write().await;
        if !from.contains(&lifecycle.state) {
            let expected = from.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" or ");
            return Err(Error::InvalidState { expected, actual: lifecycle.state.to_string() });
        }
        lifecycle.state = to;
        Ok(())
    }

    async fn set_state(&self, state: WorkerState) {
        self.lifecycle.write().await.state = state;
    }
}
