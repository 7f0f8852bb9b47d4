//! Request-handling strategies.
//!
//! | strategy        | reads cache            | writes cache                  | on network failure           |
//! |-----------------|------------------------|-------------------------------|------------------------------|
//! | `NoCache`       | never                  | never                         | propagate                    |
//! | `NetworkOnly`   | never                  | never                         | propagate                    |
//! | `NetworkFirst`  | after network failure  | runtime, detached, `ok` only  | runtime, any cache, shell    |
//! | `CacheFirst`    | first                  | precache, awaited, `ok` only  | shell (navigate)             |

pub mod background;

use std::sync::Arc;

use shellcache_core::{CacheDb, Error, Request, Response, RouteClass};

use crate::fetch::Fetcher;

pub use background::BackgroundWrites;

/// Strategy used to serve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NoCache,
    NetworkFirst,
    CacheFirst,
    /// Same behavior as `NoCache`; used while no generation is active.
    NetworkOnly,
}

impl From<RouteClass> for Strategy {
    fn from(class: RouteClass) -> Self {
        match class {
            RouteClass::NoCache => Strategy::NoCache,
            RouteClass::NetworkFirst => Strategy::NetworkFirst,
            RouteClass::CacheFirst => Strategy::CacheFirst,
        }
    }
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::NoCache => "no_cache",
            Strategy::NetworkFirst => "network_first",
            Strategy::CacheFirst => "cache_first",
            Strategy::NetworkOnly => "network_only",
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Network,
    Cache { namespace: String },
    /// The precached navigation shell, served in place of the requested document.
    Shell { namespace: String },
}

/// A response with its provenance.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

impl Served {
    fn network(response: Response) -> Self {
        Self { response, source: Source::Network }
    }
}

/// Everything a strategy needs: the store, the network and namespace names.
#[derive(Clone)]
pub struct StrategyContext {
    pub db: CacheDb,
    pub fetcher: Arc<dyn Fetcher>,
    /// Current precache (static) namespace.
    pub precache: String,
    /// Current runtime namespace.
    pub runtime: String,
    /// GET request for the navigation shell document.
    pub shell: Request,
    pub writes: BackgroundWrites,
}

impl Strategy {
    /// Serve a request.
    ///
    /// # Errors
    ///
    /// Returns the network error when no fallback applies.
    pub async fn execute(self, ctx: &StrategyContext, request: &Request) -> Result<Served, Error> {
        match self {
            Strategy::NoCache | Strategy::NetworkOnly => network_only(ctx, request).await,
            Strategy::NetworkFirst => network_first(ctx, request).await,
            Strategy::CacheFirst => cache_first(ctx, request).await,
        }
    }
}

async fn network_only(ctx: &StrategyContext, request: &Request) -> Result<Served, Error> {
    ctx.fetcher.fetch(request).await.map(Served::network)
}

async fn network_first(ctx: &StrategyContext, request: &Request) -> Result<Served, Error> {
    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.ok() {
                let db = ctx.db.clone();
                let namespace = ctx.runtime.clone();
                let key = request.clone();
                let stored = response.clone();
                ctx.writes.spawn(async move {
                    if let Err(e) = db.put_entry(&namespace, &key, &stored).await {
                        tracing::warn!(url = %key.url, namespace = %namespace, error = %e, "runtime cache write failed");
                    }
                });
            }
            Ok(Served::network(response))
        }
        Err(err) if err.is_network() => {
            tracing::warn!(url = %request.url, error = %err, "network failed, falling back to cache");
            if let Some(hit) = lookup(ctx, &ctx.runtime, request).await {
                return Ok(hit);
            }
            if let Some(hit) = lookup_any(ctx, request).await {
                return Ok(hit);
            }
            shell_or(ctx, request, err).await
        }
        Err(err) => Err(err),
    }
}

async fn cache_first(ctx: &StrategyContext, request: &Request) -> Result<Served, Error> {
    if let Some(hit) = lookup_any(ctx, request).await {
        return Ok(hit);
    }

    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.ok()
                && let Err(e) = ctx.db.put_entry(&ctx.precache, request, &response).await
            {
                tracing::warn!(url = %request.url, namespace = %ctx.precache, error = %e, "static cache write failed");
            }
            Ok(Served::network(response))
        }
        Err(err) if err.is_network() => shell_or(ctx, request, err).await,
        Err(err) => Err(err),
    }
}

/// Cache lookup in one namespace. Store errors count as a miss.
async fn lookup(ctx: &StrategyContext, namespace: &str, request: &Request) -> Option<Served> {
    match ctx.db.match_entry(namespace, request).await {
        Ok(Some(response)) => {
            tracing::debug!(url = %request.url, namespace, "cache hit");
            Some(Served { response, source: Source::Cache { namespace: namespace.to_string() } })
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(url = %request.url, namespace, error = %e, "cache lookup failed");
            None
        }
    }
}

/// Cache lookup across namespaces, oldest first. Store errors count as a miss.
async fn lookup_any(ctx: &StrategyContext, request: &Request) -> Option<Served> {
    match ctx.db.match_any(request).await {
        Ok(Some(entry)) => {
            tracing::debug!(url = %request.url, namespace = %entry.namespace, "cache hit");
            Some(Served { response: entry.response, source: Source::Cache { namespace: entry.namespace } })
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
            None
        }
    }
}

/// Serve the navigation shell for navigation requests, otherwise return `err`.
async fn shell_or(ctx: &StrategyContext, request: &Request, err: Error) -> Result<Served, Error> {
    if !request.is_navigation {
        return Err(err);
    }

    match ctx.db.match_any(&ctx.shell).await {
        Ok(Some(entry)) => {
            tracing::debug!(url = %request.url, shell = %ctx.shell.url, "serving navigation shell");
            Ok(Served { response: entry.response, source: Source::Shell { namespace: entry.namespace } })
        }
        Ok(None) => Err(err),
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "shell lookup failed");
            Err(err)
        }
    }
}
