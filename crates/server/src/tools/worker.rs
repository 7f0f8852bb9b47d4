//! Lifecycle and intercept tools.
//!
//! `worker_install`, `worker_activate`, `worker_fetch` and `worker_status`
//! deliver the hosting runtime's signals to the worker.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Fetcher, Interception, OfflineWorker, Source};
use shellcache_core::{Request, Response};

use crate::error::{ToolError, json_result};

/// Output of `worker_install` and `worker_activate`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LifecycleOutput {
    /// Lifecycle state after the signal.
    pub state: String,
    /// Generation tag of this worker.
    pub generation: String,
    /// Stale namespaces removed by activation.
    #[serde(default)]
    pub deleted: Vec<String>,
    /// Whether open clients are controlled by this generation.
    pub controlling: bool,
}

/// Output of `worker_status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusOutput {
    pub state: String,
    pub generation: String,
    pub origin: String,
    pub precache_namespace: String,
    pub runtime_namespace: String,
    pub manifest: Vec<String>,
    pub controlling: bool,
    /// Detached runtime-cache writes still running.
    pub pending_writes: usize,
}

/// Input parameters for `worker_fetch`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Whether this is a document navigation (eligible for the offline shell).
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output of `worker_fetch`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    pub url: String,
    pub status: u16,
    pub ok: bool,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
    pub body_bytes: usize,
    /// Strategy that served the request; absent for pass-through.
    pub strategy: Option<String>,
    /// "network", "cache", "shell" or "passthrough".
    pub source: String,
    /// Namespace the response was read from, if any.
    pub namespace: Option<String>,
    /// ISO8601 timestamp of when the response was produced.
    pub served_at: String,
}

impl WorkerFetchOutput {
    fn new(url: String, response: Response, strategy: Option<String>, source: &str, namespace: Option<String>) -> Self {
        Self {
            url,
            status: response.status,
            ok: response.ok(),
            body: String::from_utf8_lossy(&response.body).to_string(),
            body_bytes: response.body.len(),
            headers: response.headers,
            strategy,
            source: source.to_string(),
            namespace,
            served_at: Utc::now().to_rfc3339(),
        }
    }
}

async fn lifecycle_output(worker: &OfflineWorker, deleted: Vec<String>) -> LifecycleOutput {
    LifecycleOutput {
        state: worker.state().await.to_string(),
        generation: worker.config().generation.clone(),
        deleted,
        controlling: worker.is_controlling().await,
    }
}

/// Implementation of the worker_install tool.
pub async fn install_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    worker.on_install().await?;
    json_result(&lifecycle_output(worker, Vec::new()).await)
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let activation = worker.on_activate().await?;
    json_result(&lifecycle_output(worker, activation.deleted).await)
}

/// Implementation of the worker_status tool.
pub async fn status_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let config = worker.config();
    let output = StatusOutput {
        state: worker.state().await.to_string(),
        generation: config.generation.clone(),
        origin: config.origin.to_string(),
        precache_namespace: config.precache_name.clone(),
        runtime_namespace: config.runtime_name.clone(),
        manifest: config.manifest.iter().map(|u| u.to_string()).collect(),
        controlling: worker.is_controlling().await,
        pending_writes: worker.pending_writes(),
    };
    json_result(&output)
}

/// Implementation of the worker_fetch tool.
///
/// Pass-through requests are fetched directly, as the browser would do
/// without a worker.
pub async fn fetch_impl(
    worker: &OfflineWorker, fetcher: &dyn Fetcher, params: WorkerFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let url = worker.resolve(&params.url)?;
    let request = Request::new(&params.method, url, params.navigate);

    let output = match worker.on_intercept(&request).await? {
        Interception::Respond { served, strategy } => {
            let (source, namespace) = match served.source {
                Source::Network => ("network", None),
                Source::Cache { namespace } => ("cache", Some(namespace)),
                Source::Shell { namespace } => ("shell", Some(namespace)),
            };
            WorkerFetchOutput::new(
                request.url.to_string(),
                served.response,
                Some(strategy.as_str().to_string()),
                source,
                namespace,
            )
        }
        Interception::Passthrough => {
            let response = fetcher.fetch(&request).await.map_err(McpError::from)?;
            WorkerFetchOutput::new(request.url.to_string(), response, None, "passthrough", None)
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shellcache_client::WorkerConfig;
    use shellcache_core::{AppConfig, CacheDb, Error};
    use std::sync::Arc;

    /// Answers every GET with a page naming its path; refuses everything else.
    struct FixedFetcher;

    #[async_trait]
    impl Fetcher for FixedFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if request.method == "GET" {
                Ok(Response::new(200, format!("page {}", request.url.path())))
            } else {
                Err(Error::Network("refused".into()))
            }
        }
    }

    fn text(result: &CallToolResult) -> String {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        content.get("text").and_then(|v| v.as_str()).unwrap().to_string()
    }

    async fn worker() -> OfflineWorker {
        let config = AppConfig {
            origin: "https://app.example.com".into(),
            precache_manifest: vec!["/".into(), "/index.html".into()],
            ..Default::default()
        };
        OfflineWorker::new(
            WorkerConfig::from_app_config(&config).unwrap(),
            CacheDb::open_in_memory().await.unwrap(),
            Arc::new(FixedFetcher),
        )
    }

    #[tokio::test]
    async fn test_install_reports_active_with_skip_waiting() {
        let worker = worker().await;
        let result = install_impl(&worker).await.unwrap();
        let output: LifecycleOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.state, "active");
        assert_eq!(output.generation, "v1");
        assert!(output.controlling);
    }

    #[tokio::test]
    async fn test_fetch_cache_first_then_cache() {
        let worker = worker().await;
        install_impl(&worker).await.unwrap();

        let params = WorkerFetchParams { url: "/logo.png".into(), method: default_method(), navigate: false };
        let first: WorkerFetchOutput =
            serde_json::from_str(&text(&fetch_impl(&worker, &FixedFetcher, params.clone()).await.unwrap())).unwrap();
        assert_eq!(first.strategy.as_deref(), Some("cache_first"));
        assert_eq!(first.source, "network");

        let second: WorkerFetchOutput =
            serde_json::from_str(&text(&fetch_impl(&worker, &FixedFetcher, params).await.unwrap())).unwrap();
        assert_eq!(second.source, "cache");
        assert_eq!(second.namespace.as_deref(), Some("app-shell-v1"));
        assert_eq!(second.body, "page /logo.png");
    }

    #[tokio::test]
    async fn test_fetch_foreign_passthrough() {
        let worker = worker().await;
        let params = WorkerFetchParams {
            url: "https://elsewhere.example/x".into(),
            method: default_method(),
            navigate: false,
        };
        let output: WorkerFetchOutput =
            serde_json::from_str(&text(&fetch_impl(&worker, &FixedFetcher, params).await.unwrap())).unwrap();
        assert_eq!(output.source, "passthrough");
        assert!(output.strategy.is_none());
        assert!(output.ok);
    }

    #[tokio::test]
    async fn test_fetch_empty_url_rejected() {
        let worker = worker().await;
        let params = WorkerFetchParams { url: " ".into(), method: default_method(), navigate: false };
        let err = fetch_impl(&worker, &FixedFetcher, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_status_before_install() {
        let worker = worker().await;
        let output: StatusOutput = serde_json::from_str(&text(&status_impl(&worker).await.unwrap())).unwrap();
        assert_eq!(output.state, "uninstalled");
        assert_eq!(output.precache_namespace, "app-shell-v1");
        assert_eq!(output.manifest, vec!["https://app.example.com/", "https://app.example.com/index.html"]);
    }
}
