//! cache_list tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::OfflineWorker;

use crate::error::json_result;

/// One namespace in the cache_list output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceSummary {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
    /// Whether the namespace belongs to the configured generation.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub generation: String,
    pub namespaces: Vec<NamespaceSummary>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(worker: &OfflineWorker) -> Result<CallToolResult, McpError> {
    let config = worker.config();
    let namespaces = worker
        .db()
        .namespace_stats()
        .await?
        .into_iter()
        .map(|info| NamespaceSummary {
            current: info.name == config.precache_name || info.name == config.runtime_name,
            name: info.name,
            entries: info.entries,
            created_at: info.created_at,
        })
        .collect();

    json_result(&CacheListOutput { generation: config.generation.clone(), namespaces })
}
