//! cache_delete tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::CacheDb;

use crate::error::{ToolError, json_result};

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Namespace to delete, e.g. "app-shell-v1".
    pub name: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    /// False when no such namespace existed.
    pub deleted: bool,
}

/// Implementation of the cache_delete tool.
pub async fn delete_impl(cache: &CacheDb, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    let name = params.name.trim();
    if name.is_empty() {
        return Err(ToolError::InvalidInput("name cannot be empty".into()).into());
    }

    let deleted = cache.delete_namespace(name).await?;
    tracing::info!(namespace = name, deleted, "cache_delete");

    json_result(&CacheDeleteOutput { deleted })
}
