//! cache_list tool implementation.
//!
//! Lists stored generations, and optionally the entries of one of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheDb, Error, cache::GenerationInfo};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Also list the entry URLs of this generation.
    #[serde(default)]
    pub generation: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Stored generations, oldest first.
    pub generations: Vec<GenerationInfo>,
    /// Entry URLs of the requested generation.
    pub entries: Option<Vec<String>>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(cache: &CacheDb, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let generations = cache.generations().await?;

    let entries = match params.generation {
        Some(name) => {
            if !generations.iter().any(|g| g.name == name) {
                return Err(Error::CacheMiss(format!("no generation named {name}")).into());
            }
            Some(cache.entry_urls(&name).await?)
        }
        None => None,
    };

    json_result(&CacheListOutput { generations, entries })
}
