//! Fetch policies.
//!
//! Every policy reads from and writes to the current generation only.
//! Writes happen in the background on a clone of the response, so the
//! caller never waits on the cache. A write that lands after its generation
//! was deleted is dropped.

pub mod network_first;
pub mod passthrough;
pub mod stale_while_revalidate;

pub use network_first::network_first;
pub use passthrough::passthrough;
pub use stale_while_revalidate::stale_while_revalidate;

use std::sync::Arc;

use swcache_client::Network;
use swcache_core::{CacheDb, RequestKey, Response};

use crate::background::BackgroundTasks;

/// Everything a policy needs, cheap to clone into background tasks.
#[derive(Clone)]
pub struct FetchContext {
    pub store: CacheDb,
    pub network: Arc<dyn Network>,
    /// Name of the current generation.
    pub cache_name: Arc<str>,
    /// Key of the root document, the offline fallback for navigations.
    pub root: RequestKey,
    pub background: BackgroundTasks,
}

impl FetchContext {
    /// Look up `key` in the current generation. Store errors count as a miss.
    pub async fn lookup(&self, key: &RequestKey) -> Option<Response> {
        match self.store.match_entry(&self.cache_name, key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, url = %key.url, "cache lookup failed");
                None
            }
        }
    }

    /// Store `response` under `key` without blocking the caller.
    pub fn store_in_background(&self, key: RequestKey, response: Response) {
        let store = self.store.clone();
        let cache_name = self.cache_name.clone();
        self.background.spawn(async move {
            match store.put_entry(&cache_name, &key, &response).await {
                Ok(true) => tracing::debug!(url = %key.url, cache = %cache_name, "cached response"),
                Ok(false) => tracing::debug!(url = %key.url, cache = %cache_name, "generation gone, write dropped"),
                Err(e) => tracing::warn!(error = %e, url = %key.url, "cache write failed"),
            }
        });
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("cache_name", &self.cache_name)
            .field("root", &self.root.url)
            .finish()
    }
}
