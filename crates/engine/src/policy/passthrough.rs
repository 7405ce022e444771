//! Network-only handling for requests that must never touch the cache.

use swcache_core::{Request, Response};

use super::FetchContext;

/// Forward `request` to the network without caching.
///
/// On failure a navigation falls back to the cached root document; anything
/// else gets the synthesized offline response.
pub async fn passthrough(ctx: &FetchContext, request: &Request) -> Response {
    match ctx.network.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_network() {
                tracing::info!(error = %e, url = %request.url, "passthrough offline");
            } else {
                tracing::warn!(error = %e, url = %request.url, "passthrough fetch failed");
            }
            if request.is_navigation()
                && let Some(root) = ctx.lookup(&ctx.root).await
            {
                return root;
            }
            Response::offline()
        }
    }
}
