//! Network-first handling for navigations.

use swcache_core::{Error, Request, RequestKey, Response};

use super::FetchContext;

/// Prefer the network; fall back to the exact cached page, then the cached
/// root document.
///
/// A successful (2xx) network response is written back in the background.
///
/// # Errors
///
/// Returns the network error when the network fails and neither the page
/// nor the root document is cached.
pub async fn network_first(ctx: &FetchContext, request: &Request) -> Result<Response, Error> {
    let key = RequestKey::for_request(request);

    match ctx.network.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                ctx.store_in_background(key, response.clone());
            }
            Ok(response)
        }
        Err(e) => {
            tracing::info!(error = %e, url = %request.url, "navigation offline, serving from cache");
            if let Some(cached) = ctx.lookup(&key).await {
                return Ok(cached);
            }
            if let Some(root) = ctx.lookup(&ctx.root).await {
                return Ok(root);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubNetwork, context, html, page};

    #[tokio::test]
    async fn test_online_returns_fresh_and_updates_cache() {
        let network = StubNetwork::new();
        network.respond(page("/about").as_str(), html("fresh"));
        let ctx = context(network).await;
        let key = RequestKey::get(&page("/about"));
        ctx.store.put_entry(&ctx.cache_name, &key, &html("stale")).await.unwrap();

        let response = network_first(&ctx, &Request::navigate(page("/about"))).await.unwrap();
        assert_eq!(response.text(), "fresh");

        ctx.background.wait_until_idle().await;
        let cached = ctx.lookup(&key).await.unwrap();
        assert_eq!(cached, response);
    }

    #[tokio::test]
    async fn test_error_status_returned_but_not_cached() {
        let network = StubNetwork::new();
        network.respond(page("/gone").as_str(), Response::new(404, "not found"));
        let ctx = context(network).await;

        let response = network_first(&ctx, &Request::navigate(page("/gone"))).await.unwrap();
        ctx.background.wait_until_idle().await;

        assert_eq!(response.status, 404);
        assert!(ctx.lookup(&RequestKey::get(&page("/gone"))).await.is_none());
    }

    #[tokio::test]
    async fn test_offline_serves_exact_match() {
        let ctx = context(StubNetwork::offline()).await;
        let key = RequestKey::get(&page("/about"));
        ctx.store.put_entry(&ctx.cache_name, &key, &html("about")).await.unwrap();
        ctx.store.put_entry(&ctx.cache_name, &ctx.root, &html("root")).await.unwrap();

        let response = network_first(&ctx, &Request::navigate(page("/about"))).await.unwrap();

        assert_eq!(response.text(), "about");
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_root() {
        let ctx = context(StubNetwork::offline()).await;
        ctx.store.put_entry(&ctx.cache_name, &ctx.root, &html("root")).await.unwrap();

        let response = network_first(&ctx, &Request::navigate(page("/never-visited"))).await.unwrap();

        assert_eq!(response.text(), "root");
    }

    #[tokio::test]
    async fn test_offline_with_empty_cache_fails() {
        let ctx = context(StubNetwork::offline()).await;

        let result = network_first(&ctx, &Request::navigate(page("/about"))).await;

        assert!(matches!(result, Err(Error::Network(_))));
    }
}
