//! Stale-while-revalidate handling for same-origin assets.

use swcache_core::{Request, RequestKey, Response, ResponseKind};

use super::FetchContext;

/// Only complete same-origin responses replace a cached asset.
fn is_cacheable(response: &Response) -> bool {
    response.status == 200 && response.kind == ResponseKind::Basic
}

/// Serve the cached asset immediately and refresh it in the background;
/// on a miss, wait for the network.
///
/// Never fails: a miss while offline yields the synthesized offline response.
pub async fn stale_while_revalidate(ctx: &FetchContext, request: &Request) -> Response {
    let key = RequestKey::for_request(request);

    if let Some(cached) = ctx.lookup(&key).await {
        let refresh = ctx.clone();
        let request = request.clone();
        ctx.background.spawn(async move {
            revalidate(&refresh, &request, key).await;
        });
        return cached;
    }

    match ctx.network.fetch(request).await {
        Ok(response) => {
            if is_cacheable(&response) {
                ctx.store_in_background(key, response.clone());
            }
            response
        }
        Err(e) => {
            tracing::warn!(error = %e, url = %request.url, "asset unavailable offline");
            Response::offline()
        }
    }
}

async fn revalidate(ctx: &FetchContext, request: &Request, key: RequestKey) {
    match ctx.network.fetch(request).await {
        Ok(response) if is_cacheable(&response) => {
            match ctx.store.put_entry(&ctx.cache_name, &key, &response).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(url = %key.url, cache = %ctx.cache_name, "generation gone, revalidation dropped"),
                Err(e) => tracing::warn!(error = %e, url = %key.url, "revalidated asset not stored"),
            }
        }
        Ok(response) => {
            tracing::debug!(status = response.status, kind = response.kind.as_str(), url = %key.url, "keeping cached asset");
        }
        Err(e) => {
            tracing::debug!(error = %e, url = %key.url, "revalidation failed, keeping cached asset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubNetwork, context, html, page};

    #[tokio::test]
    async fn test_hit_returns_cached_and_refreshes() {
        let network = StubNetwork::new();
        network.respond(page("/app.js").as_str(), html("new"));
        let ctx = context(network.clone()).await;
        let key = RequestKey::get(&page("/app.js"));
        ctx.store.put_entry(&ctx.cache_name, &key, &html("old")).await.unwrap();

        let response = stale_while_revalidate(&ctx, &Request::get(page("/app.js"))).await;
        assert_eq!(response.text(), "old");

        ctx.background.wait_until_idle().await;
        assert_eq!(network.calls(page("/app.js").as_str()), 1);
        assert_eq!(ctx.lookup(&key).await.unwrap().text(), "new");
    }

    #[tokio::test]
    async fn test_hit_does_not_wait_for_hung_network() {
        let network = StubNetwork::new();
        network.hang(page("/app.css").as_str());
        let ctx = context(network).await;
        let key = RequestKey::get(&page("/app.css"));
        let stored = html("body{}");
        ctx.store.put_entry(&ctx.cache_name, &key, &stored).await.unwrap();

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            stale_while_revalidate(&ctx, &Request::get(page("/app.css"))),
        )
        .await
        .expect("cache hit must not wait on the network");

        assert_eq!(response.body, stored.body);
        assert_eq!(response.status, stored.status);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_entry() {
        let network = StubNetwork::new();
        network.fail(page("/app.js").as_str());
        let ctx = context(network).await;
        let key = RequestKey::get(&page("/app.js"));
        ctx.store.put_entry(&ctx.cache_name, &key, &html("old")).await.unwrap();

        let response = stale_while_revalidate(&ctx, &Request::get(page("/app.js"))).await;
        ctx.background.wait_until_idle().await;

        assert_eq!(response.text(), "old");
        assert_eq!(ctx.lookup(&key).await.unwrap().text(), "old");
    }

    #[tokio::test]
    async fn test_invalid_refresh_keeps_entry() {
        let network = StubNetwork::new();
        network.respond(page("/app.js").as_str(), Response::new(500, "boom"));
        let ctx = context(network).await;
        let key = RequestKey::get(&page("/app.js"));
        ctx.store.put_entry(&ctx.cache_name, &key, &html("old")).await.unwrap();

        stale_while_revalidate(&ctx, &Request::get(page("/app.js"))).await;
        ctx.background.wait_until_idle().await;

        assert_eq!(ctx.lookup(&key).await.unwrap().text(), "old");
    }

    #[tokio::test]
    async fn test_miss_waits_for_network_and_caches() {
        let network = StubNetwork::new();
        network.respond(page("/api/income").as_str(), html("[]"));
        let ctx = context(network).await;

        let response = stale_while_revalidate(&ctx, &Request::get(page("/api/income"))).await;
        ctx.background.wait_until_idle().await;

        assert_eq!(response.text(), "[]");
        let cached = ctx.lookup(&RequestKey::get(&page("/api/income"))).await.unwrap();
        assert_eq!(cached.body, response.body);
    }

    #[tokio::test]
    async fn test_miss_with_cors_response_not_cached() {
        let network = StubNetwork::new();
        network.respond(page("/data").as_str(), html("x").with_kind(ResponseKind::Cors));
        let ctx = context(network).await;

        stale_while_revalidate(&ctx, &Request::get(page("/data"))).await;
        ctx.background.wait_until_idle().await;

        assert!(ctx.lookup(&RequestKey::get(&page("/data"))).await.is_none());
    }

    #[tokio::test]
    async fn test_miss_offline_gets_408() {
        let ctx = context(StubNetwork::offline()).await;

        let response = stale_while_revalidate(&ctx, &Request::get(page("/app.js"))).await;

        assert_eq!(response, Response::offline());
    }
}
