//! Request classification and policy dispatch.

use swcache_core::{Request, Response};
use url::Url;

use crate::policy::{self, FetchContext};

/// Which policy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Another origin. Never cached.
    CrossOrigin,
    /// Same origin but not a GET. Never cached.
    NetworkOnly,
    /// Top-level page load. Network first.
    Navigation,
    /// Any other same-origin GET. Stale-while-revalidate.
    Asset,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::CrossOrigin => "cross-origin",
            Route::NetworkOnly => "network-only",
            Route::Navigation => "navigation",
            Route::Asset => "asset",
        }
    }
}

/// Classify `request` relative to the controlling `origin`.
///
/// The origin check comes first, so a cross-origin navigation is still
/// [`Route::CrossOrigin`].
pub fn classify(request: &Request, origin: &Url) -> Route {
    if !request.is_same_origin(origin) {
        Route::CrossOrigin
    } else if !request.method.eq_ignore_ascii_case("GET") {
        Route::NetworkOnly
    } else if request.is_navigation() {
        Route::Navigation
    } else {
        Route::Asset
    }
}

/// Route `request` to its policy and produce a response.
///
/// A navigation that cannot be served from network or cache yields
/// [`Response::network_error`].
pub async fn dispatch(ctx: &FetchContext, origin: &Url, request: &Request) -> Response {
    let route = classify(request, origin);
    tracing::debug!(route = route.as_str(), method = %request.method, url = %request.url, "dispatching");

    match route {
        Route::CrossOrigin | Route::NetworkOnly => policy::passthrough(ctx, request).await,
        Route::Navigation => match policy::network_first(ctx, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, url = %request.url, "navigation failed with nothing cached");
                Response::network_error()
            }
        },
        Route::Asset => policy::stale_while_revalidate(ctx, request).await,
    }
}
