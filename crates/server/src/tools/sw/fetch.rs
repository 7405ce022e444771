//! sw_fetch tool implementation.
//!
//! Sends a request through the registration as if a controlled page issued it.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Error, Request, RequestMode};
use swcache_engine::{Registration, router};
use url::Url;

use crate::tools::json_result;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the controlled origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate" for page loads, otherwise "cors" (default),
    /// "no-cors" or "same-origin".
    #[serde(default)]
    pub mode: RequestMode,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Which policy handled the request.
    pub route: String,
    /// HTTP status; 0 for a network error.
    pub status: u16,
    /// Response type: basic, cors, opaque or error.
    pub kind: String,
    /// Final URL of the response, if known.
    pub url: Option<String>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let url = swcache_client::resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = Request::get(url).with_method(params.method.trim()).with_mode(params.mode);
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }

    let route = router::classify(&request, origin);
    let response = registration.fetch(&request).await;

    let output = SwFetchOutput {
        route: route.as_str().to_string(),
        status: response.status,
        kind: response.kind.as_str().to_string(),
        url: response.url.clone(),
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
        headers: response.headers,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::support::{online, origin, output, registration};

    fn params(url: &str, mode: RequestMode) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: default_method(), mode, headers: BTreeMap::new() }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let (registration, _db) = registration(online()).await;

        let result = fetch_impl(&registration, &origin(), params(" ", RequestMode::Cors)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_url() {
        let (registration, _db) = registration(online()).await;

        let result = fetch_impl(&registration, &origin(), params("ftp://app.test/file", RequestMode::Cors)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_asset_from_precache() {
        let (registration, _db) = registration(online()).await;

        let result = fetch_impl(&registration, &origin(), params("/index.html", RequestMode::Cors)).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.route, "asset");
        assert_eq!(out.status, 200);
        assert_eq!(out.body, "index");
    }

    #[tokio::test]
    async fn test_fetch_offline_navigation_falls_back_to_root() {
        let (registration, _db) = registration(online()).await;

        let result = fetch_impl(&registration, &origin(), params("/settings", RequestMode::Navigate)).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.route, "navigation");
        assert_eq!(out.body, "root");
    }

    #[tokio::test]
    async fn test_fetch_offline_cross_origin() {
        let (registration, _db) = registration(online()).await;

        let result =
            fetch_impl(&registration, &origin(), params("https://cdn.test/lib.js", RequestMode::NoCors)).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.route, "cross-origin");
        assert_eq!(out.status, 408);
        assert_eq!(out.content_type.as_deref(), Some("text/plain; charset=utf-8"));
    }
}
