//! Content-addressed request keys.

use sha2::{Digest, Sha256};

use crate::Request;

/// Compute a content-addressed cache key from method and URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Address of a cached entry within a generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub hash: String,
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Key for a request. Request headers and fragments never reach the key,
    /// so a navigation and a plain fetch of the same URL share one entry.
    pub fn for_request(request: &Request) -> Self {
        let mut url = request.url.clone();
        url.set_fragment(None);
        let method = request.method.to_ascii_uppercase();
        Self { hash: compute_cache_key(&method, url.as_str()), method, url: url.into() }
    }

    /// Key of a plain `GET` for `url`.
    pub fn get(url: &url::Url) -> Self {
        Self::for_request(&Request::get(url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", "https://example.com/");
        let hash2 = compute_cache_key("GET", "https://example.com/");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        assert_ne!(compute_cache_key("GET", "https://example.com/"), compute_cache_key("HEAD", "https://example.com/"));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", "https://example.com/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_navigation_and_subresource_share_key() {
        let url = Url::parse("https://app.test/index.html").unwrap();
        assert_eq!(RequestKey::for_request(&Request::navigate(url.clone())), RequestKey::get(&url));
    }

    #[test]
    fn test_fragment_ignored() {
        let a = RequestKey::get(&Url::parse("https://app.test/page#top").unwrap());
        let b = RequestKey::get(&Url::parse("https://app.test/page").unwrap());
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.url, "https://app.test/page");
    }

    #[test]
    fn test_headers_do_not_affect_key() {
        let url = Url::parse("https://app.test/").unwrap();
        let nav = Request::navigate(url.clone()).with_header("Accept", "text/html");
        assert_eq!(RequestKey::for_request(&nav), RequestKey::get(&url));
    }

    #[test]
    fn test_method_case_normalized() {
        let url = Url::parse("https://app.test/api").unwrap();
        let mut lower = Request::get(url.clone());
        lower.method = "post".into();
        assert_eq!(RequestKey::for_request(&lower).method, "POST");
    }
}
