//! Test doubles shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use swcache_client::Network;
use swcache_core::{CacheDb, Error, Request, RequestKey, Response};
use url::Url;

use crate::background::BackgroundTasks;
use crate::policy::FetchContext;

pub const ORIGIN: &str = "https://app.test/";

pub fn page(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn html(body: &str) -> Response {
    Response::new(200, body.to_string()).with_header("content-type", "text/html")
}

#[derive(Clone)]
enum Outcome {
    Respond(Response),
    Fail,
    Hang,
    Gated(Response, Arc<Notify>),
}

/// Scripted network: per-URL responses, failures, or fetches that never finish.
#[derive(Default)]
pub struct StubNetwork {
    routes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A network where every URL fails.
    pub fn offline() -> Arc<Self> {
        Self::new()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), Outcome::Respond(response));
    }

    pub fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Outcome::Fail);
    }

    pub fn hang(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Outcome::Hang);
    }

    /// Respond to `url` only once the returned gate is opened with
    /// `notify_one`.
    pub fn gate(&self, url: &str, response: Response) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.routes.lock().unwrap().insert(url.to_string(), Outcome::Gated(response, gate.clone()));
        gate
    }

    /// Number of fetches issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());
        let outcome = self.routes.lock().unwrap().get(&url).cloned();
        match outcome {
            Some(Outcome::Respond(response)) => Ok(response.with_url(url)),
            Some(Outcome::Fail) | None => Err(Error::Network(format!("unreachable: {url}"))),
            Some(Outcome::Hang) => std::future::pending().await,
            Some(Outcome::Gated(response, gate)) => {
                gate.notified().await;
                Ok(response.with_url(url))
            }
        }
    }
}

/// Policy context over an in-memory store with an open generation `v1`.
pub async fn context(network: Arc<StubNetwork>) -> FetchContext {
    let store = CacheDb::open_in_memory().await.unwrap();
    store.open_generation("v1").await.unwrap();
    FetchContext {
        store,
        network,
        cache_name: Arc::from("v1"),
        root: RequestKey::get(&page("/")),
        background: BackgroundTasks::new(),
    }
}
