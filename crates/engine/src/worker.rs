//! The service worker: lifecycle handlers and fetch interception for one
//! deployed version.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use swcache_client::{Network, resolve};
use swcache_core::{AppConfig, CacheDb, ClientMessage, Error, Request, RequestKey, Response};
use url::Url;

use crate::background::BackgroundTasks;
use crate::clients::{Clients, WindowOpen};
use crate::generation::GenerationManager;
use crate::lifecycle::{LifecycleEvent, WorkerState};
use crate::policy::FetchContext;
use crate::push::{Notification, NotificationTray, PushPayload};
use crate::router;

/// Static description of one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Controlled origin. Requests elsewhere are cross-origin.
    pub origin: Url,
    pub version: String,
    /// Generation owned by this version.
    pub cache_name: String,
    /// Absolute URLs precached on install.
    pub manifest: Vec<Url>,
    /// Notification title when a push carries none.
    pub app_name: String,
}

impl WorkerConfig {
    /// Derive the worker configuration, resolving manifest entries against
    /// the origin.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the origin or a manifest entry does not
    /// resolve to an http(s) URL.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let manifest = config
            .manifest
            .iter()
            .map(|entry| resolve(&origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            origin,
            version: config.version.clone(),
            cache_name: config.cache_name(),
            manifest,
            app_name: config.app_name.clone(),
        })
    }

    /// URL of the root document, the last-resort navigation fallback.
    pub fn root(&self) -> Url {
        let mut root = self.origin.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }
}

/// What an activation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    pub cache_name: String,
    /// Generations removed, oldest first.
    pub deleted: Vec<String>,
    /// No earlier generation existed.
    pub fresh_install: bool,
    /// Pages that changed controller.
    pub claimed: usize,
    /// Pages the `CACHE_UPDATED` message reached.
    pub notified: usize,
}

/// One worker version and its handlers.
pub struct ServiceWorker {
    config: WorkerConfig,
    generation: GenerationManager,
    ctx: FetchContext,
    clients: Clients,
    tray: NotificationTray,
    state: Mutex<WorkerState>,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig, store: CacheDb, network: Arc<dyn Network>, clients: Clients, tray: NotificationTray,
    ) -> Self {
        let generation = GenerationManager::new(store.clone(), config.cache_name.clone(), config.manifest.clone());
        let ctx = FetchContext {
            store,
            network,
            cache_name: Arc::from(config.cache_name.as_str()),
            root: RequestKey::get(&config.root()),
            background: BackgroundTasks::new(),
        };
        Self { config, generation, ctx, clients, tray, state: Mutex::new(WorkerState::Installing) }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn state(&self) -> WorkerState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `event`, returning the new state.
    fn advance(&self, event: &LifecycleEvent) -> Result<WorkerState, Error> {
        let mut state = self.lock_state();
        let next = state.transition(event)?;
        let from = state.to_string();
        tracing::debug!(version = %self.config.version, from = %from, to = %next, "worker state change");
        *state = next.clone();
        Ok(next)
    }

    /// Precache the manifest into this version's generation.
    ///
    /// On success the worker is waiting and may take over immediately. On
    /// failure it is redundant and nothing of its generation is visible.
    pub async fn on_install(&self) -> Result<usize, Error> {
        if *self.lock_state() != WorkerState::Installing {
            return Err(Error::InvalidState(format!("install while {}", self.state())));
        }
        tracing::info!(version = %self.config.version, cache = %self.config.cache_name, "installing");

        match self.generation.populate(self.ctx.network.as_ref()).await {
            Ok(count) => {
                self.advance(&LifecycleEvent::InstallSucceeded)?;
                Ok(count)
            }
            Err(e) => {
                tracing::error!(version = %self.config.version, error = %e, "install failed");
                self.advance(&LifecycleEvent::InstallFailed)?;
                Err(e)
            }
        }
    }

    /// Take over: delete stale generations, claim every client, then tell
    /// them which version now controls them.
    pub async fn on_activate(&self) -> Result<ActivationReport, Error> {
        if *self.lock_state() != WorkerState::Waiting {
            return Err(Error::InvalidState(format!("activate while {}", self.state())));
        }

        let deleted = self.generation.remove_stale().await?;
        self.generation.mark_active(&self.config.version).await?;
        self.advance(&LifecycleEvent::Activated { version: self.config.version.clone() })?;

        let claimed = self.clients.claim(&self.config.version);
        let notified = self.clients.post_all(&ClientMessage::CacheUpdated { version: self.config.version.clone() });

        let report = ActivationReport {
            version: self.config.version.clone(),
            cache_name: self.config.cache_name.clone(),
            fresh_install: deleted.is_empty(),
            deleted,
            claimed,
            notified,
        };
        tracing::info!(
            version = %report.version,
            deleted = report.deleted.len(),
            claimed,
            notified,
            fresh_install = report.fresh_install,
            "activated"
        );
        Ok(report)
    }

    /// Resume control from this version's generation as it survives on disk,
    /// skipping install. Clients are claimed but not told of an update.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the worker is past installing or the
    /// generation is gone.
    pub async fn on_restore(&self) -> Result<usize, Error> {
        if *self.lock_state() != WorkerState::Installing {
            return Err(Error::InvalidState(format!("restore while {}", self.state())));
        }

        self.generation.ensure_present().await?;
        self.advance(&LifecycleEvent::Restored { version: self.config.version.clone() })?;

        let claimed = self.clients.claim(&self.config.version);
        tracing::info!(version = %self.config.version, cache = %self.config.cache_name, claimed, "restored");
        Ok(claimed)
    }

    /// Answer an intercepted request. Never fails.
    ///
    /// A worker that is not active does not touch the cache.
    pub async fn on_fetch(&self, request: &Request) -> Response {
        if !self.lock_state().is_active() {
            return match self.ctx.network.fetch(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, url = %request.url, "uncontrolled fetch failed");
                    Response::network_error()
                }
            };
        }
        router::dispatch(&self.ctx, &self.config.origin, request).await
    }

    /// Show a notification for a push. Absent or malformed data is ignored.
    pub fn on_push(&self, data: Option<&[u8]>) -> Option<Notification> {
        let payload = PushPayload::parse(data)?;
        let notification = self.tray.show(payload, &self.config.app_name);
        tracing::info!(id = notification.id, title = %notification.title, "notification shown");
        Some(notification)
    }

    /// Close the clicked notification and focus or open a window at its URL.
    ///
    /// Returns `None` if no such notification is shown.
    pub fn on_notification_click(&self, id: u64) -> Option<WindowOpen> {
        let notification = self.tray.close(id)?;
        let target = match resolve(&self.config.origin, &notification.data.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, url = %notification.data.url, "bad notification url, opening root");
                self.config.root()
            }
        };
        Some(self.clients.open_window(target))
    }

    /// Mark this worker replaced by a newer version.
    pub fn supersede(&self) -> Result<(), Error> {
        self.advance(&LifecycleEvent::Superseded).map(|_| ())
    }

    /// Wait for background cache writes and revalidations to finish.
    pub async fn wait_until_idle(&self) {
        self.ctx.background.wait_until_idle().await;
    }
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("version", &self.config.version)
            .field("cache_name", &self.config.cache_name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ORIGIN, StubNetwork, html, page};
    use swcache_core::{ClientEvent, RequestMode};

    fn config(version: &str) -> WorkerConfig {
        WorkerConfig {
            origin: Url::parse(ORIGIN).unwrap(),
            version: version.into(),
            cache_name: version.into(),
            manifest: vec![page("/"), page("/index.html")],
            app_name: "Universal Launcher".into(),
        }
    }

    fn online() -> Arc<StubNetwork> {
        let network = StubNetwork::new();
        network.respond(page("/").as_str(), html("root"));
        network.respond(page("/index.html").as_str(), html("index"));
        network
    }

    fn worker(version: &str, store: &CacheDb, network: Arc<StubNetwork>, clients: &Clients) -> ServiceWorker {
        ServiceWorker::new(config(version), store.clone(), network, clients.clone(), NotificationTray::new())
    }

    async fn activated(version: &str, store: &CacheDb, network: Arc<StubNetwork>, clients: &Clients) -> ServiceWorker {
        let sw = worker(version, store, network, clients);
        sw.on_install().await.unwrap();
        sw.on_activate().await.unwrap();
        sw
    }

    #[test]
    fn test_config_from_app_with_empty_prefix() {
        let app = AppConfig {
            origin: "https://app.test".into(),
            version: "v1".into(),
            cache_prefix: String::new(),
            manifest: vec!["/".into(), "/index.html".into()],
            ..AppConfig::default()
        };

        let config = WorkerConfig::from_app(&app).unwrap();

        assert_eq!(config.cache_name, "v1");
        assert_eq!(config.manifest, vec![page("/"), page("/index.html")]);
        assert_eq!(config.root(), page("/"));
    }

    #[tokio::test]
    async fn test_first_install_leaves_only_current_generation() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let sw = worker("v1", &store, online(), &Clients::new());

        assert_eq!(sw.on_install().await.unwrap(), 2);
        assert_eq!(sw.state(), WorkerState::Waiting);
        let report = sw.on_activate().await.unwrap();

        assert!(report.fresh_install);
        assert_eq!(report.notified, 0);
        assert_eq!(store.generation_names().await.unwrap(), vec!["v1".to_string()]);
        assert_eq!(sw.state(), WorkerState::Active { version: "v1".into() });
    }

    #[tokio::test]
    async fn test_upgrade_deletes_old_generation_and_notifies() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let clients = Clients::new();
        let old = activated("v13", &store, online(), &clients).await;
        let mut page_conn = clients.connect(page("/"));

        let new = worker("v14", &store, online(), &clients);
        new.on_install().await.unwrap();
        old.supersede().unwrap();
        let report = new.on_activate().await.unwrap();

        assert_eq!(report.deleted, vec!["v13".to_string()]);
        assert!(!report.fresh_install);
        assert_eq!(store.generation_names().await.unwrap(), vec!["v14".to_string()]);
        assert_eq!(page_conn.events.try_recv().unwrap(), ClientEvent::ControllerChange { version: "v14".into() });
        assert_eq!(
            page_conn.events.try_recv().unwrap(),
            ClientEvent::Message(ClientMessage::CacheUpdated { version: "v14".into() })
        );
        assert!(old.state().is_redundant());
    }

    #[tokio::test]
    async fn test_failed_install_publishes_nothing() {
        let network = StubNetwork::new();
        network.respond(page("/").as_str(), html("root"));
        network.fail(page("/index.html").as_str());
        let store = CacheDb::open_in_memory().await.unwrap();
        let sw = worker("v2", &store, network, &Clients::new());

        assert!(matches!(sw.on_install().await, Err(Error::InstallFailed { .. })));
        assert!(sw.state().is_redundant());
        assert!(!store.has_generation("v2").await.unwrap());
        assert!(matches!(sw.on_activate().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activation_records_active_generation() {
        let store = CacheDb::open_in_memory().await.unwrap();
        activated("v14", &store, online(), &Clients::new()).await;

        let active = store.active_generation().await.unwrap().unwrap();
        assert_eq!(active.cache_name, "v14");
        assert_eq!(active.version, "v14");
    }

    #[tokio::test]
    async fn test_restore_serves_existing_generation_offline() {
        let store = CacheDb::open_in_memory().await.unwrap();
        activated("v14", &store, online(), &Clients::new()).await;
        let clients = Clients::new();
        let mut conn = clients.connect(page("/"));

        let sw = worker("v14", &store, StubNetwork::offline(), &clients);
        assert_eq!(sw.on_restore().await.unwrap(), 1);

        assert_eq!(sw.state(), WorkerState::Active { version: "v14".into() });
        assert_eq!(sw.on_fetch(&Request::navigate(page("/"))).await.text(), "root");
        assert_eq!(conn.events.try_recv().unwrap(), ClientEvent::ControllerChange { version: "v14".into() });
        assert!(conn.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restore_without_generation_fails() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let sw = worker("v14", &store, StubNetwork::offline(), &Clients::new());

        assert!(matches!(sw.on_restore().await, Err(Error::InvalidState(_))));
        assert_eq!(sw.state(), WorkerState::Installing);
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let sw = worker("v1", &store, online(), &Clients::new());

        assert!(matches!(sw.on_activate().await, Err(Error::InvalidState(_))));
        assert_eq!(sw.state(), WorkerState::Installing);
    }

    #[tokio::test]
    async fn test_inactive_worker_does_not_cache() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = online();
        network.respond(page("/app.js").as_str(), html("js"));
        let sw = worker("v1", &store, network, &Clients::new());

        let response = sw.on_fetch(&Request::get(page("/app.js"))).await;
        sw.wait_until_idle().await;

        assert_eq!(response.text(), "js");
        assert!(store.generation_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_navigation_served_from_precache() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = online();
        let sw = activated("v1", &store, network.clone(), &Clients::new()).await;
        network.fail(page("/").as_str());
        network.fail(page("/index.html").as_str());

        let exact = sw.on_fetch(&Request::navigate(page("/index.html"))).await;
        let fallback = sw.on_fetch(&Request::navigate(page("/settings"))).await;

        assert_eq!(exact.text(), "index");
        assert_eq!(fallback.text(), "root");
    }

    #[tokio::test]
    async fn test_offline_cross_origin_gets_408() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let sw = activated("v1", &store, online(), &Clients::new()).await;
        let request = Request::get(Url::parse("https://api.other.test/rates").unwrap()).with_mode(RequestMode::Cors);

        let response = sw.on_fetch(&request).await;

        assert_eq!(response, Response::offline());
    }

    #[tokio::test]
    async fn test_push_then_click_opens_default_url() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let clients = Clients::new();
        let sw = worker("v1", &store, online(), &clients);

        let shown = sw.on_push(Some(br#"{"title":"X"}"#)).unwrap();
        assert_eq!(shown.body, "new message");
        assert_eq!(shown.data.url, "/");

        let opened = sw.on_notification_click(shown.id).unwrap();
        assert!(matches!(opened, WindowOpen::Opened(_)));
        assert_eq!(clients.len(), 1);
        assert!(sw.on_notification_click(shown.id).is_none());
    }

    #[tokio::test]
    async fn test_click_focuses_page_at_target() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let clients = Clients::new();
        let mut inbox = clients.connect(page("/inbox"));
        let sw = worker("v1", &store, online(), &clients);

        let shown = sw.on_push(Some(br#"{"title":"Mail","url":"/inbox"}"#)).unwrap();
        let opened = sw.on_notification_click(shown.id).unwrap();

        assert!(matches!(opened, WindowOpen::Focused(id) if id == inbox.id));
        assert_eq!(inbox.events.try_recv().unwrap(), ClientEvent::Focus);
    }

    #[tokio::test]
    async fn test_push_without_payload_is_ignored() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let sw = worker("v1", &store, online(), &Clients::new());

        assert!(sw.on_push(None).is_none());
        assert!(sw.on_push(Some(b"{oops")).is_none());
    }
}
