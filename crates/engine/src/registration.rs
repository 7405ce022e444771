//! The registration: which worker version controls the scope.
//!
//! A new version installs alongside the active one and only takes over once
//! its generation is complete. A failed install leaves the previous version
//! in control. A process that cannot install at startup may instead resume
//! the generation recorded by the last activation.

use std::sync::{Arc, PoisonError, RwLock};

use swcache_client::Network;
use swcache_core::{CacheDb, Error, Request, Response};
use tokio::sync::Mutex;

use crate::clients::{Clients, WindowOpen};
use crate::push::{Notification, NotificationTray};
use crate::worker::{ActivationReport, ServiceWorker, WorkerConfig};

pub struct Registration {
    network: Arc<dyn Network>,
    clients: Clients,
    tray: NotificationTray,
    active: RwLock<Option<Arc<ServiceWorker>>>,
    /// Serializes updates so two versions never install at once.
    updating: Mutex<()>,
}

impl Registration {
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self {
            network,
            clients: Clients::new(),
            tray: NotificationTray::new(),
            active: RwLock::new(None),
            updating: Mutex::new(()),
        }
    }

    /// Build a worker sharing this registration's network, clients and tray.
    pub fn worker(&self, config: WorkerConfig, store: CacheDb) -> ServiceWorker {
        ServiceWorker::new(config, store, self.network.clone(), self.clients.clone(), self.tray.clone())
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub fn tray(&self) -> &NotificationTray {
        &self.tray
    }

    /// The worker currently controlling the scope.
    pub fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_active(&self, worker: Option<Arc<ServiceWorker>>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = worker;
    }

    /// Install `worker` and, once installed, hand control to it.
    ///
    /// # Errors
    ///
    /// Returns the install error, in which case the previously active worker
    /// keeps control, or the activation error, in which case no worker is
    /// active.
    pub async fn register(&self, worker: ServiceWorker) -> Result<ActivationReport, Error> {
        let _updating = self.updating.lock().await;

        worker.on_install().await?;

        if let Some(previous) = self.active() {
            if let Err(e) = previous.supersede() {
                tracing::warn!(version = previous.version(), error = %e, "could not supersede previous worker");
            }
            // Writes still pending after this are dropped by the store once
            // the old generation is deleted.
            previous.wait_until_idle().await;
        }

        let worker = Arc::new(worker);
        match worker.on_activate().await {
            Ok(report) => {
                self.set_active(Some(worker));
                Ok(report)
            }
            Err(e) => {
                tracing::error!(version = worker.version(), error = %e, "activation failed");
                self.set_active(None);
                Err(e)
            }
        }
    }

    /// Resume the generation recorded by the last activation, without
    /// installing. `config` supplies the origin and app name; the version and
    /// cache name come from the record.
    ///
    /// Returns the resumed version, or `None` if a worker is already active
    /// or nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the recorded generation is gone, or a
    /// database error if the record cannot be read.
    pub async fn restore(&self, config: WorkerConfig, store: CacheDb) -> Result<Option<String>, Error> {
        let _updating = self.updating.lock().await;

        if let Some(active) = self.active() {
            tracing::debug!(version = active.version(), "restore skipped, worker already active");
            return Ok(None);
        }
        let Some(recorded) = store.active_generation().await? else {
            tracing::info!("no recorded generation to restore");
            return Ok(None);
        };

        let config = WorkerConfig { version: recorded.version, cache_name: recorded.cache_name, ..config };
        let worker = Arc::new(self.worker(config, store));
        worker.on_restore().await?;

        let version = worker.version().to_string();
        self.set_active(Some(worker));
        Ok(Some(version))
    }

    /// Answer a request from a page in scope.
    ///
    /// Without an active worker the page is uncontrolled and goes straight
    /// to the network.
    pub async fn fetch(&self, request: &Request) -> Response {
        if let Some(worker) = self.active() {
            return worker.on_fetch(request).await;
        }
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, url = %request.url, "uncontrolled fetch failed");
                Response::network_error()
            }
        }
    }

    /// Deliver push data to the active worker.
    pub fn push(&self, data: Option<&[u8]>) -> Option<Notification> {
        match self.active() {
            Some(worker) => worker.on_push(data),
            None => {
                tracing::warn!("push dropped, no active worker");
                None
            }
        }
    }

    /// Deliver a notification click to the active worker.
    pub fn notification_click(&self, id: u64) -> Option<WindowOpen> {
        self.active()?.on_notification_click(id)
    }

    /// Wait for the active worker's background work to finish.
    pub async fn wait_until_idle(&self) {
        if let Some(worker) = self.active() {
            worker.wait_until_idle().await;
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.active().map(|w| w.version().to_string()))
            .field("clients", &self.clients)
            .finish()
    }
}
