//! Request-interception cache engine.
//!
//! A [`ServiceWorker`] sits between client pages and one origin. It
//! precaches a manifest into a versioned cache generation on install,
//! evicts every other generation on activation, routes each intercepted
//! request to a fetch policy, and tells connected clients when a new
//! version takes over.
//!
//! ```text
//! Registration
//!     ├── active: ServiceWorker ── GenerationManager ── CacheDb
//!     │                 └── router ── policy::{passthrough, network_first, stale_while_revalidate}
//!     ├── Clients (connected pages, CACHE_UPDATED broadcast)
//!     └── NotificationTray (push notifications)
//! ```

pub mod background;
pub mod clients;
pub mod generation;
pub mod lifecycle;
pub mod policy;
pub mod push;
pub mod registration;
pub mod router;
pub mod update;
pub mod worker;

pub use background::BackgroundTasks;
pub use clients::{ClientConnection, ClientId, Clients, WindowOpen};
pub use generation::GenerationManager;
pub use lifecycle::{LifecycleEvent, WorkerState};
pub use push::{Notification, NotificationTray, PushPayload};
pub use registration::Registration;
pub use router::Route;
pub use update::{ReloadReason, UpdateListener};
pub use worker::{ActivationReport, ServiceWorker, WorkerConfig};

#[cfg(test)]
pub(crate) mod testing;
