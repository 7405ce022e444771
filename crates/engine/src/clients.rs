//! Connected client pages.
//!
//! Each page holds the receiving half of an unbounded channel. Delivery is
//! fire-and-forget: nothing is queued for pages that connect later, and a
//! page whose receiver is gone is dropped from the registry on the next send.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use swcache_core::{ClientEvent, ClientMessage};
use tokio::sync::mpsc;
use url::Url;

pub type ClientId = u64;

/// A connected page: its id and the events the engine sends it.
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ClientId,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
}

/// Outcome of [`Clients::open_window`].
#[derive(Debug)]
pub enum WindowOpen {
    /// A page already showing the URL was focused.
    Focused(ClientId),
    /// A new page was opened.
    Opened(ClientConnection),
}

impl WindowOpen {
    pub fn client_id(&self) -> ClientId {
        match self {
            WindowOpen::Focused(id) => *id,
            WindowOpen::Opened(conn) => conn.id,
        }
    }
}

struct ClientEntry {
    url: Url,
    controller: Option<String>,
    tx: mpsc::UnboundedSender<ClientEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: ClientId,
    clients: BTreeMap<ClientId, ClientEntry>,
}

/// Registry of pages within the controlled scope.
#[derive(Clone, Default)]
pub struct Clients {
    inner: Arc<Mutex<Registry>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a page at `url`. It starts uncontrolled.
    pub fn connect(&self, url: Url) -> ClientConnection {
        let (tx, events) = mpsc::unbounded_channel();
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.clients.insert(id, ClientEntry { url, controller: None, tx });
        tracing::debug!(client = id, "client connected");
        ClientConnection { id, events }
    }

    /// Remove a page. Returns false if it was not connected.
    pub fn disconnect(&self, id: ClientId) -> bool {
        self.registry().clients.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.registry().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version of the worker controlling the page, if any.
    pub fn controller(&self, id: ClientId) -> Option<String> {
        self.registry().clients.get(&id).and_then(|c| c.controller.clone())
    }

    /// Put every connected page under `version`'s control.
    ///
    /// Pages whose controller changes receive a `ControllerChange` event.
    /// Returns the number of pages that changed controller.
    pub fn claim(&self, version: &str) -> usize {
        let mut changed = 0;
        self.registry().clients.retain(|_, client| {
            if client.controller.as_deref() == Some(version) {
                return true;
            }
            client.controller = Some(version.to_string());
            changed += 1;
            client
                .tx
                .send(ClientEvent::ControllerChange { version: version.to_string() })
                .is_ok()
        });
        changed
    }

    /// Post `message` to every connected page.
    ///
    /// Returns the number of pages it was delivered to.
    pub fn post_all(&self, message: &ClientMessage) -> usize {
        let mut delivered = 0;
        self.registry().clients.retain(|id, client| {
            if client.tx.send(ClientEvent::Message(message.clone())).is_ok() {
                delivered += 1;
                true
            } else {
                tracing::debug!(client = id, "dropping disconnected client");
                false
            }
        });
        delivered
    }

    /// Focus a page already at `url`, or open a new one there.
    pub fn open_window(&self, url: Url) -> WindowOpen {
        {
            let registry = self.registry();
            let existing = registry
                .clients
                .iter()
                .find(|(_, client)| client.url == url && !client.tx.is_closed())
                .map(|(id, _)| *id);
            if let Some(id) = existing
                && let Some(client) = registry.clients.get(&id)
                && client.tx.send(ClientEvent::Focus).is_ok()
            {
                return WindowOpen::Focused(id);
            }
        }
        WindowOpen::Opened(self.connect(url))
    }
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clients").field("connected", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str) -> Url {
        Url::parse("https://app.test/").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_post_all_reaches_connected_clients() {
        let clients = Clients::new();
        let mut a = clients.connect(page("/"));
        let mut b = clients.connect(page("/about"));

        let msg = ClientMessage::CacheUpdated { version: "v2".into() };
        assert_eq!(clients.post_all(&msg), 2);

        assert_eq!(a.events.try_recv().unwrap(), ClientEvent::Message(msg.clone()));
        assert_eq!(b.events.try_recv().unwrap(), ClientEvent::Message(msg));
    }

    #[test]
    fn test_late_client_misses_broadcast() {
        let clients = Clients::new();
        clients.post_all(&ClientMessage::CacheUpdated { version: "v2".into() });

        let mut late = clients.connect(page("/"));
        assert!(late.events.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let clients = Clients::new();
        let gone = clients.connect(page("/"));
        let _kept = clients.connect(page("/"));
        drop(gone);

        assert_eq!(clients.post_all(&ClientMessage::CacheUpdated { version: "v2".into() }), 1);
        assert_eq!(clients.len(), 1);
    }

    #[test]
    fn test_disconnected_page_gets_nothing() {
        let clients = Clients::new();
        let mut gone = clients.connect(page("/"));
        let _kept = clients.connect(page("/about"));

        assert!(clients.disconnect(gone.id));
        assert!(!clients.disconnect(gone.id));

        assert_eq!(clients.claim("v2"), 1);
        assert_eq!(clients.post_all(&ClientMessage::CacheUpdated { version: "v2".into() }), 1);
        assert_eq!(clients.controller(gone.id), None);
        assert!(gone.events.try_recv().is_err());
    }

    #[test]
    fn test_claim_signals_controller_change_once() {
        let clients = Clients::new();
        let mut conn = clients.connect(page("/"));

        assert_eq!(clients.claim("v1"), 1);
        assert_eq!(clients.claim("v1"), 0);
        assert_eq!(clients.controller(conn.id).as_deref(), Some("v1"));
        assert_eq!(conn.events.try_recv().unwrap(), ClientEvent::ControllerChange { version: "v1".into() });
        assert!(conn.events.try_recv().is_err());
    }

    #[test]
    fn test_open_window_focuses_existing_page() {
        let clients = Clients::new();
        let mut conn = clients.connect(page("/inbox"));

        let opened = clients.open_window(page("/inbox"));
        assert!(matches!(opened, WindowOpen::Focused(id) if id == conn.id));
        assert_eq!(conn.events.try_recv().unwrap(), ClientEvent::Focus);
    }

    #[test]
    fn test_open_window_opens_new_page() {
        let clients = Clients::new();
        let _conn = clients.connect(page("/"));

        let opened = clients.open_window(page("/inbox"));
        assert!(matches!(opened, WindowOpen::Opened(_)));
        assert_eq!(clients.len(), 2);
    }
}
