//! Push payload presentation and the notification tray.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Body shown when the payload carries none.
pub const DEFAULT_BODY: &str = "new message";

/// Icon and badge of every notification.
pub const DEFAULT_ICON: &str = "/icons/icon.png";

/// Click target when the payload carries none.
pub const DEFAULT_URL: &str = "/";

/// Vibration pattern in milliseconds (vibrate, pause, vibrate).
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Inbound push payload. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse raw push data.
    ///
    /// Absent data and anything that is not a JSON object yield `None`;
    /// the push is then ignored.
    pub fn parse(data: Option<&[u8]>) -> Option<Self> {
        let data = data?;
        match serde_json::from_slice::<PushPayload>(data) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, bytes = data.len(), "ignoring malformed push payload");
                None
            }
        }
    }
}

/// Data attached to a notification and read back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// Empty strings count as missing, like the falsy checks pages rely on.
fn or_default(value: Option<String>, default: &str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

/// Notifications currently shown for the registration.
#[derive(Clone, Default)]
pub struct NotificationTray {
    inner: Arc<Mutex<TrayState>>,
}

#[derive(Default)]
struct TrayState {
    next_id: u64,
    shown: BTreeMap<u64, Notification>,
}

impl NotificationTray {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrayState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a notification from `payload`, filling defaults, and show it.
    pub fn show(&self, payload: PushPayload, default_title: &str) -> Notification {
        let mut state = self.state();
        state.next_id += 1;
        let notification = Notification {
            id: state.next_id,
            title: or_default(payload.title, default_title),
            body: or_default(payload.body, DEFAULT_BODY),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: NotificationData { url: or_default(payload.url, DEFAULT_URL) },
        };
        state.shown.insert(notification.id, notification.clone());
        notification
    }

    /// Close a notification, returning it if it was shown.
    pub fn close(&self, id: u64) -> Option<Notification> {
        self.state().shown.remove(&id)
    }

    /// Shown notifications, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.state().shown.values().cloned().collect()
    }
}

impl std::fmt::Debug for NotificationTray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationTray").field("shown", &self.state().shown.len()).finish()
    }
}
