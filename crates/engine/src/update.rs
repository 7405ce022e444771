//! Page-side handling of update signals.
//!
//! A page reloads at most once per handoff: after a confirmed
//! `CACHE_UPDATED`, or automatically when its controller changes.

use swcache_core::{ClientEvent, ClientMessage};

/// Why the page should reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadReason {
    /// The user accepted the update prompt.
    CacheUpdated { version: String },
    /// A new worker took control.
    ControllerChanged,
}

/// Prompt text for a `CACHE_UPDATED` message.
pub fn update_prompt(version: &str) -> String {
    format!("A new version ({version}) is available. Reload now?")
}

/// Reload guard for one page.
#[derive(Debug, Default)]
pub struct UpdateListener {
    refreshing: bool,
}

impl UpdateListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reload has already been requested.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// React to an event from the engine.
    ///
    /// `confirm` is asked before reloading on `CACHE_UPDATED`. Once a reload
    /// has been requested every later event is ignored.
    pub fn handle(&mut self, event: &ClientEvent, confirm: impl FnOnce(&str) -> bool) -> Option<ReloadReason> {
        if self.refreshing {
            return None;
        }
        let reason = match event {
            ClientEvent::Message(ClientMessage::CacheUpdated { version }) => {
                if !confirm(&update_prompt(version)) {
                    tracing::debug!(version = %version, "update declined");
                    return None;
                }
                ReloadReason::CacheUpdated { version: version.clone() }
            }
            ClientEvent::ControllerChange { .. } => ReloadReason::ControllerChanged,
            ClientEvent::Focus => return None,
        };
        self.refreshing = true;
        Some(reason)
    }
}
