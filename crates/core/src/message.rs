//! Messages the engine posts to client pages.

use serde::{Deserialize, Serialize};

/// Structured message posted to every connected client.
///
/// Serializes as `{"type":"CACHE_UPDATED","version":"v14"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    CacheUpdated { version: String },
}

/// Everything a client page can observe from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Message(ClientMessage),
    /// The page is now controlled by a different worker version.
    ControllerChange { version: String },
    /// The page was brought to the foreground by a notification click.
    Focus,
}
