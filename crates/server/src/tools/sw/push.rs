//! sw_push and sw_notification_click tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;
use swcache_engine::{Notification, Registration, WindowOpen};

use crate::tools::json_result;

/// Parameters for the sw_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwPushParams {
    /// Raw push data, normally a JSON object with optional `title`, `body`
    /// and `url`. Omit to simulate a push without payload.
    #[serde(default)]
    pub data: Option<String>,
}

/// A displayed notification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationView {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Opened on click.
    pub url: String,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self { id: n.id, title: n.title, body: n.body, icon: n.icon, badge: n.badge, vibrate: n.vibrate, url: n.data.url }
    }
}

/// Output from the sw_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwPushOutput {
    /// The notification shown, or null when the push was ignored.
    pub notification: Option<NotificationView>,
}

/// Implementation of the sw_push tool.
pub fn push_impl(registration: &Registration, params: SwPushParams) -> Result<CallToolResult, McpError> {
    if registration.active().is_none() {
        return Err(Error::NoActiveWorker.into());
    }
    let notification = registration.push(params.data.as_deref().map(str::as_bytes)).map(NotificationView::from);
    json_result(&SwPushOutput { notification })
}

/// Parameters for the sw_notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwNotificationClickParams {
    /// Id of the notification returned by sw_push.
    pub id: u64,
}

/// Output from the sw_notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwNotificationClickOutput {
    /// Client now showing the notification's URL.
    pub client_id: u64,
    /// True if an existing client was focused rather than a new one opened.
    pub focused: bool,
}

/// Implementation of the sw_notification_click tool.
pub fn notification_click_impl(
    registration: &Registration, params: SwNotificationClickParams,
) -> Result<CallToolResult, McpError> {
    if registration.active().is_none() {
        return Err(Error::NoActiveWorker.into());
    }
    let opened = registration
        .notification_click(params.id)
        .ok_or_else(|| Error::InvalidInput(format!("no notification with id {}", params.id)))?;

    let output = SwNotificationClickOutput { client_id: opened.client_id(), focused: matches!(opened, WindowOpen::Focused(_)) };
    json_result(&output)
}
