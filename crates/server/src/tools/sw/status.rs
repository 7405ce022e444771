//! sw_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_engine::Registration;

use super::push::NotificationView;
use crate::tools::json_result;

/// The worker controlling the scope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActiveWorker {
    pub version: String,
    /// Lifecycle state, e.g. `active-v14`.
    pub state: String,
    pub cache_name: String,
    pub origin: String,
}

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    /// Null while no worker controls the scope.
    pub active: Option<ActiveWorker>,
    /// Connected client pages.
    pub clients: usize,
    pub notifications: Vec<NotificationView>,
}

/// Implementation of the sw_status tool.
pub fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let active = registration.active().map(|worker| ActiveWorker {
        version: worker.version().to_string(),
        state: worker.state().to_string(),
        cache_name: worker.config().cache_name.clone(),
        origin: worker.config().origin.to_string(),
    });

    let output = SwStatusOutput {
        active,
        clients: registration.clients().len(),
        notifications: registration.tray().list().into_iter().map(NotificationView::from).collect(),
    };
    json_result(&output)
}
