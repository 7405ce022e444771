//! Worker tools: intercepted fetches, push delivery, status.

pub mod fetch;
pub mod push;
pub mod status;

pub use fetch::{SwFetchParams, fetch_impl};
pub use push::{SwNotificationClickParams, SwPushParams, notification_click_impl, push_impl};
pub use status::status_impl;
