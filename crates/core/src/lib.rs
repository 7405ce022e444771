//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Generation-aware response cache with SQLite backend
//! - Request/response value types shared by the engine and the network client
//! - Client message types broadcast after activation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod request;
pub mod response;

pub use cache::{CacheDb, RequestKey};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use message::{ClientEvent, ClientMessage};
pub use request::{Request, RequestMode};
pub use response::{Response, ResponseKind};
