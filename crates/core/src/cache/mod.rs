//! SQLite-backed cache storage organised in named generations.
//!
//! This module provides a persistent, generation-scoped response cache using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - One named generation per deployed version tag
//! - Content-addressed request keys using SHA-256 hashing
//! - All-or-nothing population of a generation
//! - A persisted record of the active generation for offline restarts
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod active;
pub mod connection;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use active::ActiveGeneration;
pub use connection::CacheDb;
pub use generations::GenerationInfo;
pub use hash::RequestKey;
