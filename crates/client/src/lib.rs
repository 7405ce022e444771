//! Network access for swcache.
//!
//! This crate provides the [`Network`] seam the engine fetches through and
//! its reqwest-backed implementation, plus URL helpers shared by the
//! engine and the server.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, canonicalize, resolve};
