//! filegate library: download gateway with per-file download counters.
//!
//! This crate provides the components for serving files out of an object
//! store over HTTP: link generation, forced-download responses, uploads,
//! listings, and approximate download statistics kept in a key/value
//! counter store.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod counters;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod queue;
pub mod server;
pub mod storage;
pub mod validation;

use crate::config::Config;
use crate::counters::DownloadCounters;
use crate::queue::CounterQueue;
use crate::storage::backend::ObjectStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Object storage backend (local filesystem or memory).
    pub storage: Arc<dyn ObjectStore>,
    /// Download counters over the configured counter store.
    pub counters: DownloadCounters,
    /// Background queue that applies download increments.
    pub queue: CounterQueue,
}
