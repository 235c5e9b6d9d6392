//! Domain types, store abstraction and configuration shared by the manager
//! and worker binaries.
//!
//! Neither binary depends on the other's crate: everything a task's
//! lifecycle touches — `Task`, `TaskEvent`, `State`, `Stats` — lives here so
//! the manager's placement/scoring code and the worker's reconciler agree on
//! the same wire shapes without a cyclic dependency between them.

pub mod api;
pub mod config;
pub mod defaults;
pub mod runspec;
pub mod stats;
pub mod store;
pub mod task;
pub mod utils;

pub use stats::Stats;
pub use store::Store;
pub use task::{State, Task, TaskEvent};

/// Result type alias used throughout this crate and re-exported for the two
/// binaries' typed error paths.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the parts of the system that want a typed error rather
/// than `anyhow`'s dynamic one — store access and configuration loading,
/// mainly. CLI wiring and `main` still use `anyhow::Result`, same split the
/// monitoring system this workspace started from uses.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(String),

    #[error("invalid transition: {0}")]
    Transition(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),
}
