//! Error types for facadecache-core
//!
//! In-memory operations cannot fail transiently: the only failure class at runtime is
//! a fatal bootstrap. Lookups of unknown identities return `None`, never an error.

use crate::models::EntityKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`FacadeSource`](crate::store::FacadeSource)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Malformed {kind} data: {message}")]
    Malformed { kind: EntityKind, message: String },

    #[error("Failed to read snapshot: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Core error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    // ===================
    // Lifecycle
    // ===================
    #[error("Bootstrap failed while loading {kind} rows")]
    Bootstrap {
        kind: EntityKind,
        #[source]
        source: StoreError,
    },

    #[error("Cache already bootstrapped")]
    AlreadyBootstrapped,

    #[error("Cache is not ready (state: {state})")]
    NotReady { state: CacheState },

    #[error("Notification queue closed")]
    QueueClosed,

    #[error("Commit listener aborted: {message}")]
    ListenerAborted { message: String },

    // ===================
    // Config
    // ===================
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Lifecycle of a [`CacheManager`](crate::CacheManager)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Constructed, not yet bootstrapped
    Cold,
    /// Bootstrap is querying the store; no lifecycle lock is held meanwhile
    Loading,
    /// Bootstrapped and serving reads
    Ready,
    /// Discarded; tables are empty and notifications are ignored
    ShutDown,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CacheState::Cold => "cold",
            CacheState::Loading => "loading",
            CacheState::Ready => "ready",
            CacheState::ShutDown => "shut down",
        };
        f.write_str(label)
    }
}

/// Outcome of a successful bootstrap
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// Rows loaded per kind
    pub rows: BTreeMap<EntityKind, usize>,
    /// Index bindings that collided with an earlier row of the same kind
    pub index_conflicts: usize,
    pub loaded_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl BootstrapReport {
    pub fn total_rows(&self) -> usize {
        self.rows.values().sum()
    }

    pub fn rows_of(&self, kind: EntityKind) -> usize {
        self.rows.get(&kind).copied().unwrap_or(0)
    }
}

/// Outcome of a removal notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Whether the identity itself was still cached
    pub removed: bool,
    /// Dependent rows removed per kind by the cascade
    pub cascaded: BTreeMap<EntityKind, usize>,
}

impl RemovalReport {
    pub fn cascaded_total(&self) -> usize {
        self.cascaded.values().sum()
    }

    pub fn cascaded_of(&self, kind: EntityKind) -> usize {
        self.cascaded.get(&kind).copied().unwrap_or(0)
    }

    /// True when neither the identity nor any dependent was present
    pub fn is_noop(&self) -> bool {
        !self.removed && self.cascaded.is_empty()
    }
}
