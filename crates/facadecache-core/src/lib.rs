//! facadecache-core - Core library for facadecache
//!
//! Keeps denormalized facades of persisted entities in per-kind tables, consistent
//! with the store through post-commit notifications.

pub mod config;
pub mod error;
pub mod event;
pub mod index;
pub mod listener;
pub mod manager;
pub mod models;
pub mod store;
pub mod table;

pub use config::CacheConfig;
pub use error::{BootstrapReport, CacheError, CacheState, RemovalReport, StoreError};
pub use event::{CacheEvent, CommitEvent, EventBus};
pub use listener::{CommitListener, CommitSender, ListenerSummary};
pub use manager::{CacheManager, CacheStats};
pub use models::{AnyFacade, EntityId, EntityKind};
pub use store::{FacadeSource, Snapshot, SnapshotStore};
