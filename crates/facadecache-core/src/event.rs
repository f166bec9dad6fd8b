//! Commit notifications (inbound) and cache events (outbound)
//!
//! Inbound [`CommitEvent`]s are raised by the transactional layer strictly after the
//! owning transaction commits. Outbound [`CacheEvent`]s are published on a
//! tokio::broadcast [`EventBus`] once the cache has applied a change.

use crate::models::{AnyFacade, EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Post-commit notification delivered to the cache
///
/// Serialized one per line in replayable commit logs:
///
/// ```json
/// {"event":"system_started"}
/// {"event":"persisted","entity":{"kind":"project","id":1,"name":"core"}}
/// {"event":"removed","kind":"project","id":1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommitEvent {
    /// Process start; must precede every other notification, exactly once
    SystemStarted,
    /// A row was inserted or updated
    Persisted { entity: AnyFacade },
    /// A row was deleted
    Removed { kind: EntityKind, id: EntityId },
}

impl CommitEvent {
    pub fn persisted(entity: impl Into<AnyFacade>) -> Self {
        CommitEvent::Persisted {
            entity: entity.into(),
        }
    }

    pub fn removed(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        CommitEvent::Removed {
            kind,
            id: id.into(),
        }
    }
}

/// Events emitted by the cache after it changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Bootstrap finished loading this many rows
    BootstrapCompleted { rows: usize },
    /// A facade was inserted or replaced
    FacadePersisted { kind: EntityKind, id: EntityId },
    /// An identity was removed, along with `cascaded` dependent rows
    FacadeRemoved {
        kind: EntityKind,
        id: EntityId,
        cascaded: usize,
    },
    /// The cache was discarded
    ShutDown,
}

/// Event bus for broadcasting cache events
///
/// Uses tokio::broadcast for multi-consumer support.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
