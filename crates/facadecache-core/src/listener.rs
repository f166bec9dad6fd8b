//! Commit listener: applies post-commit notifications to the cache
//!
//! One tokio task drains a bounded mpsc queue and applies notifications strictly in
//! arrival order. The transactional layer enqueues them in commit order, so two
//! notifications for the same identity always apply in the order their transactions
//! committed. Nothing is skipped or rolled back once enqueued.

use crate::error::{CacheError, CacheState};
use crate::event::CommitEvent;
use crate::manager::CacheManager;
use crate::store::FacadeSource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counts reported when the listener drains and exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSummary {
    pub persisted: usize,
    pub removed: usize,
    /// Notifications rejected for arriving before `SystemStarted` or after shutdown
    pub dropped: usize,
}

/// Handle used by the transactional layer to enqueue post-commit notifications
#[derive(Debug, Clone)]
pub struct CommitSender {
    tx: mpsc::Sender<CommitEvent>,
}

impl CommitSender {
    /// Enqueue a notification, waiting while the queue is full
    pub async fn notify(&self, event: CommitEvent) -> Result<(), CacheError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CacheError::QueueClosed)
    }

    /// Enqueue every notification in order
    pub async fn notify_all(
        &self,
        events: impl IntoIterator<Item = CommitEvent>,
    ) -> Result<(), CacheError> {
        for event in events {
            self.notify(event).await?;
        }
        Ok(())
    }

    /// Stop accepting notifications; the listener exits once the queue drains
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Dispatcher from the commit queue to a [`CacheManager`]
pub struct CommitListener {
    manager: Arc<CacheManager>,
    source: Arc<dyn FacadeSource>,
    rx: mpsc::Receiver<CommitEvent>,
    summary: ListenerSummary,
    started: bool,
}

impl CommitListener {
    /// Spawn the listener task
    ///
    /// The join handle resolves when every [`CommitSender`] is dropped and the queue is
    /// drained, or early with the fatal error if bootstrap fails.
    pub fn spawn(
        manager: Arc<CacheManager>,
        source: Arc<dyn FacadeSource>,
    ) -> (
        CommitSender,
        JoinHandle<Result<ListenerSummary, CacheError>>,
    ) {
        let (tx, rx) = mpsc::channel(manager.config().queue_capacity);
        let listener = Self {
            manager,
            source,
            rx,
            summary: ListenerSummary::default(),
            started: false,
        };

        let handle = tokio::spawn(listener.run());
        (CommitSender { tx }, handle)
    }

    async fn run(mut self) -> Result<ListenerSummary, CacheError> {
        info!("Commit listener started");

        while let Some(event) = self.rx.recv().await {
            self.handle(event).await?;
        }

        info!(
            persisted = self.summary.persisted,
            removed = self.summary.removed,
            dropped = self.summary.dropped,
            "Commit listener drained"
        );
        Ok(self.summary)
    }

    async fn handle(&mut self, event: CommitEvent) -> Result<(), CacheError> {
        match event {
            CommitEvent::SystemStarted => {
                if self.started {
                    warn!("Duplicate SystemStarted ignored");
                    return Ok(());
                }
                self.bootstrap().await?;
                self.started = true;
            }
            CommitEvent::Persisted { entity } => {
                if !self.accepts(entity.kind().as_str()) {
                    return Ok(());
                }
                match self.manager.apply_persist(entity) {
                    Ok(_) => self.summary.persisted += 1,
                    Err(e) => self.reject(e),
                }
            }
            CommitEvent::Removed { kind, id } => {
                if !self.accepts(kind.as_str()) {
                    return Ok(());
                }
                match self.manager.apply_remove(kind, id) {
                    Ok(_) => self.summary.removed += 1,
                    Err(e) => self.reject(e),
                }
            }
        }
        Ok(())
    }

    /// Run bootstrap off the async worker; the store query may block
    async fn bootstrap(&self) -> Result<(), CacheError> {
        let manager = Arc::clone(&self.manager);
        let source = Arc::clone(&self.source);

        let report = tokio::task::spawn_blocking(move || manager.bootstrap(source.as_ref()))
            .await
            .map_err(|e| CacheError::ListenerAborted {
                message: e.to_string(),
            })??;

        debug!(rows = report.total_rows(), "Listener bootstrap finished");
        Ok(())
    }

    fn accepts(&mut self, kind: &str) -> bool {
        if self.started {
            return true;
        }
        error!(kind, "Notification before SystemStarted dropped");
        self.summary.dropped += 1;
        false
    }

    fn reject(&mut self, error: CacheError) {
        match error {
            CacheError::NotReady {
                state: CacheState::ShutDown,
            } => warn!("Notification after shutdown ignored"),
            other => error!(error = %other, "Notification rejected"),
        }
        self.summary.dropped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{
        BuildFacade, ConfigurationFacade, EntityKind, IssueFacade, MembershipFacade,
        ProjectFacade, TeamFacade, UserFacade,
    };
    use crate::store::{Snapshot, SnapshotStore};

    struct DownStore;

    impl FacadeSource for DownStore {
        fn load_users(&self) -> Result<Vec<UserFacade>, StoreError> {
            Ok(Vec::new())
        }

        fn load_projects(&self) -> Result<Vec<ProjectFacade>, StoreError> {
            Err(StoreError::Unavailable {
                reason: "connection refused".to_string(),
            })
        }

        fn load_teams(&self) -> Result<Vec<TeamFacade>, StoreError> {
            Ok(Vec::new())
        }

        fn load_memberships(&self) -> Result<Vec<MembershipFacade>, StoreError> {
            Ok(Vec::new())
        }

        fn load_configurations(&self) -> Result<Vec<ConfigurationFacade>, StoreError> {
            Ok(Vec::new())
        }

        fn load_builds(&self) -> Result<Vec<BuildFacade>, StoreError> {
            Ok(Vec::new())
        }

        fn load_issues(&self) -> Result<Vec<IssueFacade>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_listener_applies_in_order() {
        let manager = Arc::new(CacheManager::with_defaults());
        let store = SnapshotStore::new(Snapshot {
            projects: vec![ProjectFacade::new(1, "core")],
            ..Default::default()
        });
        let (sender, handle) = CommitListener::spawn(Arc::clone(&manager), Arc::new(store));

        sender
            .notify_all([
                CommitEvent::SystemStarted,
                CommitEvent::persisted(ProjectFacade::new(1, "core-renamed")),
                CommitEvent::persisted(TeamFacade::new(10, 1)),
                CommitEvent::removed(EntityKind::Team, 10),
                CommitEvent::persisted(TeamFacade::new(10, 1)),
            ])
            .await
            .unwrap();
        sender.close();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.persisted, 3);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.dropped, 0);

        assert_eq!(manager.project(1).unwrap().name, "core-renamed");
        assert!(manager.project_id_by_name("core").is_none());
        assert!(manager.team(10).is_some());
    }

    #[tokio::test]
    async fn test_notifications_before_start_are_dropped() {
        let manager = Arc::new(CacheManager::with_defaults());
        let (sender, handle) =
            CommitListener::spawn(Arc::clone(&manager), Arc::new(SnapshotStore::default()));

        sender
            .notify_all([
                CommitEvent::persisted(ProjectFacade::new(1, "early")),
                CommitEvent::SystemStarted,
                CommitEvent::SystemStarted,
            ])
            .await
            .unwrap();
        sender.close();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.dropped, 1);
        assert!(manager.project(1).is_none());
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_fatal() {
        let manager = Arc::new(CacheManager::with_defaults());
        let (sender, handle) = CommitListener::spawn(Arc::clone(&manager), Arc::new(DownStore));

        sender.notify(CommitEvent::SystemStarted).await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            CacheError::Bootstrap {
                kind: EntityKind::Project,
                ..
            }
        ));
        assert_eq!(manager.state(), CacheState::Cold);

        // The task is gone, so the queue is closed
        let closed = sender
            .notify(CommitEvent::removed(EntityKind::Project, 1))
            .await;
        assert!(matches!(closed, Err(CacheError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_notifications_after_shutdown_are_dropped() {
        let manager = Arc::new(CacheManager::with_defaults());
        let (sender, handle) =
            CommitListener::spawn(Arc::clone(&manager), Arc::new(SnapshotStore::default()));

        sender.notify(CommitEvent::SystemStarted).await.unwrap();
        sender
            .notify(CommitEvent::persisted(ProjectFacade::new(1, "core")))
            .await
            .unwrap();

        // Wait until the persist is visible before discarding the cache
        while manager.project(1).is_none() {
            tokio::task::yield_now().await;
        }
        manager.shutdown();

        sender
            .notify(CommitEvent::removed(EntityKind::Project, 1))
            .await
            .unwrap();
        sender.close();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.persisted, 1);
        assert_eq!(summary.dropped, 1);
    }
}
