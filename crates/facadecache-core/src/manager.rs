//! Cache manager: seven entity tables kept in step with the store's commit feed
//!
//! Each table has its own parking_lot::RwLock. Multi-table reads take read locks in
//! [`EntityKind::lock_rank`] order (children before parents). Cascading removal takes
//! one table's write lock at a time and releases it before visiting the next table.
//!
//! Cascades are not atomic across tables: a concurrent reader may briefly see a child
//! whose parent is already gone.
//!
//! The lifecycle `state` lock ranks before every table lock. Mutations hold its read
//! side across their table writes and `shutdown` holds its write side across the clear;
//! nothing takes it while holding a table lock.

use crate::config::CacheConfig;
use crate::error::{BootstrapReport, CacheError, CacheState, RemovalReport, StoreError};
use crate::event::{CacheEvent, EventBus};
use crate::models::{
    AnyFacade, BuildFacade, ConfigurationFacade, EntityId, EntityKind, IndexKey, IssueFacade,
    MembershipFacade, ProjectFacade, TeamFacade, UserFacade,
};
use crate::store::FacadeSource;
use crate::table::{EntityTable, TableOps};
use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Row counts per table at the time of the call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub rows: BTreeMap<EntityKind, usize>,
}

impl CacheStats {
    pub fn total_rows(&self) -> usize {
        self.rows.values().sum()
    }

    pub fn rows_of(&self, kind: EntityKind) -> usize {
        self.rows.get(&kind).copied().unwrap_or(0)
    }
}

/// In-process cache of entity facades
///
/// One instance per process, constructed explicitly and shared by `Arc`. Lifecycle:
/// [`bootstrap`](Self::bootstrap) once before serving, then post-commit
/// [`apply_persist`](Self::apply_persist) / [`apply_remove`](Self::apply_remove),
/// then [`shutdown`](Self::shutdown).
pub struct CacheManager {
    config: CacheConfig,

    users: EntityTable<UserFacade>,
    projects: EntityTable<ProjectFacade>,
    teams: EntityTable<TeamFacade>,
    memberships: EntityTable<MembershipFacade>,
    configurations: EntityTable<ConfigurationFacade>,
    builds: EntityTable<BuildFacade>,
    issues: EntityTable<IssueFacade>,

    /// Lifecycle; ranks before every table lock, and reads never take it
    state: RwLock<CacheState>,

    event_bus: EventBus,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        Self {
            config,
            users: EntityTable::new(),
            projects: EntityTable::new(),
            teams: EntityTable::new(),
            memberships: EntityTable::new(),
            configurations: EntityTable::new(),
            builds: EntityTable::new(),
            issues: EntityTable::new(),
            state: RwLock::new(CacheState::Cold),
            event_bus,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the event bus for subscribing to cache changes
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn state(&self) -> CacheState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == CacheState::Ready
    }

    /// Registry from kind tag to its table
    fn table(&self, kind: EntityKind) -> &dyn TableOps {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Project => &self.projects,
            EntityKind::Team => &self.teams,
            EntityKind::Membership => &self.memberships,
            EntityKind::Configuration => &self.configurations,
            EntityKind::Build => &self.builds,
            EntityKind::Issue => &self.issues,
        }
    }

    // ===================
    // Lifecycle
    // ===================

    /// Bulk-load every table from the store
    ///
    /// Must run once, before concurrent access begins. The lifecycle lock is held only
    /// to move `Cold -> Loading` and `Loading -> Ready`, never across a store query. A
    /// store failure is fatal: the partially filled tables are cleared and the cache
    /// goes back to cold. A shutdown that lands mid-load wins and the loaded rows are
    /// discarded.
    pub fn bootstrap(&self, source: &dyn FacadeSource) -> Result<BootstrapReport, CacheError> {
        {
            let mut state = self.state.write();
            match *state {
                CacheState::Cold => *state = CacheState::Loading,
                CacheState::Loading | CacheState::Ready => {
                    return Err(CacheError::AlreadyBootstrapped)
                }
                CacheState::ShutDown => return Err(CacheError::NotReady { state: *state }),
            }
        }

        info!("Caching entity facades");
        let started = Instant::now();
        let mut rows = BTreeMap::new();
        let mut index_conflicts = 0;

        for kind in EntityKind::ALL {
            match self.load_kind(kind, source) {
                Ok((count, conflicts)) => {
                    debug!(%kind, rows = count, "Table loaded");
                    rows.insert(kind, count);
                    index_conflicts += conflicts;
                }
                Err(err) => {
                    error!(%kind, error = %err, "Bootstrap failed, cache stays cold");
                    let mut state = self.state.write();
                    self.clear_tables();
                    if *state == CacheState::Loading {
                        *state = CacheState::Cold;
                    }
                    return Err(CacheError::Bootstrap { kind, source: err });
                }
            }
        }

        {
            let mut state = self.state.write();
            if *state != CacheState::Loading {
                warn!(state = %*state, "Cache shut down during bootstrap, discarding rows");
                self.clear_tables();
                return Err(CacheError::NotReady { state: *state });
            }
            *state = CacheState::Ready;
        }

        let report = BootstrapReport {
            rows,
            index_conflicts,
            loaded_at: Utc::now(),
            elapsed: started.elapsed(),
        };

        info!(
            rows = report.total_rows(),
            index_conflicts,
            elapsed = ?report.elapsed,
            "Bootstrap complete"
        );
        self.event_bus.publish(CacheEvent::BootstrapCompleted {
            rows: report.total_rows(),
        });

        Ok(report)
    }

    /// Query one kind from the store, then fill its table
    ///
    /// No lock is held during the store call; the table's write lock is taken only for
    /// the fill.
    fn load_kind(
        &self,
        kind: EntityKind,
        source: &dyn FacadeSource,
    ) -> Result<(usize, usize), StoreError> {
        fn fill<F: crate::models::Facade>(table: &EntityTable<F>, rows: Vec<F>) -> (usize, usize) {
            let count = rows.len();
            (count, table.load(rows))
        }

        Ok(match kind {
            EntityKind::User => fill(&self.users, source.load_users()?),
            EntityKind::Project => fill(&self.projects, source.load_projects()?),
            EntityKind::Team => fill(&self.teams, source.load_teams()?),
            EntityKind::Membership => fill(&self.memberships, source.load_memberships()?),
            EntityKind::Configuration => {
                fill(&self.configurations, source.load_configurations()?)
            }
            EntityKind::Build => fill(&self.builds, source.load_builds()?),
            EntityKind::Issue => fill(&self.issues, source.load_issues()?),
        })
    }

    /// Discard every cached row; later notifications are ignored
    ///
    /// The lifecycle write lock is held until the tables are empty, so a mutation that
    /// already passed its state check finishes before the clear.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == CacheState::ShutDown {
                return;
            }
            *state = CacheState::ShutDown;
            self.clear_tables();
        }

        info!("Cache shut down");
        self.event_bus.publish(CacheEvent::ShutDown);
    }

    fn clear_tables(&self) {
        for kind in EntityKind::ALL {
            self.table(kind).clear_rows();
        }
    }

    /// Take the lifecycle read lock for a mutation, refusing once shut down
    ///
    /// The guard must outlive the table mutation it protects.
    fn accepting(&self) -> Result<RwLockReadGuard<'_, CacheState>, CacheError> {
        let state = self.state.read();
        match *state {
            CacheState::ShutDown => Err(CacheError::NotReady { state: *state }),
            _ => Ok(state),
        }
    }

    // ===================
    // Post-commit mutations
    // ===================

    /// Upsert a committed facade into its table
    ///
    /// Returns whether an earlier facade for the same identity was replaced.
    pub fn apply_persist(&self, facade: impl Into<AnyFacade>) -> Result<bool, CacheError> {
        let facade = facade.into();
        let (kind, id) = (facade.kind(), facade.id());

        let state = self.accepting()?;
        let replaced = match facade {
            AnyFacade::User(f) => self.users.put(f).is_some(),
            AnyFacade::Project(f) => self.projects.put(f).is_some(),
            AnyFacade::Team(f) => self.teams.put(f).is_some(),
            AnyFacade::Membership(f) => self.memberships.put(f).is_some(),
            AnyFacade::Configuration(f) => self.configurations.put(f).is_some(),
            AnyFacade::Build(f) => self.builds.put(f).is_some(),
            AnyFacade::Issue(f) => self.issues.put(f).is_some(),
        };
        drop(state);

        debug!(%kind, %id, replaced, "Facade persisted");
        self.event_bus
            .publish(CacheEvent::FacadePersisted { kind, id });
        Ok(replaced)
    }

    /// Remove a committed deletion and cascade through the relationship graph
    ///
    /// Absent identities and already-removed children are tolerated as no-ops.
    pub fn apply_remove(
        &self,
        kind: EntityKind,
        id: impl Into<EntityId>,
    ) -> Result<RemovalReport, CacheError> {
        let id = id.into();

        let state = self.accepting()?;
        let mut report = RemovalReport {
            removed: self.table(kind).remove_id(id),
            ..Default::default()
        };
        self.cascade(kind, id, &mut report);
        drop(state);

        let cascaded = report.cascaded_total();
        if cascaded > 0 && self.config.log_cascades {
            info!(%kind, %id, cascaded, detail = ?report.cascaded, "Cascading removal");
        } else {
            debug!(%kind, %id, removed = report.removed, cascaded, "Facade removed");
        }

        self.event_bus
            .publish(CacheEvent::FacadeRemoved { kind, id, cascaded });
        Ok(report)
    }

    /// Remove every descendant of `(kind, id)`, depth first
    fn cascade(&self, kind: EntityKind, id: EntityId, report: &mut RemovalReport) {
        for &(child_kind, fk) in kind.children() {
            // Child table lock is held only inside remove_children
            let removed = self.table(child_kind).remove_children(fk, id);
            if removed.is_empty() {
                continue;
            }

            *report.cascaded.entry(child_kind).or_default() += removed.len();
            for child_id in removed {
                self.cascade(child_kind, child_id, report);
            }
        }
    }

    // ===================
    // Read accessors
    // ===================

    pub fn user(&self, id: impl Into<EntityId>) -> Option<Arc<UserFacade>> {
        self.users.get(id.into())
    }

    pub fn project(&self, id: impl Into<EntityId>) -> Option<Arc<ProjectFacade>> {
        self.projects.get(id.into())
    }

    pub fn team(&self, id: impl Into<EntityId>) -> Option<Arc<TeamFacade>> {
        self.teams.get(id.into())
    }

    pub fn membership(&self, id: impl Into<EntityId>) -> Option<Arc<MembershipFacade>> {
        self.memberships.get(id.into())
    }

    pub fn configuration(&self, id: impl Into<EntityId>) -> Option<Arc<ConfigurationFacade>> {
        self.configurations.get(id.into())
    }

    pub fn build(&self, id: impl Into<EntityId>) -> Option<Arc<BuildFacade>> {
        self.builds.get(id.into())
    }

    pub fn issue(&self, id: impl Into<EntityId>) -> Option<Arc<IssueFacade>> {
        self.issues.get(id.into())
    }

    /// Kind-erased get, for callers that only hold a tag
    pub fn get(&self, kind: EntityKind, id: impl Into<EntityId>) -> Option<AnyFacade> {
        let id = id.into();
        match kind {
            EntityKind::User => self.user(id).map(|f| AnyFacade::from((*f).clone())),
            EntityKind::Project => self.project(id).map(|f| AnyFacade::from((*f).clone())),
            EntityKind::Team => self.team(id).map(|f| AnyFacade::from(*f)),
            EntityKind::Membership => self.membership(id).map(|f| AnyFacade::from(*f)),
            EntityKind::Configuration => self.configuration(id).map(|f| AnyFacade::from(*f)),
            EntityKind::Build => self.build(id).map(|f| AnyFacade::from((*f).clone())),
            EntityKind::Issue => self.issue(id).map(|f| AnyFacade::from(*f)),
        }
    }

    pub fn contains(&self, kind: EntityKind, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        match kind {
            EntityKind::User => self.users.contains(id),
            EntityKind::Project => self.projects.contains(id),
            EntityKind::Team => self.teams.contains(id),
            EntityKind::Membership => self.memberships.contains(id),
            EntityKind::Configuration => self.configurations.contains(id),
            EntityKind::Build => self.builds.contains(id),
            EntityKind::Issue => self.issues.contains(id),
        }
    }

    pub fn user_id_by_name(&self, name: &str) -> Option<EntityId> {
        self.users.lookup(IndexKey::Name, name)
    }

    pub fn user_id_by_email(&self, email: &str) -> Option<EntityId> {
        self.users.lookup(IndexKey::Email, email)
    }

    pub fn project_id_by_name(&self, name: &str) -> Option<EntityId> {
        self.projects.lookup(IndexKey::Name, name)
    }

    /// Copy of the project name → id index
    pub fn project_ids(&self) -> HashMap<String, EntityId> {
        self.projects.index_snapshot(IndexKey::Name)
    }

    // Snapshots: call-time copies, unaffected by later mutations

    pub fn users(&self) -> HashMap<EntityId, Arc<UserFacade>> {
        self.users.snapshot()
    }

    pub fn projects(&self) -> HashMap<EntityId, Arc<ProjectFacade>> {
        self.projects.snapshot()
    }

    pub fn teams(&self) -> HashMap<EntityId, Arc<TeamFacade>> {
        self.teams.snapshot()
    }

    pub fn memberships(&self) -> HashMap<EntityId, Arc<MembershipFacade>> {
        self.memberships.snapshot()
    }

    pub fn configurations(&self) -> HashMap<EntityId, Arc<ConfigurationFacade>> {
        self.configurations.snapshot()
    }

    pub fn builds(&self) -> HashMap<EntityId, Arc<BuildFacade>> {
        self.builds.snapshot()
    }

    pub fn issues(&self) -> HashMap<EntityId, Arc<IssueFacade>> {
        self.issues.snapshot()
    }

    // ===================
    // Derived queries
    // ===================

    /// Ids of builds whose configuration belongs to `project`
    pub fn build_ids_by_project(&self, project: impl Into<EntityId>) -> HashSet<EntityId> {
        let project = project.into();
        self.join_builds(|_, configuration| configuration.project_id == project)
    }

    /// Ids of builds run under `configuration`
    pub fn build_ids_by_configuration(
        &self,
        configuration: impl Into<EntityId>,
    ) -> HashSet<EntityId> {
        let configuration = configuration.into();
        self.builds
            .ids_where(|build| build.configuration_id == configuration)
    }

    /// Issue numbers in use within `project`
    pub fn issue_numbers(&self, project: impl Into<EntityId>) -> HashSet<i64> {
        let project = project.into();
        self.issues
            .read()
            .values()
            .filter(|issue| issue.project_id == project)
            .map(|issue| issue.number)
            .collect()
    }

    /// Ids of builds within `project` whose commit hash is one of `commit_hashes`
    pub fn filter_build_ids<S: AsRef<str>>(
        &self,
        project: impl Into<EntityId>,
        commit_hashes: &[S],
    ) -> HashSet<EntityId> {
        let project = project.into();
        let wanted: HashSet<&str> = commit_hashes.iter().map(AsRef::as_ref).collect();
        if wanted.is_empty() {
            return HashSet::new();
        }

        self.join_builds(|build, configuration| {
            configuration.project_id == project && wanted.contains(build.commit_hash.as_str())
        })
    }

    /// Scan builds joined to their configuration under both read locks
    ///
    /// Lock order: builds, then configurations.
    fn join_builds(
        &self,
        keep: impl Fn(&BuildFacade, &ConfigurationFacade) -> bool,
    ) -> HashSet<EntityId> {
        debug_assert!(EntityKind::Build.lock_rank() < EntityKind::Configuration.lock_rank());

        let builds = self.builds.read();
        let configurations = self.configurations.read();

        builds
            .values()
            .filter(|build| {
                configurations
                    .get(build.configuration_id)
                    .is_some_and(|configuration| keep(build, configuration))
            })
            .map(|build| build.id)
            .collect()
    }

    // ===================
    // Introspection
    // ===================

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            rows: EntityKind::ALL
                .into_iter()
                .map(|kind| (kind, self.table(kind).row_count()))
                .collect(),
        }
    }

    /// True when the user and project indices are bijective with their rows
    pub fn indices_consistent(&self) -> bool {
        let consistent = self.users.is_consistent() && self.projects.is_consistent();
        if !consistent {
            warn!("Secondary index out of step with rows");
        }
        consistent
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
