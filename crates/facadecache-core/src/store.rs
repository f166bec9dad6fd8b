//! Bulk data source consulted once, at bootstrap
//!
//! The relational store is an external collaborator. The cache only ever asks it for
//! every row of each kind; it never calls back into it afterwards.

use crate::error::StoreError;
use crate::models::{
    BuildFacade, ConfigurationFacade, IssueFacade, MembershipFacade, ProjectFacade, TeamFacade,
    UserFacade,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Source of committed rows, one bulk query per entity kind
pub trait FacadeSource: Send + Sync {
    fn load_users(&self) -> Result<Vec<UserFacade>, StoreError>;

    fn load_projects(&self) -> Result<Vec<ProjectFacade>, StoreError>;

    fn load_teams(&self) -> Result<Vec<TeamFacade>, StoreError>;

    fn load_memberships(&self) -> Result<Vec<MembershipFacade>, StoreError>;

    fn load_configurations(&self) -> Result<Vec<ConfigurationFacade>, StoreError>;

    fn load_builds(&self) -> Result<Vec<BuildFacade>, StoreError>;

    fn load_issues(&self) -> Result<Vec<IssueFacade>, StoreError>;
}

/// Committed rows of every kind, as exported from the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub users: Vec<UserFacade>,
    pub projects: Vec<ProjectFacade>,
    pub teams: Vec<TeamFacade>,
    pub memberships: Vec<MembershipFacade>,
    pub configurations: Vec<ConfigurationFacade>,
    pub builds: Vec<BuildFacade>,
    pub issues: Vec<IssueFacade>,
}

/// [`FacadeSource`] backed by an in-memory [`Snapshot`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshot: Snapshot,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Parse a JSON snapshot document
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    /// Read and parse a JSON snapshot file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_json(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            path = %path.display(),
            users = store.snapshot.users.len(),
            projects = store.snapshot.projects.len(),
            builds = store.snapshot.builds.len(),
            "Snapshot opened"
        );
        Ok(store)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl FacadeSource for SnapshotStore {
    fn load_users(&self) -> Result<Vec<UserFacade>, StoreError> {
        Ok(self.snapshot.users.clone())
    }

    fn load_projects(&self) -> Result<Vec<ProjectFacade>, StoreError> {
        Ok(self.snapshot.projects.clone())
    }

    fn load_teams(&self) -> Result<Vec<TeamFacade>, StoreError> {
        Ok(self.snapshot.teams.clone())
    }

    fn load_memberships(&self) -> Result<Vec<MembershipFacade>, StoreError> {
        Ok(self.snapshot.memberships.clone())
    }

    fn load_configurations(&self) -> Result<Vec<ConfigurationFacade>, StoreError> {
        Ok(self.snapshot.configurations.clone())
    }

    fn load_builds(&self) -> Result<Vec<BuildFacade>, StoreError> {
        Ok(self.snapshot.builds.clone())
    }

    fn load_issues(&self) -> Result<Vec<IssueFacade>, StoreError> {
        Ok(self.snapshot.issues.clone())
    }
}
