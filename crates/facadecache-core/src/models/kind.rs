//! Entity identities, kind tags and the fixed relationship graph

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Newtype for store-issued identities - zero-cost type safety
///
/// Identities are monotonically issued by the store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Create a new EntityId
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw store value
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag naming one of the seven cached entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Project,
    Team,
    Membership,
    Configuration,
    Build,
    Issue,
}

/// Which parent reference a child facade carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignKey {
    Project,
    Team,
    User,
    Configuration,
}

/// Natural keys backing the bijective secondary indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKey {
    Name,
    Email,
}

impl EntityKind {
    /// Every kind, in bootstrap order
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Project,
        EntityKind::User,
        EntityKind::Team,
        EntityKind::Membership,
        EntityKind::Configuration,
        EntityKind::Build,
        EntityKind::Issue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Project => "project",
            EntityKind::Team => "team",
            EntityKind::Membership => "membership",
            EntityKind::Configuration => "configuration",
            EntityKind::Build => "build",
            EntityKind::Issue => "issue",
        }
    }

    /// Direct children in the relationship graph, with the reference each child holds
    ///
    /// ```text
    /// Project ──┬─> Team ──> Membership <── User
    ///           ├─> Configuration ──> Build
    ///           └─> Issue
    /// ```
    pub fn children(self) -> &'static [(EntityKind, ForeignKey)] {
        match self {
            EntityKind::Project => &[
                (EntityKind::Team, ForeignKey::Project),
                (EntityKind::Configuration, ForeignKey::Project),
                (EntityKind::Issue, ForeignKey::Project),
            ],
            EntityKind::Team => &[(EntityKind::Membership, ForeignKey::Team)],
            EntityKind::User => &[(EntityKind::Membership, ForeignKey::User)],
            EntityKind::Configuration => &[(EntityKind::Build, ForeignKey::Configuration)],
            EntityKind::Membership | EntityKind::Build | EntityKind::Issue => &[],
        }
    }

    /// Position in the global lock order
    ///
    /// Any read that holds more than one table lock acquires them by ascending rank:
    /// children before parents. Cascading removal never holds two table locks at once.
    /// The cache manager's lifecycle lock sits below rank 0: mutations and shutdown
    /// take it before any table lock.
    pub fn lock_rank(self) -> u8 {
        match self {
            EntityKind::Membership => 0,
            EntityKind::Build => 1,
            EntityKind::Issue => 2,
            EntityKind::Team => 3,
            EntityKind::Configuration => 4,
            EntityKind::User => 5,
            EntityKind::Project => 6,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown entity kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == singular)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
