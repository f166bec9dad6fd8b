//! Facade value types
//!
//! A facade is the minimal, immutable projection of one persisted row. Tables hold
//! facades behind `Arc`, and an update always swaps in a whole new value.

use super::kind::{EntityId, EntityKind, ForeignKey, IndexKey};
use serde::{Deserialize, Serialize};

/// Behavior shared by every facade type
///
/// Describes how a facade is keyed and indexed inside its table, and which parent
/// references it holds for cascading removal.
pub trait Facade: Clone + Send + Sync + 'static {
    /// Kind tag of the table holding this facade
    const KIND: EntityKind;

    /// Secondary indices maintained for this kind
    const INDEXES: &'static [IndexKey] = &[];

    fn id(&self) -> EntityId;

    /// Natural key for the given index, `None` when the facade has no value for it
    fn index_value(&self, _index: IndexKey) -> Option<&str> {
        None
    }

    /// Parent identity referenced through the given foreign key
    fn foreign_key(&self, _fk: ForeignKey) -> Option<EntityId> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacade {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFacade {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamFacade {
    pub id: EntityId,
    pub project_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipFacade {
    pub id: EntityId,
    pub user_id: EntityId,
    pub team_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationFacade {
    pub id: EntityId,
    pub project_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFacade {
    pub id: EntityId,
    pub configuration_id: EntityId,
    pub commit_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFacade {
    pub id: EntityId,
    pub project_id: EntityId,
    pub number: i64,
}

impl UserFacade {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email,
        }
    }
}

impl ProjectFacade {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl TeamFacade {
    pub fn new(id: impl Into<EntityId>, project_id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
        }
    }
}

impl MembershipFacade {
    pub fn new(
        id: impl Into<EntityId>,
        user_id: impl Into<EntityId>,
        team_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            team_id: team_id.into(),
        }
    }
}

impl ConfigurationFacade {
    pub fn new(id: impl Into<EntityId>, project_id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
        }
    }
}

impl BuildFacade {
    pub fn new(
        id: impl Into<EntityId>,
        configuration_id: impl Into<EntityId>,
        commit_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            configuration_id: configuration_id.into(),
            commit_hash: commit_hash.into(),
        }
    }
}

impl IssueFacade {
    pub fn new(id: impl Into<EntityId>, project_id: impl Into<EntityId>, number: i64) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            number,
        }
    }
}

/// A facade of any kind, as carried by a persist notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnyFacade {
    User(UserFacade),
    Project(ProjectFacade),
    Team(TeamFacade),
    Membership(MembershipFacade),
    Configuration(ConfigurationFacade),
    Build(BuildFacade),
    Issue(IssueFacade),
}

impl AnyFacade {
    pub fn kind(&self) -> EntityKind {
        match self {
            AnyFacade::User(_) => EntityKind::User,
            AnyFacade::Project(_) => EntityKind::Project,
            AnyFacade::Team(_) => EntityKind::Team,
            AnyFacade::Membership(_) => EntityKind::Membership,
            AnyFacade::Configuration(_) => EntityKind::Configuration,
            AnyFacade::Build(_) => EntityKind::Build,
            AnyFacade::Issue(_) => EntityKind::Issue,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            AnyFacade::User(f) => f.id,
            AnyFacade::Project(f) => f.id,
            AnyFacade::Team(f) => f.id,
            AnyFacade::Membership(f) => f.id,
            AnyFacade::Configuration(f) => f.id,
            AnyFacade::Build(f) => f.id,
            AnyFacade::Issue(f) => f.id,
        }
    }
}

macro_rules! impl_any_conversions {
    ($($facade:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$facade> for AnyFacade {
                fn from(facade: $facade) -> Self {
                    AnyFacade::$variant(facade)
                }
            }
        )*
    };
}

impl_any_conversions! {
    UserFacade => User,
    ProjectFacade => Project,
    TeamFacade => Team,
    MembershipFacade => Membership,
    ConfigurationFacade => Configuration,
    BuildFacade => Build,
    IssueFacade => Issue,
}

impl Facade for UserFacade {
    const KIND: EntityKind = EntityKind::User;
    const INDEXES: &'static [IndexKey] = &[IndexKey::Name, IndexKey::Email];

    fn id(&self) -> EntityId {
        self.id
    }

    fn index_value(&self, index: IndexKey) -> Option<&str> {
        match index {
            IndexKey::Name => Some(&self.name),
            IndexKey::Email => self.email.as_deref(),
        }
    }
}

impl Facade for ProjectFacade {
    const KIND: EntityKind = EntityKind::Project;
    const INDEXES: &'static [IndexKey] = &[IndexKey::Name];

    fn id(&self) -> EntityId {
        self.id
    }

    fn index_value(&self, index: IndexKey) -> Option<&str> {
        match index {
            IndexKey::Name => Some(&self.name),
            IndexKey::Email => None,
        }
    }
}

impl Facade for TeamFacade {
    const KIND: EntityKind = EntityKind::Team;

    fn id(&self) -> EntityId {
        self.id
    }

    fn foreign_key(&self, fk: ForeignKey) -> Option<EntityId> {
        match fk {
            ForeignKey::Project => Some(self.project_id),
            _ => None,
        }
    }
}

impl Facade for MembershipFacade {
    const KIND: EntityKind = EntityKind::Membership;

    fn id(&self) -> EntityId {
        self.id
    }

    fn foreign_key(&self, fk: ForeignKey) -> Option<EntityId> {
        match fk {
            ForeignKey::Team => Some(self.team_id),
            ForeignKey::User => Some(self.user_id),
            _ => None,
        }
    }
}

impl Facade for ConfigurationFacade {
    const KIND: EntityKind = EntityKind::Configuration;

    fn id(&self) -> EntityId {
        self.id
    }

    fn foreign_key(&self, fk: ForeignKey) -> Option<EntityId> {
        match fk {
            ForeignKey::Project => Some(self.project_id),
            _ => None,
        }
    }
}

impl Facade for BuildFacade {
    const KIND: EntityKind = EntityKind::Build;

    fn id(&self) -> EntityId {
        self.id
    }

    fn foreign_key(&self, fk: ForeignKey) -> Option<EntityId> {
        match fk {
            ForeignKey::Configuration => Some(self.configuration_id),
            _ => None,
        }
    }
}

impl Facade for IssueFacade {
    const KIND: EntityKind = EntityKind::Issue;

    fn id(&self) -> EntityId {
        self.id
    }

    fn foreign_key(&self, fk: ForeignKey) -> Option<EntityId> {
        match fk {
            ForeignKey::Project => Some(self.project_id),
            _ => None,
        }
    }
}
