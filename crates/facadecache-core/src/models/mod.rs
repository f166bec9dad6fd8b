//! Data models for facadecache

pub mod facade;
pub mod kind;

pub use facade::{
    AnyFacade, BuildFacade, ConfigurationFacade, Facade, IssueFacade, MembershipFacade,
    ProjectFacade, TeamFacade, UserFacade,
};
pub use kind::{EntityId, EntityKind, ForeignKey, IndexKey, UnknownKind};
