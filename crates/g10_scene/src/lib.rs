//! Scenes for the G10 engine.

pub mod config;
pub mod description;
pub mod entity;
pub mod scene;
pub mod storage;

pub use config::{HierarchyConfig, SceneConfig};
pub use description::SceneDescription;
pub use entity::{Collider, Entity, ModelTransform};
pub use scene::{HierarchyStats, HierarchyStatus, Scene};
pub use storage::EntityStorage;
