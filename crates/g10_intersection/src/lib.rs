//! Bounding volume hierarchies for collision broad-phase and culling in the
//! G10 engine.
//!
//! The hierarchy never owns the entities it bounds. Every operation that
//! needs entity data takes a [`BoundedEntities`] implementation explicitly,
//! and keeps each entity's back-reference to its leaf node up to date. All
//! operations are synchronous and assume the caller serializes access, which
//! `&mut self` enforces for mutation.

pub mod bounding_volume;

pub use bounding_volume::{
    BVHError, BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, HierarchyDump, Node, NodeID, NodeShape},
};
