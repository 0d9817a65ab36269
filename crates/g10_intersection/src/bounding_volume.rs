//! Bounding volumes.

pub mod hierarchy;

#[cfg(any(test, feature = "fuzzing"))]
pub mod fixtures;

use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use hierarchy::{NodeID, NodeShape};
use nalgebra::Matrix4;

/// The entities a [`BoundingVolumeHierarchy`](hierarchy::BoundingVolumeHierarchy)
/// bounds, as seen from the hierarchy.
///
/// Each entity with a collider holds a non-owning back-reference to the leaf
/// node that currently bounds it. The hierarchy reads it to dispatch updates
/// and rewrites it whenever a leaf is created, moved into another node by a
/// collapse, or released.
pub trait BoundedEntities {
    /// Returns the local space box of the collider of the given entity, or
    /// [`None`] if the entity does not exist or has no collider.
    fn local_collider_box(&self, entity: EntityID) -> Option<&AxisAlignedBox>;

    /// Returns the current model-to-world matrix of the given entity, or
    /// [`None`] if the entity does not exist.
    fn model_matrix(&self, entity: EntityID) -> Option<Matrix4<f32>>;

    /// Returns the node the given entity's collider refers back to.
    fn bounding_node(&self, entity: EntityID) -> Option<NodeID>;

    /// Sets the node the given entity's collider refers back to. Does nothing
    /// for entities without a collider.
    fn set_bounding_node(&mut self, entity: EntityID, node: Option<NodeID>);

    /// Returns a human readable name for the given entity, used when dumping
    /// the hierarchy.
    fn entity_name(&self, _entity: EntityID) -> Option<&str> {
        None
    }
}

/// Errors reported by bounding volume hierarchy operations.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum BVHError {
    /// A node handle does not refer to a live node, for instance because the
    /// node has been released.
    #[error("no live node with ID {0} exists in the hierarchy")]
    NullNode(NodeID),
    /// The entity does not exist or has no collider.
    #[error("entity {0} does not exist or has no collider")]
    NullEntity(EntityID),
    /// The hierarchy was requested for a set of entities with no colliders.
    #[error("no collidable entities to build the hierarchy from")]
    EmptyScene,
    /// A node was found with neither an entity nor two children, or with
    /// both an entity and children.
    #[error("node {node} is malformed (shape {shape:?})")]
    MalformedNode { node: NodeID, shape: NodeShape },
    /// The entity's back-reference does not point at a leaf bounding it.
    #[error("entity {entity} refers back to node {node}, which does not bound it")]
    DanglingBackReference { entity: EntityID, node: NodeID },
    /// The entity is already bounded by a leaf in the hierarchy.
    #[error("entity {entity} is already bounded by node {node}")]
    EntityAlreadyBounded { entity: EntityID, node: NodeID },
    /// Validation found a node breaking a structural invariant.
    #[error("node {node} violates a hierarchy invariant: {violation}")]
    InvariantViolation {
        node: NodeID,
        violation: &'static str,
    },
    /// Storage for nodes could not be allocated.
    #[error("failed to allocate storage for {requested} hierarchy nodes")]
    Allocation { requested: usize },
}
