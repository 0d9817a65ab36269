//! Bounding volume hierarchy.

mod dump;
mod insert;
mod naive_bottom_up;
mod query;
mod remove;
mod resize;
mod validation;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;

pub use dump::HierarchyDump;

use crate::bounding_volume::{BVHError, BoundedEntities};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use std::fmt;

/// A binary tree of axis-aligned bounding boxes over a set of entities.
///
/// Every leaf bounds a single entity, and every internal node bounds the
/// union of its two children. Nodes live in an arena owned by the hierarchy
/// and are addressed by [`NodeID`] handles. Each node also knows its parent,
/// so ancestors of a changed node can be refitted by walking upwards.
///
/// Between operations, a consistent hierarchy has no nodes with a single
/// child. Such nodes only exist transiently while an entity is removed or
/// inserted, and are collapsed by [`Self::resize`] and
/// [`Self::refit_ancestors`].
#[derive(Clone, Debug, Default)]
pub struct BoundingVolumeHierarchy {
    nodes: NodeStorage,
    root: Option<NodeID>,
}

/// Handle to a node in a [`BoundingVolumeHierarchy`].
///
/// The handle holds the generation of the arena slot it was created for, so
/// a handle to a released node is rejected rather than silently referring to
/// whatever node reuses the slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeID {
    idx: u32,
    generation: u32,
}

/// A node in a [`BoundingVolumeHierarchy`].
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    aabb: AxisAlignedBox,
    entity: Option<EntityID>,
    left: Option<NodeID>,
    right: Option<NodeID>,
    parent: Option<NodeID>,
}

/// The structural shape of a [`Node`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeShape {
    /// Bounds an entity and has no children.
    Leaf,
    /// Bounds two children and has no entity.
    Internal,
    /// Has only a left child. Transient.
    OnlyLeft,
    /// Has only a right child. Transient.
    OnlyRight,
    /// Has neither entity nor children. Malformed.
    Empty,
    /// Has both an entity and children. Malformed.
    Conflicted,
}

/// The shape of a node together with the handles it holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NodeKind {
    Leaf(EntityID),
    Internal { left: NodeID, right: NodeID },
    OnlyLeft(NodeID),
    OnlyRight(NodeID),
    Empty,
    Conflicted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug, Default)]
struct NodeStorage {
    slots: Vec<NodeSlot>,
    free_indices: Vec<u32>,
    n_live: usize,
}

#[derive(Clone, Debug)]
struct NodeSlot {
    generation: u32,
    node: Option<Node>,
}

impl BoundingVolumeHierarchy {
    /// Creates a new hierarchy with no nodes.
    pub fn new() -> Self {
        Self {
            nodes: NodeStorage::new(),
            root: None,
        }
    }

    /// Builds a hierarchy over the given entities by repeatedly merging the
    /// two closest remaining nodes until a single root remains. Each entity's
    /// back-reference is set to its new leaf.
    ///
    /// The build performs `O(n³)` work and should only be done when a scene
    /// is loaded or explicitly rebuilt.
    ///
    /// # Errors
    /// Returns an error if:
    /// - No entity IDs are given ([`BVHError::EmptyScene`]).
    /// - Any of the entities does not exist or lacks a collider.
    /// - Node storage could not be allocated.
    ///
    /// On error, the back-references of the given entities are cleared.
    pub fn build<E>(entities: &mut E, entity_ids: &[EntityID]) -> Result<Self, BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let mut bvh = Self::new();
        match naive_bottom_up::build(&mut bvh, entities, entity_ids) {
            Ok(root) => {
                bvh.root = Some(root);
                Ok(bvh)
            }
            Err(err) => {
                for &entity in entity_ids {
                    entities.set_bounding_node(entity, None);
                }
                Err(err)
            }
        }
    }

    /// Returns the ID of the root node, or [`None`] if the hierarchy is empty.
    pub fn root(&self) -> Option<NodeID> {
        self.root
    }

    /// Whether the hierarchy has no nodes.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the bounding box of the root node, or [`None`] if the
    /// hierarchy is empty.
    pub fn root_bounding_volume(&self) -> Option<&AxisAlignedBox> {
        self.root
            .and_then(|root| self.nodes.get(root))
            .map(Node::aabb)
    }

    /// Returns the node with the given ID, or [`None`] if it has been
    /// released.
    pub fn get_node(&self, id: NodeID) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns the total number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of live leaf nodes.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|(_, node)| node.is_leaf()).count()
    }

    /// Returns the number of edges on the longest path from the root to a
    /// leaf, or [`None`] if the hierarchy is empty.
    pub fn depth(&self) -> Option<usize> {
        let root = self.root?;
        let mut max_depth = 0;
        let mut stack = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(node) = self.nodes.get(id) {
                for child in node.children() {
                    stack.push((child, depth + 1));
                }
            }
        }
        Some(max_depth)
    }

    /// Removes all nodes. The back-references held by entities are not
    /// touched.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    fn node(&self, id: NodeID) -> Result<&Node, BVHError> {
        self.nodes.get(id).ok_or(BVHError::NullNode(id))
    }

    fn node_mut(&mut self, id: NodeID) -> Result<&mut Node, BVHError> {
        self.nodes.get_mut(id).ok_or(BVHError::NullNode(id))
    }

    fn malformed(&self, id: NodeID, shape: NodeShape) -> BVHError {
        g10_log::error!("Bounding volume hierarchy node {id} is malformed (shape {shape:?})");
        BVHError::MalformedNode { node: id, shape }
    }

    /// Creates a leaf for the given entity with a bound computed from the
    /// entity's collider and transform, and points the entity's
    /// back-reference at it. The leaf is not attached to any parent.
    fn create_leaf<E>(&mut self, entities: &mut E, entity: EntityID) -> Result<NodeID, BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let aabb = compute_entity_aabb(entities, entity)?;
        let leaf = self.nodes.insert(Node::leaf(aabb, entity))?;
        entities.set_bounding_node(entity, Some(leaf));
        Ok(leaf)
    }

    /// Makes `new_child` take the place of `old_child` under `parent`, or as
    /// the root if `parent` is [`None`].
    fn redirect_child(
        &mut self,
        parent: Option<NodeID>,
        old_child: NodeID,
        new_child: NodeID,
    ) -> Result<(), BVHError> {
        let Some(parent) = parent else {
            self.root = Some(new_child);
            return Ok(());
        };
        let node = self.node_mut(parent)?;
        if node.left == Some(old_child) {
            node.left = Some(new_child);
        } else if node.right == Some(old_child) {
            node.right = Some(new_child);
        } else {
            return Err(BVHError::InvariantViolation {
                node: old_child,
                violation: "parent does not refer to node as a child",
            });
        }
        Ok(())
    }

    fn attach_child(&mut self, parent: NodeID, child: NodeID, side: Side) -> Result<(), BVHError> {
        let node = self.node_mut(parent)?;
        match side {
            Side::Left => node.left = Some(child),
            Side::Right => node.right = Some(child),
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }
}

/// Computes the world space bound of the given entity's collider.
fn compute_entity_aabb<E>(entities: &E, entity: EntityID) -> Result<AxisAlignedBox, BVHError>
where
    E: BoundedEntities + ?Sized,
{
    let local_box = entities
        .local_collider_box(entity)
        .ok_or(BVHError::NullEntity(entity))?;
    let model_matrix = entities
        .model_matrix(entity)
        .ok_or(BVHError::NullEntity(entity))?;
    Ok(local_box.aabb_of_oriented_extents(&model_matrix))
}

impl NodeID {
    /// Returns the arena slot index of the node.
    pub fn idx(&self) -> usize {
        self.idx as usize
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.idx, self.generation)
    }
}

impl Node {
    fn leaf(aabb: AxisAlignedBox, entity: EntityID) -> Self {
        Self {
            aabb,
            entity: Some(entity),
            left: None,
            right: None,
            parent: None,
        }
    }

    fn internal(aabb: AxisAlignedBox, left: NodeID, right: NodeID) -> Self {
        Self {
            aabb,
            entity: None,
            left: Some(left),
            right: Some(right),
            parent: None,
        }
    }

    /// Returns the bounding box of the node.
    pub fn aabb(&self) -> &AxisAlignedBox {
        &self.aabb
    }

    /// Returns the entity bounded by the node if it is a leaf.
    pub fn entity(&self) -> Option<EntityID> {
        self.entity
    }

    /// Returns the left child of the node.
    pub fn left(&self) -> Option<NodeID> {
        self.left
    }

    /// Returns the right child of the node.
    pub fn right(&self) -> Option<NodeID> {
        self.right
    }

    /// Returns the parent of the node, which is [`None`] for the root.
    pub fn parent(&self) -> Option<NodeID> {
        self.parent
    }

    /// Whether the node bounds an entity and has no children.
    pub fn is_leaf(&self) -> bool {
        self.shape() == NodeShape::Leaf
    }

    /// Returns the structural shape of the node.
    pub fn shape(&self) -> NodeShape {
        match self.kind() {
            NodeKind::Leaf(_) => NodeShape::Leaf,
            NodeKind::Internal { .. } => NodeShape::Internal,
            NodeKind::OnlyLeft(_) => NodeShape::OnlyLeft,
            NodeKind::OnlyRight(_) => NodeShape::OnlyRight,
            NodeKind::Empty => NodeShape::Empty,
            NodeKind::Conflicted => NodeShape::Conflicted,
        }
    }

    fn kind(&self) -> NodeKind {
        match (self.entity, self.left, self.right) {
            (Some(entity), None, None) => NodeKind::Leaf(entity),
            (None, Some(left), Some(right)) => NodeKind::Internal { left, right },
            (None, Some(left), None) => NodeKind::OnlyLeft(left),
            (None, None, Some(right)) => NodeKind::OnlyRight(right),
            (None, None, None) => NodeKind::Empty,
            (Some(_), _, _) => NodeKind::Conflicted,
        }
    }

    /// Iterates over the children that are present, left first.
    fn children(&self) -> impl Iterator<Item = NodeID> + use<> {
        [self.left, self.right].into_iter().flatten()
    }
}

impl NodeStorage {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_indices: Vec::new(),
            n_live: 0,
        }
    }

    fn len(&self) -> usize {
        self.n_live
    }

    /// Makes sure at least `additional` more nodes can be inserted without
    /// reallocating.
    fn reserve(&mut self, additional: usize) -> Result<(), BVHError> {
        let n_new_slots = additional.saturating_sub(self.free_indices.len());
        self.slots
            .try_reserve(n_new_slots)
            .map_err(|_err| BVHError::Allocation {
                requested: additional,
            })
    }

    fn insert(&mut self, node: Node) -> Result<NodeID, BVHError> {
        if let Some(idx) = self.free_indices.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.node = Some(node);
            self.n_live += 1;
            return Ok(NodeID {
                idx,
                generation: slot.generation,
            });
        }

        let idx = u32::try_from(self.slots.len()).map_err(|_err| BVHError::Allocation {
            requested: self.slots.len() + 1,
        })?;
        self.reserve(1)?;
        self.slots.push(NodeSlot {
            generation: 0,
            node: Some(node),
        });
        self.n_live += 1;
        Ok(NodeID { idx, generation: 0 })
    }

    fn get(&self, id: NodeID) -> Option<&Node> {
        self.slots
            .get(id.idx())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeID) -> Option<&mut Node> {
        self.slots
            .get_mut(id.idx())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Removes and returns the node with the given ID. The slot is reused by
    /// later insertions under a new generation.
    fn remove(&mut self, id: NodeID) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(id.idx())
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(id.idx);
        self.n_live -= 1;
        Some(node)
    }

    fn iter(&self) -> impl Iterator<Item = (NodeID, &Node)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeID {
                        idx: idx as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free_indices.clear();
        self.n_live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_volume::fixtures::EntityTable;
    use nalgebra::point;

    #[test]
    fn new_hierarchy_is_empty() {
        let bvh = BoundingVolumeHierarchy::new();
        assert!(bvh.is_empty());
        assert_eq!(bvh.node_count(), 0);
        assert_eq!(bvh.depth(), None);
        assert!(bvh.root_bounding_volume().is_none());
    }

    #[test]
    fn released_node_handle_is_rejected_after_slot_reuse() {
        let mut storage = NodeStorage::new();
        let aabb = AxisAlignedBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);

        let first = storage
            .insert(Node::leaf(aabb.clone(), EntityID::from_u64(0)))
            .unwrap();
        assert!(storage.remove(first).is_some());

        let second = storage
            .insert(Node::leaf(aabb, EntityID::from_u64(1)))
            .unwrap();
        assert_eq!(first.idx(), second.idx());
        assert!(storage.get(first).is_none());
        assert_eq!(
            storage.get(second).and_then(Node::entity),
            Some(EntityID::from_u64(1))
        );
        assert!(storage.remove(first).is_none());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn node_shapes_are_classified_from_fields() {
        let aabb = AxisAlignedBox::empty();
        let a = NodeID {
            idx: 0,
            generation: 0,
        };
        let b = NodeID {
            idx: 1,
            generation: 0,
        };
        let mut node = Node::internal(aabb, a, b);
        assert_eq!(node.shape(), NodeShape::Internal);
        node.right = None;
        assert_eq!(node.shape(), NodeShape::OnlyLeft);
        node.left = None;
        assert_eq!(node.shape(), NodeShape::Empty);
        node.entity = Some(EntityID::from_u64(3));
        assert_eq!(node.shape(), NodeShape::Leaf);
        node.right = Some(b);
        assert_eq!(node.shape(), NodeShape::Conflicted);
    }

    #[test]
    fn failed_build_clears_back_references() {
        let mut entities = EntityTable::new();
        let a = entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]);
        let no_collider = entities.add_without_collider("marker");

        let err = BoundingVolumeHierarchy::build(&mut entities, &[a, no_collider]).unwrap_err();
        assert_eq!(err, BVHError::NullEntity(no_collider));
        assert_eq!(entities.bounding_node(a), None);
    }

    #[test]
    fn building_with_repeated_entity_fails_and_clears_back_references() {
        let mut entities = EntityTable::new();
        let a = entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]);
        let b = entities.add_unit_cube_at("b", point![3.0, 0.0, 0.0]);

        let err = BoundingVolumeHierarchy::build(&mut entities, &[a, b, a]).unwrap_err();
        assert!(matches!(err, BVHError::EntityAlreadyBounded { entity, .. } if entity == a));
        assert_eq!(entities.bounding_node(a), None);
        assert_eq!(entities.bounding_node(b), None);

        let bvh = BoundingVolumeHierarchy::build(&mut entities, &[a, b]).unwrap();
        assert_eq!(bvh.leaf_count(), 2);
        assert!(bvh.validate(&entities).is_ok());
    }

    #[test]
    fn depth_of_three_entity_chain_is_two() {
        let mut entities = EntityTable::new();
        let ids = [
            entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]),
            entities.add_unit_cube_at("b", point![10.0, 0.0, 0.0]),
            entities.add_unit_cube_at("c", point![10.5, 0.0, 0.0]),
        ];
        let bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();
        assert_eq!(bvh.depth(), Some(2));
        assert_eq!(bvh.leaf_count(), 3);
    }
}
