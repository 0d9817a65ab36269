//! Insertion of single entities into an existing hierarchy.

use crate::bounding_volume::{
    BVHError, BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, Node, NodeID, NodeKind, Side},
};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;

impl BoundingVolumeHierarchy {
    /// Inserts a new leaf for the given entity, sets the entity's
    /// back-reference to it and refits the ancestors of the leaf.
    ///
    /// The leaf is placed by descending from the root. At an internal node,
    /// the descent continues into the left child if the separation distance
    /// from the left child to the new leaf exceeds that from the right
    /// child, and into the right child otherwise. When a leaf is reached, it
    /// is split into a new internal node holding the old leaf on the left
    /// and the new leaf on the right.
    ///
    /// Returns the node bounding the entity after insertion.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The entity does not exist or has no collider
    ///   ([`BVHError::NullEntity`]).
    /// - The entity is already bounded by a leaf in this hierarchy
    ///   ([`BVHError::EntityAlreadyBounded`]).
    /// - The descent encounters a malformed node.
    ///
    /// If the descent fails, the hierarchy is left as it was and the
    /// entity's back-reference is cleared. An error while refitting the
    /// ancestors of the new leaf leaves the leaf linked into the tree.
    pub fn insert_entity<E>(&mut self, entities: &mut E, entity: EntityID) -> Result<NodeID, BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        if entities.local_collider_box(entity).is_none() {
            return Err(BVHError::NullEntity(entity));
        }
        if let Ok(node) = self.bounding_leaf(entities, entity) {
            return Err(BVHError::EntityAlreadyBounded { entity, node });
        }

        let leaf = self.create_leaf(entities, entity)?;

        if let Err(err) = self.insert(leaf) {
            self.nodes.remove(leaf);
            entities.set_bounding_node(entity, None);
            return Err(err);
        }

        self.refit_ancestors(entities, leaf)?;

        entities
            .bounding_node(entity)
            .ok_or(BVHError::NullEntity(entity))
    }

    /// Links the given detached leaf into the tree without refitting any
    /// bounds.
    fn insert(&mut self, leaf: NodeID) -> Result<(), BVHError> {
        let Some(mut current) = self.root else {
            self.root = Some(leaf);
            return Ok(());
        };

        let new_aabb = self.node(leaf)?.aabb().clone();

        loop {
            match self.node(current)?.kind() {
                NodeKind::Leaf(_) => {
                    return self.split_leaf(current, leaf);
                }
                NodeKind::Internal { left, right } => {
                    let left_dist = self.node(left)?.aabb().separation_distance(&new_aabb);
                    let right_dist = self.node(right)?.aabb().separation_distance(&new_aabb);
                    current = if left_dist > right_dist { left } else { right };
                }
                NodeKind::OnlyLeft(left) => {
                    if self.node(left)?.aabb().intersects(&new_aabb) {
                        current = left;
                    } else {
                        return self.attach_child(current, leaf, Side::Right);
                    }
                }
                NodeKind::OnlyRight(right) => {
                    if self.node(right)?.aabb().intersects(&new_aabb) {
                        current = right;
                    } else {
                        return self.attach_child(current, leaf, Side::Left);
                    }
                }
                NodeKind::Empty => {
                    return self.attach_child(current, leaf, Side::Left);
                }
                NodeKind::Conflicted => {
                    return Err(self.malformed(current, self.node(current)?.shape()));
                }
            }
        }
    }

    /// Replaces `existing` in the tree with a new internal node that has
    /// `existing` as its left child and `new` as its right child.
    fn split_leaf(&mut self, existing: NodeID, new: NodeID) -> Result<(), BVHError> {
        let existing_node = self.node(existing)?;
        let parent = existing_node.parent;
        let aabb = AxisAlignedBox::aabb_from_pair(existing_node.aabb(), self.node(new)?.aabb());

        let mut internal_node = Node::internal(aabb, existing, new);
        internal_node.parent = parent;
        let internal = self.nodes.insert(internal_node)?;

        self.redirect_child(parent, existing, internal)?;
        self.node_mut(existing)?.parent = Some(internal);
        self.node_mut(new)?.parent = Some(internal);
        Ok(())
    }
}
