//! Refitting of node bounds after entities have moved.

use crate::bounding_volume::{
    BVHError, BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, NodeID, NodeKind, compute_entity_aabb},
};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;

#[derive(Copy, Clone, Debug)]
enum Visit {
    Enter(NodeID),
    Exit(NodeID),
}

impl BoundingVolumeHierarchy {
    /// Recomputes the bounds of the subtree rooted at the given node.
    ///
    /// Leaves are refitted to the current transform of their entity, and
    /// internal nodes get the tight union of their children after both
    /// children have been resized. A node with a single child is collapsed
    /// into that child: it takes over the child's entity, children and
    /// bound, and the child is released. Collapsing is done one level at a
    /// time, so the collapsed node is not resized further.
    ///
    /// Ancestors of `node` are not updated. Use [`Self::refit_ancestors`]
    /// for that.
    ///
    /// # Errors
    /// Returns an error if:
    /// - `node` is not a live node ([`BVHError::NullNode`]).
    /// - A node in the subtree has neither an entity nor children, or has
    ///   both ([`BVHError::MalformedNode`]).
    /// - A leaf's entity has no collider or transform.
    pub fn resize<E>(&mut self, entities: &mut E, node: NodeID) -> Result<(), BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let mut stack = vec![Visit::Enter(node)];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => match self.node(id)?.kind() {
                    NodeKind::Leaf(entity) => {
                        let aabb = compute_entity_aabb(entities, entity)?;
                        self.node_mut(id)?.aabb = aabb;
                    }
                    NodeKind::Internal { left, right } => {
                        stack.push(Visit::Exit(id));
                        stack.push(Visit::Enter(right));
                        stack.push(Visit::Enter(left));
                    }
                    NodeKind::OnlyLeft(child) | NodeKind::OnlyRight(child) => {
                        self.collapse_into(entities, id, child)?;
                    }
                    NodeKind::Empty | NodeKind::Conflicted => {
                        return Err(self.malformed(id, self.node(id)?.shape()));
                    }
                },
                Visit::Exit(id) => self.fit_to_children(id)?,
            }
        }
        Ok(())
    }

    /// Walks from the parent of the given node up to the root, giving each
    /// internal ancestor the tight union of its children and collapsing any
    /// ancestor that has been left with a single child.
    ///
    /// # Errors
    /// Returns an error if `node` or any ancestor is not live, or if an
    /// ancestor is malformed.
    pub fn refit_ancestors<E>(&mut self, entities: &mut E, node: NodeID) -> Result<(), BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let mut current = self.node(node)?.parent;

        while let Some(id) = current {
            match self.node(id)?.kind() {
                NodeKind::Internal { .. } => self.fit_to_children(id)?,
                NodeKind::OnlyLeft(child) | NodeKind::OnlyRight(child) => {
                    self.collapse_into(entities, id, child)?;
                }
                NodeKind::Leaf(_) | NodeKind::Empty | NodeKind::Conflicted => {
                    return Err(self.malformed(id, self.node(id)?.shape()));
                }
            }
            current = self.node(id)?.parent;
        }
        Ok(())
    }

    /// Refits the leaf bounding the given entity to the entity's current
    /// transform, and refits every ancestor of the leaf.
    ///
    /// Returns the leaf node.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The entity has no collider or back-reference
    ///   ([`BVHError::NullEntity`]).
    /// - The back-reference does not point at a live leaf bounding the
    ///   entity ([`BVHError::DanglingBackReference`]).
    pub fn update_entity<E>(&mut self, entities: &mut E, entity: EntityID) -> Result<NodeID, BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let leaf = self.bounding_leaf(entities, entity)?;
        self.resize(entities, leaf)?;
        self.refit_ancestors(entities, leaf)?;
        Ok(leaf)
    }

    /// Returns the leaf the given entity's back-reference points at,
    /// verifying that the leaf actually bounds the entity.
    pub(super) fn bounding_leaf<E>(&self, entities: &E, entity: EntityID) -> Result<NodeID, BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        if entities.local_collider_box(entity).is_none() {
            return Err(BVHError::NullEntity(entity));
        }
        let leaf = entities
            .bounding_node(entity)
            .ok_or(BVHError::NullEntity(entity))?;

        match self.nodes.get(leaf).map(|node| node.kind()) {
            Some(NodeKind::Leaf(bounded)) if bounded == entity => Ok(leaf),
            _ => Err(BVHError::DanglingBackReference { entity, node: leaf }),
        }
    }

    fn fit_to_children(&mut self, id: NodeID) -> Result<(), BVHError> {
        let node = self.node(id)?;
        let (Some(left), Some(right)) = (node.left, node.right) else {
            return Err(self.malformed(id, node.shape()));
        };
        let aabb = AxisAlignedBox::aabb_from_pair(self.node(left)?.aabb(), self.node(right)?.aabb());
        self.node_mut(id)?.aabb = aabb;
        Ok(())
    }

    /// Moves the content of `child` into its parent `id` and releases
    /// `child`. The position of `id` in the tree is unchanged.
    fn collapse_into<E>(&mut self, entities: &mut E, id: NodeID, child: NodeID) -> Result<(), BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let child_node = self.nodes.remove(child).ok_or(BVHError::NullNode(child))?;

        let node = self.node_mut(id)?;
        node.aabb = child_node.aabb;
        node.entity = child_node.entity;
        node.left = child_node.left;
        node.right = child_node.right;

        if let Some(entity) = child_node.entity {
            entities.set_bounding_node(entity, Some(id));
        }
        for grandchild in [child_node.left, child_node.right].into_iter().flatten() {
            self.node_mut(grandchild)?.parent = Some(id);
        }

        g10_log::trace!("Collapsed bounding volume hierarchy node {child} into parent {id}");
        Ok(())
    }
}
