//! Removal of entities from a hierarchy.

use crate::bounding_volume::{
    BVHError, BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, NodeID},
};
use g10_id::EntityID;

impl BoundingVolumeHierarchy {
    /// Removes the leaf bounding the given entity and clears the entity's
    /// back-reference.
    ///
    /// The parent of the removed leaf takes over the content of the leaf's
    /// sibling, and the ancestors of the parent are refitted. Removing the
    /// last entity leaves the hierarchy empty.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The entity has no collider or back-reference
    ///   ([`BVHError::NullEntity`]).
    /// - The back-reference does not point at a live leaf bounding the
    ///   entity ([`BVHError::DanglingBackReference`]).
    pub fn remove_entity<E>(&mut self, entities: &mut E, entity: EntityID) -> Result<(), BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let leaf = self.bounding_leaf(entities, entity)?;
        let parent = self.node(leaf)?.parent;

        let Some(parent) = parent else {
            self.nodes.remove(leaf);
            self.root = None;
            entities.set_bounding_node(entity, None);
            return Ok(());
        };

        self.detach_child(parent, leaf)?;
        self.nodes.remove(leaf);
        entities.set_bounding_node(entity, None);

        self.resize(entities, parent)?;
        self.refit_ancestors(entities, parent)
    }

    fn detach_child(&mut self, parent: NodeID, child: NodeID) -> Result<(), BVHError> {
        let node = self.node_mut(parent)?;
        if node.left == Some(child) {
            node.left = None;
        } else if node.right == Some(child) {
            node.right = None;
        } else {
            return Err(BVHError::InvariantViolation {
                node: child,
                violation: "parent does not refer to node as a child",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::bounding_volume::{
        BVHError, BoundedEntities, fixtures::EntityTable, hierarchy::BoundingVolumeHierarchy,
        hierarchy::NodeShape,
    };
    use approx::assert_abs_diff_eq;
    use g10_geometry::AxisAlignedBox;
    use nalgebra::{Point3, point};
    use proptest::prelude::*;

    #[test]
    fn removing_only_entity_empties_hierarchy() {
        let mut entities = EntityTable::new();
        let a = entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]);
        let mut bvh = BoundingVolumeHierarchy::build(&mut entities, &[a]).unwrap();

        bvh.remove_entity(&mut entities, a).unwrap();

        assert!(bvh.is_empty());
        assert_eq!(bvh.node_count(), 0);
        assert_eq!(entities.bounding_node(a), None);
        assert!(bvh.collect_entities().is_empty());
    }

    #[test]
    fn removing_one_of_two_entities_turns_root_into_remaining_leaf() {
        let mut entities = EntityTable::new();
        let a = entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]);
        let b = entities.add_unit_cube_at("b", point![3.0, 0.0, 0.0]);
        let mut bvh = BoundingVolumeHierarchy::build(&mut entities, &[a, b]).unwrap();
        let root = bvh.root().unwrap();

        bvh.remove_entity(&mut entities, a).unwrap();

        assert_eq!(bvh.root(), Some(root));
        let node = bvh.get_node(root).unwrap();
        assert_eq!(node.shape(), NodeShape::Leaf);
        assert_eq!(node.entity(), Some(b));
        assert_eq!(entities.bounding_node(b), Some(root));
        assert_abs_diff_eq!(
            node.aabb(),
            &AxisAlignedBox::new(point![2.5, -0.5, -0.5], point![3.5, 0.5, 0.5])
        );
        assert_eq!(bvh.node_count(), 1);
    }

    #[test]
    fn removing_deep_leaf_collapses_parent_and_shrinks_root() {
        let mut entities = EntityTable::new();
        let ids = [
            entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]),
            entities.add_unit_cube_at("b", point![10.0, 0.0, 0.0]),
            entities.add_unit_cube_at("c", point![10.5, 0.0, 0.0]),
        ];
        let mut bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();
        let near_pair = bvh
            .get_node(bvh.root().unwrap())
            .unwrap()
            .right()
            .unwrap();

        bvh.remove_entity(&mut entities, ids[2]).unwrap();

        assert_eq!(entities.bounding_node(ids[1]), Some(near_pair));
        assert_abs_diff_eq!(
            bvh.root_bounding_volume().unwrap(),
            &AxisAlignedBox::new(point![-0.5, -0.5, -0.5], point![10.5, 0.5, 0.5])
        );
        assert_eq!(bvh.collect_entities(), vec![ids[0], ids[1]]);
        assert!(bvh.validate(&entities).is_ok());
    }

    #[test]
    fn removing_entity_not_in_hierarchy_fails() {
        let mut entities = EntityTable::new();
        let a = entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]);
        let b = entities.add_unit_cube_at("b", point![3.0, 0.0, 0.0]);
        let mut bvh = BoundingVolumeHierarchy::build(&mut entities, &[a]).unwrap();

        let err = bvh.remove_entity(&mut entities, b).unwrap_err();
        assert_eq!(err, BVHError::NullEntity(b));
        assert_eq!(bvh.leaf_count(), 1);
    }

    proptest! {
        #[test]
        fn removing_entities_keeps_hierarchy_valid(
            coords in prop::collection::vec(
                (-50.0_f32..50.0, -50.0_f32..50.0, -50.0_f32..50.0),
                1..20,
            ),
            removal_mask in any::<u32>(),
        ) {
            let mut entities = EntityTable::new();
            for (idx, &(x, y, z)) in coords.iter().enumerate() {
                entities.add_unit_cube_at(&idx.to_string(), Point3::new(x, y, z));
            }
            let ids = entities.collidable_ids();
            let mut bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();

            let mut kept = Vec::new();
            for (idx, &id) in ids.iter().enumerate() {
                if removal_mask & (1 << idx) != 0 {
                    bvh.remove_entity(&mut entities, id).unwrap();
                    prop_assert!(bvh.validate(&entities).is_ok());
                } else {
                    kept.push(id);
                }
            }

            let mut collected = bvh.collect_entities();
            collected.sort();
            prop_assert_eq!(&collected, &kept);
            prop_assert_eq!(bvh.leaf_count(), kept.len());
            if !kept.is_empty() {
                prop_assert_eq!(bvh.node_count(), 2 * kept.len() - 1);
            }
        }
    }
}
