//! Queries on a bounding volume hierarchy.

use crate::bounding_volume::{
    BVHError,
    hierarchy::{BoundingVolumeHierarchy, NodeID, NodeKind},
};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;

impl BoundingVolumeHierarchy {
    /// Returns the parent of the given node, or [`None`] for the root.
    ///
    /// # Errors
    /// Returns an error if `node` is not a live node.
    pub fn parent(&self, node: NodeID) -> Result<Option<NodeID>, BVHError> {
        Ok(self.node(node)?.parent)
    }

    /// Searches from the root for the parent of the given node, only
    /// descending into nodes whose bound intersects the bound of `target`.
    ///
    /// Unlike [`Self::parent`], this relies on the bounds being up to date,
    /// and may fail to find the parent of a node whose ancestors have not
    /// been refitted.
    ///
    /// # Errors
    /// Returns an error if `target` is not a live node.
    pub fn find_parent(&self, target: NodeID) -> Result<Option<NodeID>, BVHError> {
        let target_aabb = self.node(target)?.aabb();

        let Some(root) = self.root else {
            return Ok(None);
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if !node.aabb().intersects(target_aabb) {
                continue;
            }
            if node.left == Some(target) || node.right == Some(target) {
                return Ok(Some(id));
            }
            stack.extend(node.children());
        }
        Ok(None)
    }

    /// Returns the entities of all leaves, ordered from left to right.
    pub fn collect_entities(&self) -> Vec<EntityID> {
        let mut entities = Vec::with_capacity(self.nodes.len().div_ceil(2));
        self.for_each_entity(|entity| entities.push(entity));
        entities
    }

    /// Calls the given closure with the entity of each leaf, ordered from
    /// left to right.
    pub fn for_each_entity(&self, mut f: impl FnMut(EntityID)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if let Some(entity) = node.entity {
                f(entity);
            }
            stack.extend(node.right);
            stack.extend(node.left);
        }
    }

    /// Calls the given closure with each entity whose leaf bound intersects
    /// the given box.
    pub fn for_each_entity_in_axis_aligned_box(
        &self,
        axis_aligned_box: &AxisAlignedBox,
        mut f: impl FnMut(EntityID),
    ) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.aabb().intersects(axis_aligned_box) {
                continue;
            }
            if let Some(entity) = node.entity {
                f(entity);
            } else {
                stack.extend(node.children());
            }
        }
    }

    /// Like [`Self::for_each_entity_in_axis_aligned_box`], but tests every
    /// leaf instead of traversing the tree.
    pub fn for_each_entity_in_axis_aligned_box_brute_force(
        &self,
        axis_aligned_box: &AxisAlignedBox,
        mut f: impl FnMut(EntityID),
    ) {
        for (_, node) in self.nodes.iter() {
            if let NodeKind::Leaf(entity) = node.kind() {
                if node.aabb().intersects(axis_aligned_box) {
                    f(entity);
                }
            }
        }
    }

    /// Calls the given closure once for each unordered pair of distinct
    /// entities whose leaf bounds intersect. The entity with the smaller ID
    /// is passed first.
    pub fn for_each_intersecting_entity_pair(&self, mut f: impl FnMut(EntityID, EntityID)) {
        let Some(root) = self.root else {
            return;
        };

        let mut stack = vec![(root, root)];

        while let Some((a, b)) = stack.pop() {
            let (Some(node_a), Some(node_b)) = (self.nodes.get(a), self.nodes.get(b)) else {
                continue;
            };

            if a == b {
                if let NodeKind::Internal { left, right } = node_a.kind() {
                    stack.push((left, right));
                    stack.push((right, right));
                    stack.push((left, left));
                }
                continue;
            }

            if !node_a.aabb().intersects(node_b.aabb()) {
                continue;
            }

            match (node_a.kind(), node_b.kind()) {
                (NodeKind::Leaf(entity_a), NodeKind::Leaf(entity_b)) => {
                    f(entity_a.min(entity_b), entity_a.max(entity_b));
                }
                (NodeKind::Leaf(_), NodeKind::Internal { left, right }) => {
                    stack.push((a, right));
                    stack.push((a, left));
                }
                (NodeKind::Internal { left, right }, _) => {
                    stack.push((right, b));
                    stack.push((left, b));
                }
                _ => {}
            }
        }
    }

    /// Like [`Self::for_each_intersecting_entity_pair`], but tests every
    /// pair of leaves instead of traversing the tree.
    pub fn for_each_intersecting_entity_pair_brute_force(
        &self,
        mut f: impl FnMut(EntityID, EntityID),
    ) {
        let leaves: Vec<_> = self
            .nodes
            .iter()
            .filter_map(|(_, node)| node.entity.map(|entity| (entity, node.aabb())))
            .collect();

        for (i, (entity_i, aabb_i)) in leaves.iter().enumerate() {
            for (entity_j, aabb_j) in &leaves[i + 1..] {
                if aabb_i.intersects(aabb_j) {
                    f(*entity_i.min(entity_j), *entity_i.max(entity_j));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bounding_volume::{fixtures::EntityTable, hierarchy::BoundingVolumeHierarchy};
    use g10_geometry::AxisAlignedBox;
    use g10_id::EntityID;
    use nalgebra::{Point3, point, vector};
    use proptest::prelude::*;

    fn build_from_positions(positions: &[Point3<f32>]) -> (EntityTable, BoundingVolumeHierarchy) {
        let mut entities = EntityTable::new();
        for (idx, position) in positions.iter().enumerate() {
            entities.add_unit_cube_at(&idx.to_string(), *position);
        }
        let ids = entities.collidable_ids();
        let bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();
        (entities, bvh)
    }

    fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
        values.sort();
        values
    }

    #[test]
    fn collecting_entities_from_empty_hierarchy_gives_nothing() {
        assert!(BoundingVolumeHierarchy::new().collect_entities().is_empty());
    }

    #[test]
    fn collecting_entities_follows_left_to_right_order() {
        let (_, bvh) = build_from_positions(&[
            point![0.0, 0.0, 0.0],
            point![10.0, 0.0, 0.0],
            point![10.5, 0.0, 0.0],
        ]);
        assert_eq!(
            bvh.collect_entities(),
            vec![
                EntityID::from_u64(0),
                EntityID::from_u64(1),
                EntityID::from_u64(2)
            ]
        );
    }

    #[test]
    fn finding_parent_by_search_agrees_with_parent_handles() {
        let (_, bvh) = build_from_positions(&[
            point![0.0, 0.0, 0.0],
            point![4.0, 1.0, 0.0],
            point![-3.0, 2.0, 5.0],
            point![7.0, -1.0, 2.0],
            point![7.5, -1.0, 2.0],
        ]);

        for (id, _) in bvh.nodes.iter() {
            assert_eq!(bvh.find_parent(id).unwrap(), bvh.parent(id).unwrap());
        }
    }

    #[test]
    fn finding_parent_of_root_gives_none() {
        let (_, bvh) = build_from_positions(&[point![0.0, 0.0, 0.0], point![2.0, 0.0, 0.0]]);
        let root = bvh.root().unwrap();
        assert_eq!(bvh.find_parent(root).unwrap(), None);
        assert_eq!(bvh.parent(root).unwrap(), None);
    }

    #[test]
    fn box_query_finds_only_overlapping_entities() {
        let (_, bvh) = build_from_positions(&[
            point![0.0, 0.0, 0.0],
            point![10.0, 0.0, 0.0],
            point![10.5, 0.0, 0.0],
        ]);
        let query = AxisAlignedBox::new(point![9.0, -1.0, -1.0], point![9.8, 1.0, 1.0]);

        let mut found = Vec::new();
        bvh.for_each_entity_in_axis_aligned_box(&query, |entity| found.push(entity));

        assert_eq!(found, vec![EntityID::from_u64(1)]);
    }

    #[test]
    fn pair_query_reports_touching_neighbors_once() {
        let (_, bvh) = build_from_positions(&[
            point![0.0, 0.0, 0.0],
            point![10.0, 0.0, 0.0],
            point![10.5, 0.0, 0.0],
        ]);

        let mut pairs = Vec::new();
        bvh.for_each_intersecting_entity_pair(|a, b| pairs.push((a, b)));

        assert_eq!(pairs, vec![(EntityID::from_u64(1), EntityID::from_u64(2))]);
    }

    #[test]
    fn queries_see_moved_entity_after_update() {
        let mut entities = EntityTable::new();
        let ids = [
            entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]),
            entities.add_unit_cube_at("b", point![10.0, 0.0, 0.0]),
        ];
        let mut bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();

        entities.set_translation(ids[1], vector![0.5, 0.0, 0.0]);
        bvh.update_entity(&mut entities, ids[1]).unwrap();

        let mut pairs = Vec::new();
        bvh.for_each_intersecting_entity_pair(|a, b| pairs.push((a, b)));
        assert_eq!(pairs, vec![(ids[0], ids[1])]);
    }

    prop_compose! {
        fn positions_strategy()(
            coords in prop::collection::vec(
                (-20.0_f32..20.0, -20.0_f32..20.0, -20.0_f32..20.0),
                1..40,
            )
        ) -> Vec<Point3<f32>> {
            coords.into_iter().map(|(x, y, z)| point![x, y, z]).collect()
        }
    }

    proptest! {
        #[test]
        fn box_query_matches_brute_force(
            positions in positions_strategy(),
            (x, y, z) in (-25.0_f32..25.0, -25.0_f32..25.0, -25.0_f32..25.0),
            half_extent in 0.0_f32..10.0,
        ) {
            let (_, bvh) = build_from_positions(&positions);
            let center = point![x, y, z];
            let extent = vector![half_extent, half_extent, half_extent];
            let query = AxisAlignedBox::new(center - extent, center + extent);

            let mut found = Vec::new();
            bvh.for_each_entity_in_axis_aligned_box(&query, |entity| found.push(entity));
            let mut found_brute_force = Vec::new();
            bvh.for_each_entity_in_axis_aligned_box_brute_force(&query, |entity| {
                found_brute_force.push(entity);
            });

            prop_assert_eq!(sorted(found), sorted(found_brute_force));
        }

        #[test]
        fn pair_query_matches_brute_force(positions in positions_strategy()) {
            let (_, bvh) = build_from_positions(&positions);

            let mut pairs = Vec::new();
            bvh.for_each_intersecting_entity_pair(|a, b| pairs.push((a, b)));
            let mut pairs_brute_force = Vec::new();
            bvh.for_each_intersecting_entity_pair_brute_force(|a, b| pairs_brute_force.push((a, b)));

            prop_assert_eq!(sorted(pairs), sorted(pairs_brute_force));
        }

        #[test]
        fn every_entity_is_collected_once_after_update(
            positions in positions_strategy(),
            moved_idx in any::<prop::sample::Index>(),
            (dx, dy, dz) in (-30.0_f32..30.0, -30.0_f32..30.0, -30.0_f32..30.0),
        ) {
            let (mut entities, mut bvh) = build_from_positions(&positions);
            let ids = entities.collidable_ids();
            let moved = ids[moved_idx.index(ids.len())];

            entities.set_translation(moved, vector![dx, dy, dz]);
            bvh.update_entity(&mut entities, moved).unwrap();

            let collected = bvh.collect_entities();
            prop_assert_eq!(collected.iter().filter(|&&id| id == moved).count(), 1);
            prop_assert_eq!(sorted(collected), ids);
            prop_assert!(bvh.validate(&entities).is_ok());
        }
    }
}
