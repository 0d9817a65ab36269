//! Structural validation of a hierarchy.

use crate::bounding_volume::{
    BVHError, BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, NodeID, NodeKind},
};
use g10_geometry::AxisAlignedBox;
use std::collections::HashSet;

impl BoundingVolumeHierarchy {
    /// Checks that the hierarchy is well-formed:
    ///
    /// - Every node reachable from the root is either a leaf with an entity
    ///   or an internal node with two children.
    /// - Every child refers to its parent, and the root has no parent.
    /// - Every internal bound equals the union of its children's bounds.
    /// - Every leaf's entity refers back to that leaf.
    /// - Every live node is reachable from the root exactly once.
    ///
    /// # Errors
    /// Returns an error describing the first violation found.
    pub fn validate<E>(&self, entities: &E) -> Result<(), BVHError>
    where
        E: BoundedEntities + ?Sized,
    {
        let Some(root) = self.root else {
            return match self.nodes.iter().next() {
                Some((id, _)) => Err(BVHError::InvariantViolation {
                    node: id,
                    violation: "empty hierarchy holds live nodes",
                }),
                None => Ok(()),
            };
        };

        if self.node(root)?.parent.is_some() {
            return Err(BVHError::InvariantViolation {
                node: root,
                violation: "root has a parent",
            });
        }

        let mut visited = HashSet::with_capacity(self.nodes.len());
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return Err(BVHError::InvariantViolation {
                    node: id,
                    violation: "node is reachable more than once",
                });
            }
            let node = self.node(id)?;

            match node.kind() {
                NodeKind::Leaf(entity) => {
                    if entities.bounding_node(entity) != Some(id) {
                        return Err(BVHError::DanglingBackReference { entity, node: id });
                    }
                }
                NodeKind::Internal { left, right } => {
                    for child in [left, right] {
                        if self.node(child)?.parent != Some(id) {
                            return Err(BVHError::InvariantViolation {
                                node: child,
                                violation: "child does not refer to node as parent",
                            });
                        }
                    }
                    let union = AxisAlignedBox::aabb_from_pair(
                        self.node(left)?.aabb(),
                        self.node(right)?.aabb(),
                    );
                    if node.aabb() != &union {
                        return Err(BVHError::InvariantViolation {
                            node: id,
                            violation: "bound is not the union of the child bounds",
                        });
                    }
                    stack.push(right);
                    stack.push(left);
                }
                NodeKind::OnlyLeft(_)
                | NodeKind::OnlyRight(_)
                | NodeKind::Empty
                | NodeKind::Conflicted => {
                    return Err(BVHError::MalformedNode {
                        node: id,
                        shape: node.shape(),
                    });
                }
            }
        }

        if let Some(unreachable) = self.unreachable_node(&visited) {
            return Err(BVHError::InvariantViolation {
                node: unreachable,
                violation: "node is not reachable from the root",
            });
        }
        Ok(())
    }

    fn unreachable_node(&self, visited: &HashSet<NodeID>) -> Option<NodeID> {
        self.nodes
            .iter()
            .map(|(id, _)| id)
            .find(|id| !visited.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::bounding_volume::{
        BVHError, BoundedEntities, fixtures::EntityTable, hierarchy::BoundingVolumeHierarchy,
        hierarchy::NodeShape,
    };
    use g10_geometry::AxisAlignedBox;
    use nalgebra::{point, vector};

    fn three_entity_hierarchy() -> (EntityTable, BoundingVolumeHierarchy) {
        let mut entities = EntityTable::new();
        let ids = [
            entities.add_unit_cube_at("a", point![0.0, 0.0, 0.0]),
            entities.add_unit_cube_at("b", point![10.0, 0.0, 0.0]),
            entities.add_unit_cube_at("c", point![10.5, 0.0, 0.0]),
        ];
        let bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();
        (entities, bvh)
    }

    #[test]
    fn validating_empty_hierarchy_succeeds() {
        let entities = EntityTable::new();
        assert!(BoundingVolumeHierarchy::new().validate(&entities).is_ok());
    }

    #[test]
    fn validating_built_hierarchy_succeeds() {
        let (entities, bvh) = three_entity_hierarchy();
        assert!(bvh.validate(&entities).is_ok());
    }

    #[test]
    fn validating_detects_stale_internal_bound() {
        let (mut entities, mut bvh) = three_entity_hierarchy();
        let moved = g10_id::EntityID::from_u64(0);
        entities.set_translation(moved, vector![-4.0, 0.0, 0.0]);
        let leaf = entities.bounding_node(moved).unwrap();
        bvh.resize(&mut entities, leaf).unwrap();

        assert!(matches!(
            bvh.validate(&entities),
            Err(BVHError::InvariantViolation { node, .. }) if Some(node) == bvh.root()
        ));

        bvh.refit_ancestors(&mut entities, leaf).unwrap();
        assert!(bvh.validate(&entities).is_ok());
    }

    #[test]
    fn validating_detects_wrong_back_reference() {
        let (mut entities, bvh) = three_entity_hierarchy();
        let a = g10_id::EntityID::from_u64(0);
        let leaf = entities.bounding_node(a).unwrap();
        entities.set_bounding_node(a, bvh.root());

        assert_eq!(
            bvh.validate(&entities),
            Err(BVHError::DanglingBackReference {
                entity: a,
                node: leaf
            })
        );
    }

    #[test]
    fn validating_detects_one_child_node() {
        let (entities, mut bvh) = three_entity_hierarchy();
        let root = bvh.root().unwrap();
        let right = bvh.get_node(root).unwrap().right().unwrap();
        bvh.node_mut(root).unwrap().right = None;

        assert_eq!(
            bvh.validate(&entities),
            Err(BVHError::MalformedNode {
                node: root,
                shape: NodeShape::OnlyLeft
            })
        );
        assert!(bvh.get_node(right).is_some());
    }

    #[test]
    fn validating_detects_unreachable_node() {
        let (entities, mut bvh) = three_entity_hierarchy();
        let orphan = bvh
            .nodes
            .insert(crate::bounding_volume::hierarchy::Node::leaf(
                AxisAlignedBox::empty(),
                g10_id::EntityID::from_u64(7),
            ))
            .unwrap();

        assert_eq!(
            bvh.validate(&entities),
            Err(BVHError::InvariantViolation {
                node: orphan,
                violation: "node is not reachable from the root"
            })
        );
    }
}
