//! Bounding volume hierarchy construction using a naive bottom-up method.

use crate::bounding_volume::{
    BVHError, BoundedEntities,
    hierarchy::{BoundingVolumeHierarchy, Node, NodeID},
};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;

/// Builds the nodes of the hierarchy over the given entities and returns the
/// root. The hierarchy is assumed to have no nodes beforehand.
pub(super) fn build<E>(
    bvh: &mut BoundingVolumeHierarchy,
    entities: &mut E,
    entity_ids: &[EntityID],
) -> Result<NodeID, BVHError>
where
    E: BoundedEntities + ?Sized,
{
    if entity_ids.is_empty() {
        return Err(BVHError::EmptyScene);
    }

    bvh.nodes.reserve(2 * entity_ids.len() - 1)?;

    let mut remaining_nodes = Vec::new();
    remaining_nodes
        .try_reserve_exact(entity_ids.len())
        .map_err(|_err| BVHError::Allocation {
            requested: entity_ids.len(),
        })?;

    for &entity in entity_ids {
        if let Ok(node) = bvh.bounding_leaf(entities, entity) {
            return Err(BVHError::EntityAlreadyBounded { entity, node });
        }
        remaining_nodes.push(bvh.create_leaf(entities, entity)?);
    }

    while remaining_nodes.len() > 1 {
        let (best_i, best_j) = find_closest_pair(bvh, &remaining_nodes)?;

        let left = remaining_nodes[best_i];
        let right = remaining_nodes[best_j];

        let combined_aabb =
            AxisAlignedBox::aabb_from_pair(bvh.node(left)?.aabb(), bvh.node(right)?.aabb());

        let combined = bvh.nodes.insert(Node::internal(combined_aabb, left, right))?;
        bvh.node_mut(left)?.parent = Some(combined);
        bvh.node_mut(right)?.parent = Some(combined);

        remaining_nodes[best_i] = combined;
        remaining_nodes.swap_remove(best_j);
    }

    Ok(remaining_nodes[0])
}

/// Finds the positions `(i, j)` with `i < j` of the two remaining nodes with
/// the smallest separation distance. Ties go to the pair encountered first.
fn find_closest_pair(
    bvh: &BoundingVolumeHierarchy,
    remaining_nodes: &[NodeID],
) -> Result<(usize, usize), BVHError> {
    let n_remaining = remaining_nodes.len();

    let mut smallest_dist = f32::INFINITY;
    let mut best_i = 0;
    let mut best_j = 1;

    for (i, &node_i) in remaining_nodes[..n_remaining - 1].iter().enumerate() {
        let aabb_i = bvh.node(node_i)?.aabb();

        for (j, &node_j) in remaining_nodes.iter().enumerate().skip(i + 1) {
            let aabb_j = bvh.node(node_j)?.aabb();

            let dist = aabb_i.separation_distance(aabb_j);

            if dist < smallest_dist {
                smallest_dist = dist;
                best_i = i;
                best_j = j;
            }
        }
    }

    Ok((best_i, best_j))
}
