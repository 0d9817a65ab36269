//! Fuzz tests comparing hierarchy queries against brute force and checking
//! that the hierarchy stays well-formed under arbitrary updates.

use crate::bounding_volume::{fixtures::EntityTable, hierarchy::BoundingVolumeHierarchy};
use arbitrary::{Arbitrary, Result, Unstructured};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use nalgebra::{Point3, Vector3};
use std::{collections::HashSet, mem};

#[derive(Clone, Debug)]
pub struct ArbitraryAABB(AxisAlignedBox);

#[derive(Clone, Debug)]
pub struct ArbitraryPosition(Point3<f32>);

#[derive(Clone, Debug, Arbitrary)]
pub enum HierarchyOperation {
    Spawn(ArbitraryPosition),
    Move { index: u8, to: ArbitraryPosition },
    Despawn { index: u8 },
    Rebuild,
}

impl Arbitrary<'_> for ArbitraryAABB {
    fn arbitrary(u: &mut Unstructured<'_>) -> Result<Self> {
        let ArbitraryPosition(center) = ArbitraryPosition::arbitrary(u)?;

        let ex = arbitrary_norm_f32(u)?;
        let ey = arbitrary_norm_f32(u)?;
        let ez = arbitrary_norm_f32(u)?;
        let half_extents = Vector3::new(ex, ey, ez);

        Ok(Self(AxisAlignedBox::new(
            center - half_extents,
            center + half_extents,
        )))
    }

    fn size_hint(_depth: usize) -> (usize, Option<usize>) {
        let size = 6 * mem::size_of::<i32>();
        (size, Some(size))
    }
}

impl Arbitrary<'_> for ArbitraryPosition {
    fn arbitrary(u: &mut Unstructured<'_>) -> Result<Self> {
        let x = 2.0 * arbitrary_norm_f32(u)? - 1.0;
        let y = 2.0 * arbitrary_norm_f32(u)? - 1.0;
        let z = 2.0 * arbitrary_norm_f32(u)? - 1.0;
        Ok(Self(Point3::new(10.0 * x, 10.0 * y, 10.0 * z)))
    }

    fn size_hint(_depth: usize) -> (usize, Option<usize>) {
        let size = 3 * mem::size_of::<i32>();
        (size, Some(size))
    }
}

pub fn fuzz_test_single_aabb_intersection_query(
    (positions, test_aabb): (Vec<ArbitraryPosition>, ArbitraryAABB),
) {
    let mut entities = EntityTable::new();
    for (idx, position) in positions.iter().enumerate() {
        entities.add_unit_cube_at(&idx.to_string(), position.0);
    }
    let ids = entities.collidable_ids();
    if ids.is_empty() {
        return;
    }
    let bvh = BoundingVolumeHierarchy::build(&mut entities, &ids).unwrap();

    let mut intersected_ids = Vec::new();

    bvh.for_each_entity_in_axis_aligned_box(&test_aabb.0, |id| {
        intersected_ids.push(id);
    });

    let mut intersected_ids_brute_force = Vec::new();

    bvh.for_each_entity_in_axis_aligned_box_brute_force(&test_aabb.0, |id| {
        intersected_ids_brute_force.push(id);
    });

    assert_eq!(intersected_ids.len(), intersected_ids_brute_force.len());

    let intersected_ids: HashSet<EntityID> = HashSet::from_iter(intersected_ids);
    let intersected_ids_brute_force = HashSet::from_iter(intersected_ids_brute_force);

    assert_eq!(intersected_ids, intersected_ids_brute_force);
}

pub fn fuzz_test_hierarchy_operations(
    (positions, operations): (Vec<ArbitraryPosition>, Vec<HierarchyOperation>),
) {
    let mut entities = EntityTable::new();
    for (idx, position) in positions.iter().enumerate() {
        entities.add_unit_cube_at(&idx.to_string(), position.0);
    }
    let mut live = entities.collidable_ids();

    let mut bvh = if live.is_empty() {
        BoundingVolumeHierarchy::new()
    } else {
        BoundingVolumeHierarchy::build(&mut entities, &live).unwrap()
    };

    for operation in operations {
        match operation {
            HierarchyOperation::Spawn(position) => {
                let id = entities.add_unit_cube_at("spawned", position.0);
                bvh.insert_entity(&mut entities, id).unwrap();
                live.push(id);
            }
            HierarchyOperation::Move { index, to } => {
                if live.is_empty() {
                    continue;
                }
                let id = live[usize::from(index) % live.len()];
                entities.set_translation(id, to.0.coords);
                bvh.update_entity(&mut entities, id).unwrap();
            }
            HierarchyOperation::Despawn { index } => {
                if live.is_empty() {
                    continue;
                }
                let id = live.swap_remove(usize::from(index) % live.len());
                bvh.remove_entity(&mut entities, id).unwrap();
            }
            HierarchyOperation::Rebuild => {
                if live.is_empty() {
                    continue;
                }
                bvh = BoundingVolumeHierarchy::build(&mut entities, &live).unwrap();
            }
        }
        bvh.validate(&entities).unwrap();
    }

    let collected: HashSet<EntityID> = bvh.collect_entities().into_iter().collect();
    assert_eq!(collected, live.iter().copied().collect());

    let mut pairs = Vec::new();
    bvh.for_each_intersecting_entity_pair(|a, b| pairs.push((a, b)));
    let mut pairs_brute_force = Vec::new();
    bvh.for_each_intersecting_entity_pair_brute_force(|a, b| pairs_brute_force.push((a, b)));
    pairs.sort();
    pairs_brute_force.sort();
    assert_eq!(pairs, pairs_brute_force);
}

fn arbitrary_norm_f32(u: &mut Unstructured<'_>) -> Result<f32> {
    Ok((f64::from(u.int_in_range(0..=1000000)?) / 1000000.0) as f32)
}
