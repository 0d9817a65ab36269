//! A minimal in-memory entity set for exercising bounding volume
//! hierarchies.

use crate::bounding_volume::{BoundedEntities, hierarchy::NodeID};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use nalgebra::{Matrix4, Point3, Vector3, point};

/// Entities stored by index, with the index serving as entity ID.
#[derive(Clone, Debug, Default)]
pub struct EntityTable {
    entries: Vec<EntityEntry>,
}

#[derive(Clone, Debug)]
struct EntityEntry {
    name: String,
    collider_box: Option<AxisAlignedBox>,
    model_matrix: Matrix4<f32>,
    bounding_node: Option<NodeID>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds an entity with the given collider box and model matrix.
    pub fn add(
        &mut self,
        name: &str,
        collider_box: AxisAlignedBox,
        model_matrix: Matrix4<f32>,
    ) -> EntityID {
        self.push(name, Some(collider_box), model_matrix)
    }

    /// Adds an entity with a unit cube collider centered on the origin,
    /// translated to the given position.
    pub fn add_unit_cube_at(&mut self, name: &str, position: Point3<f32>) -> EntityID {
        self.add(
            name,
            AxisAlignedBox::new(point![-0.5, -0.5, -0.5], point![0.5, 0.5, 0.5]),
            Matrix4::new_translation(&position.coords),
        )
    }

    /// Adds an entity with no collider.
    pub fn add_without_collider(&mut self, name: &str) -> EntityID {
        self.push(name, None, Matrix4::identity())
    }

    /// Replaces the translation of the given entity's model matrix.
    pub fn set_translation(&mut self, entity: EntityID, translation: Vector3<f32>) {
        if let Some(entry) = self.entry_mut(entity) {
            entry
                .model_matrix
                .fixed_view_mut::<3, 1>(0, 3)
                .copy_from(&translation);
        }
    }

    /// Replaces the model matrix of the given entity.
    pub fn set_model_matrix(&mut self, entity: EntityID, model_matrix: Matrix4<f32>) {
        if let Some(entry) = self.entry_mut(entity) {
            entry.model_matrix = model_matrix;
        }
    }

    /// Returns the IDs of all entities with a collider, in insertion order.
    pub fn collidable_ids(&self) -> Vec<EntityID> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.collider_box.is_some())
            .map(|(idx, _)| EntityID::from_u64(idx as u64))
            .collect()
    }

    /// Returns the current world space bound of the given entity.
    pub fn world_aabb(&self, entity: EntityID) -> Option<AxisAlignedBox> {
        let entry = self.entry(entity)?;
        entry
            .collider_box
            .as_ref()
            .map(|collider_box| collider_box.aabb_of_oriented_extents(&entry.model_matrix))
    }

    fn push(
        &mut self,
        name: &str,
        collider_box: Option<AxisAlignedBox>,
        model_matrix: Matrix4<f32>,
    ) -> EntityID {
        let id = EntityID::from_u64(self.entries.len() as u64);
        self.entries.push(EntityEntry {
            name: name.to_owned(),
            collider_box,
            model_matrix,
            bounding_node: None,
        });
        id
    }

    fn entry(&self, entity: EntityID) -> Option<&EntityEntry> {
        self.entries.get(entity.as_u64() as usize)
    }

    fn entry_mut(&mut self, entity: EntityID) -> Option<&mut EntityEntry> {
        self.entries.get_mut(entity.as_u64() as usize)
    }
}

impl BoundedEntities for EntityTable {
    fn local_collider_box(&self, entity: EntityID) -> Option<&AxisAlignedBox> {
        self.entry(entity)?.collider_box.as_ref()
    }

    fn model_matrix(&self, entity: EntityID) -> Option<Matrix4<f32>> {
        self.entry(entity).map(|entry| entry.model_matrix)
    }

    fn bounding_node(&self, entity: EntityID) -> Option<NodeID> {
        self.entry(entity)?.bounding_node
    }

    fn set_bounding_node(&mut self, entity: EntityID, node: Option<NodeID>) {
        if let Some(entry) = self.entry_mut(entity) {
            if entry.collider_box.is_some() {
                entry.bounding_node = node;
            }
        }
    }

    fn entity_name(&self, entity: EntityID) -> Option<&str> {
        self.entry(entity).map(|entry| entry.name.as_str())
    }
}
