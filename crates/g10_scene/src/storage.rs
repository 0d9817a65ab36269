//! Storage for scene entities.

use crate::entity::Entity;
use anyhow::{Result, bail};
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use g10_intersection::{BoundedEntities, NodeID};
use nalgebra::Matrix4;
use nohash_hasher::BuildNoHashHasher;
use std::collections::HashMap;

/// Entities stored contiguously, with a map from entity ID to position.
///
/// Entities are kept in the order they were inserted, except that removing
/// an entity moves the last entity into the vacated position.
#[derive(Clone, Debug, Default)]
pub struct EntityStorage {
    entities: Vec<Entity>,
    indices_by_id: HashMap<EntityID, usize, BuildNoHashHasher<EntityID>>,
}

impl EntityStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityID) -> bool {
        self.indices_by_id.contains_key(&id)
    }

    pub fn get(&self, id: EntityID) -> Option<&Entity> {
        self.indices_by_id.get(&id).map(|&idx| &self.entities[idx])
    }

    pub fn get_mut(&mut self, id: EntityID) -> Option<&mut Entity> {
        self.indices_by_id
            .get(&id)
            .map(|&idx| &mut self.entities[idx])
    }

    /// Adds the given entity to the end of the storage.
    ///
    /// # Errors
    /// Returns an error if an entity with the same ID is already present.
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        let id = entity.id();
        if self.indices_by_id.contains_key(&id) {
            bail!("Entity with ID {id} already exists in storage");
        }
        self.indices_by_id.insert(id, self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    /// Removes and returns the entity with the given ID, or [`None`] if it is
    /// not present.
    pub fn remove(&mut self, id: EntityID) -> Option<Entity> {
        let idx = self.indices_by_id.remove(&id)?;
        let entity = self.entities.swap_remove(idx);
        if let Some(moved) = self.entities.get(idx) {
            self.indices_by_id.insert(moved.id(), idx);
        }
        Some(entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Returns the IDs of all entities with a collider, in storage order.
    pub fn collidable_ids(&self) -> Vec<EntityID> {
        self.entities
            .iter()
            .filter(|entity| entity.is_collidable())
            .map(Entity::id)
            .collect()
    }

    /// Clears the hierarchy back-reference of every collider.
    pub fn clear_bounding_nodes(&mut self) {
        for collider in self.entities.iter_mut().filter_map(Entity::collider_mut) {
            collider.set_bounding_node(None);
        }
    }
}

impl BoundedEntities for EntityStorage {
    fn local_collider_box(&self, entity: EntityID) -> Option<&AxisAlignedBox> {
        self.get(entity)?.collider().map(|collider| collider.local_box())
    }

    fn model_matrix(&self, entity: EntityID) -> Option<Matrix4<f32>> {
        self.get(entity)
            .map(|entity| entity.transform().model_matrix())
    }

    fn bounding_node(&self, entity: EntityID) -> Option<NodeID> {
        self.get(entity)?.collider()?.bounding_node()
    }

    fn set_bounding_node(&mut self, entity: EntityID, node: Option<NodeID>) {
        if let Some(collider) = self.get_mut(entity).and_then(Entity::collider_mut) {
            collider.set_bounding_node(node);
        }
    }

    fn entity_name(&self, entity: EntityID) -> Option<&str> {
        self.get(entity).map(Entity::name)
    }
}
