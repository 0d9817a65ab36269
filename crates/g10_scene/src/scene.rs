//! Scenes of entities with a bounding volume hierarchy over their colliders.

use crate::{
    config::SceneConfig,
    description::SceneDescription,
    entity::{Collider, Entity, ModelTransform},
    storage::EntityStorage,
};
use anyhow::{Result, anyhow, bail};
use g10_geometry::AxisAlignedBox;
use g10_id::{EntityID, EntityIDManager};
use g10_intersection::{BVHError, BoundingVolumeHierarchy};

/// A set of entities together with the bounding volume hierarchy over the
/// entities that have a collider.
///
/// The scene is the sole owner of its hierarchy. All mutation goes through
/// `&mut self`, so callers sharing a scene between threads must serialize
/// updates.
#[derive(Debug)]
pub struct Scene {
    name: String,
    config: SceneConfig,
    entities: EntityStorage,
    id_manager: EntityIDManager,
    hierarchy: HierarchyState,
}

/// Whether a scene currently has a usable bounding volume hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HierarchyStatus {
    /// There are no collidable entities, so there is no hierarchy.
    Absent,
    /// The hierarchy is up to date and used for queries.
    Active,
    /// The hierarchy is turned off, too expensive to build or has failed.
    /// Queries test every entity until the next rebuild.
    Disabled,
}

/// Summary statistics for the bounding volume hierarchy of a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyStats {
    pub status: HierarchyStatus,
    pub node_count: usize,
    pub leaf_count: usize,
    pub depth: Option<usize>,
    pub root_aabb: Option<AxisAlignedBox>,
}

#[derive(Debug)]
enum HierarchyState {
    Absent,
    Active(BoundingVolumeHierarchy),
    Disabled,
}

impl Scene {
    /// Creates a new scene with no entities.
    pub fn new(name: impl Into<String>, config: SceneConfig) -> Result<Self> {
        config.validate()?;
        let hierarchy = if config.hierarchy.enabled {
            HierarchyState::Absent
        } else {
            HierarchyState::Disabled
        };
        Ok(Self {
            name: name.into(),
            config,
            entities: EntityStorage::new(),
            id_manager: EntityIDManager::new(),
            hierarchy,
        })
    }

    /// Creates the scene given by the description and builds its bounding
    /// volume hierarchy.
    ///
    /// Failing to build the hierarchy is logged and leaves the hierarchy
    /// disabled, but does not fail scene creation.
    pub fn from_description(description: &SceneDescription, config: SceneConfig) -> Result<Self> {
        description.validate()?;

        let mut scene = Self::new(&description.name, config)?;

        for entity in &description.entities {
            let id = scene.id_manager.provide_id();
            scene.entities.insert(Entity::new(
                id,
                &entity.name,
                entity.transform.to_model_transform(),
                entity.collider.as_ref().map(|collider| collider.to_collider()),
            ))?;
        }

        g10_log::info!(
            "Loaded scene {} with {} entities",
            scene.name,
            scene.entities.len()
        );

        scene.build_hierarchy();
        Ok(scene)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    pub fn entity(&self, id: EntityID) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Returns the bounding volume hierarchy if it is active.
    pub fn hierarchy(&self) -> Option<&BoundingVolumeHierarchy> {
        match &self.hierarchy {
            HierarchyState::Active(bvh) => Some(bvh),
            HierarchyState::Absent | HierarchyState::Disabled => None,
        }
    }

    pub fn hierarchy_status(&self) -> HierarchyStatus {
        match &self.hierarchy {
            HierarchyState::Absent => HierarchyStatus::Absent,
            HierarchyState::Active(_) => HierarchyStatus::Active,
            HierarchyState::Disabled => HierarchyStatus::Disabled,
        }
    }

    pub fn hierarchy_stats(&self) -> HierarchyStats {
        let bvh = self.hierarchy();
        HierarchyStats {
            status: self.hierarchy_status(),
            node_count: bvh.map_or(0, BoundingVolumeHierarchy::node_count),
            leaf_count: bvh.map_or(0, BoundingVolumeHierarchy::leaf_count),
            depth: bvh.and_then(BoundingVolumeHierarchy::depth),
            root_aabb: bvh
                .and_then(BoundingVolumeHierarchy::root_bounding_volume)
                .cloned(),
        }
    }

    /// Discards the current bounding volume hierarchy, if any, and builds a
    /// new one over all collidable entities.
    pub fn rebuild_hierarchy(&mut self) {
        g10_log::with_trace_logging!("Rebuilding bounding volume hierarchy of scene {}", self.name; {
            self.entities.clear_bounding_nodes();
            self.build_hierarchy();
        });
    }

    /// Adds a new entity to the scene and, if it has a collider, inserts it
    /// into the bounding volume hierarchy.
    ///
    /// Returns the ID of the new entity.
    pub fn spawn_entity(
        &mut self,
        name: impl Into<String>,
        transform: ModelTransform,
        collider: Option<Collider>,
    ) -> Result<EntityID> {
        let id = self.id_manager.provide_id();
        let collidable = collider.is_some();

        if let Err(err) = self
            .entities
            .insert(Entity::new(id, name, transform, collider))
        {
            self.id_manager.unregister_id(id);
            return Err(err);
        }

        if !collidable {
            return Ok(id);
        }

        if matches!(self.hierarchy, HierarchyState::Absent) {
            self.hierarchy = HierarchyState::Active(BoundingVolumeHierarchy::new());
        }

        if let HierarchyState::Active(bvh) = &mut self.hierarchy {
            if let Err(err) = bvh.insert_entity(&mut self.entities, id) {
                self.disable_hierarchy("inserting a spawned entity", &err);
            }
        }
        self.validate_after_update();

        Ok(id)
    }

    /// Replaces the transform of the given entity and refits the bounding
    /// volume hierarchy if the entity has a collider.
    ///
    /// # Errors
    /// Returns an error if the entity does not exist.
    pub fn set_entity_transform(&mut self, id: EntityID, transform: ModelTransform) -> Result<()> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| anyhow!("Entity {id} does not exist in scene {}", self.name))?;

        entity.set_transform(transform);
        let collidable = entity.is_collidable();

        if collidable {
            if let HierarchyState::Active(bvh) = &mut self.hierarchy {
                if let Err(err) = bvh.update_entity(&mut self.entities, id) {
                    self.disable_hierarchy("updating a moved entity", &err);
                }
            }
            self.validate_after_update();
        }
        Ok(())
    }

    /// Removes the given entity from the scene and from the bounding volume
    /// hierarchy.
    ///
    /// # Errors
    /// Returns an error if the entity does not exist.
    pub fn despawn_entity(&mut self, id: EntityID) -> Result<Entity> {
        let Some(entity) = self.entities.get(id) else {
            bail!("Entity {id} does not exist in scene {}", self.name);
        };

        if entity.is_collidable() {
            if let HierarchyState::Active(bvh) = &mut self.hierarchy {
                let result = bvh.remove_entity(&mut self.entities, id);
                let emptied = bvh.is_empty();
                match result {
                    Ok(()) if emptied => self.hierarchy = HierarchyState::Absent,
                    Ok(()) => {}
                    Err(err) => self.disable_hierarchy("removing a despawned entity", &err),
                }
            }
            self.validate_after_update();
        }

        self.id_manager.unregister_id(id);
        self.entities
            .remove(id)
            .ok_or_else(|| anyhow!("Entity {id} vanished from scene {}", self.name))
    }

    /// Returns the entities that collision detection and culling should
    /// consider.
    ///
    /// With an active hierarchy, these are the entities of its leaves from
    /// left to right. Without a hierarchy, there are no candidates. With a
    /// disabled hierarchy, every collidable entity is a candidate.
    pub fn collidable_candidates(&self) -> Vec<EntityID> {
        match &self.hierarchy {
            HierarchyState::Active(bvh) => bvh.collect_entities(),
            HierarchyState::Absent => Vec::new(),
            HierarchyState::Disabled => self.entities.collidable_ids(),
        }
    }

    /// Calls the given closure with each collidable entity whose bound
    /// intersects the given box.
    pub fn for_each_entity_in_box(
        &self,
        axis_aligned_box: &AxisAlignedBox,
        mut f: impl FnMut(EntityID),
    ) {
        match &self.hierarchy {
            HierarchyState::Active(bvh) => {
                bvh.for_each_entity_in_axis_aligned_box(axis_aligned_box, f);
            }
            HierarchyState::Absent => {}
            HierarchyState::Disabled => {
                for entity in self.entities.iter() {
                    if let Some(aabb) = entity.world_aabb() {
                        if aabb.intersects(axis_aligned_box) {
                            f(entity.id());
                        }
                    }
                }
            }
        }
    }

    /// Calls the given closure once for each pair of collidable entities
    /// whose bounds intersect, with the smaller ID first.
    pub fn for_each_intersecting_entity_pair(&self, mut f: impl FnMut(EntityID, EntityID)) {
        match &self.hierarchy {
            HierarchyState::Active(bvh) => bvh.for_each_intersecting_entity_pair(f),
            HierarchyState::Absent => {}
            HierarchyState::Disabled => {
                let bounded: Vec<_> = self
                    .entities
                    .iter()
                    .filter_map(|entity| entity.world_aabb().map(|aabb| (entity.id(), aabb)))
                    .collect();

                for (i, (id_i, aabb_i)) in bounded.iter().enumerate() {
                    for (id_j, aabb_j) in &bounded[i + 1..] {
                        if aabb_i.intersects(aabb_j) {
                            f(*id_i.min(id_j), *id_i.max(id_j));
                        }
                    }
                }
            }
        }
    }

    /// Returns a printout of the bounding volume hierarchy, or [`None`] if
    /// there is no active hierarchy.
    pub fn hierarchy_dump(&self) -> Option<String> {
        self.hierarchy()
            .map(|bvh| bvh.dump(&self.entities).to_string())
    }

    /// Checks the structure of the bounding volume hierarchy.
    ///
    /// # Errors
    /// Returns an error if the hierarchy is disabled or malformed.
    pub fn validate_hierarchy(&self) -> Result<()> {
        match &self.hierarchy {
            HierarchyState::Active(bvh) => bvh.validate(&self.entities).map_err(|err| {
                anyhow!(
                    "Invalid bounding volume hierarchy in scene {}: {err}",
                    self.name
                )
            }),
            HierarchyState::Absent => Ok(()),
            HierarchyState::Disabled => {
                bail!(
                    "Bounding volume hierarchy of scene {} is disabled",
                    self.name
                )
            }
        }
    }

    fn build_hierarchy(&mut self) {
        let ids = self.entities.collidable_ids();

        if !self.config.hierarchy.enabled {
            g10_log::info!(
                "Bounding volume hierarchy is disabled for scene {}",
                self.name
            );
            self.hierarchy = HierarchyState::Disabled;
            return;
        }

        if ids.len() > self.config.hierarchy.max_build_entity_count {
            g10_log::warn!(
                "Scene {} has {} collidable entities, more than the limit of {} for building a bounding volume hierarchy",
                self.name,
                ids.len(),
                self.config.hierarchy.max_build_entity_count
            );
            self.hierarchy = HierarchyState::Disabled;
            return;
        }

        let result = g10_log::with_timing_info_logging!(
            "Building bounding volume hierarchy for {} collidable entities in scene {}",
            ids.len(),
            self.name; {
            BoundingVolumeHierarchy::build(&mut self.entities, &ids)
        });

        match result {
            Ok(bvh) => {
                if self.config.hierarchy.log_dump_after_build {
                    g10_log::debug!("{}", bvh.dump(&self.entities));
                }
                self.hierarchy = HierarchyState::Active(bvh);
                self.validate_after_update();
            }
            Err(BVHError::EmptyScene) => {
                g10_log::info!(
                    "Scene {} has no collidable entities, so no bounding volume hierarchy was built",
                    self.name
                );
                self.hierarchy = HierarchyState::Absent;
            }
            Err(err) => {
                g10_log::error!(
                    "Failed to build bounding volume hierarchy for scene {} with {} collidable entities: {err}",
                    self.name,
                    ids.len()
                );
                self.entities.clear_bounding_nodes();
                self.hierarchy = HierarchyState::Disabled;
            }
        }
    }

    fn validate_after_update(&mut self) {
        if !self.config.hierarchy.validate_after_updates {
            return;
        }
        if let HierarchyState::Active(bvh) = &self.hierarchy {
            if let Err(err) = bvh.validate(&self.entities) {
                self.disable_hierarchy("validating", &err);
            }
        }
    }

    fn disable_hierarchy(&mut self, operation: &str, err: &BVHError) {
        g10_log::error!(
            "Bounding volume hierarchy of scene {} failed while {operation}: {err}. \
             Disabling it until the next rebuild",
            self.name
        );
        self.entities.clear_bounding_nodes();
        self.hierarchy = HierarchyState::Disabled;
    }
}
