//! Ownership of the scene and serialization of scene updates.

use crate::console::ConsoleCommand;
use anyhow::Result;
use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use g10_scene::{Collider, ModelTransform, Scene, SceneConfig, SceneDescription};
use parking_lot::{RwLock, RwLockReadGuard};
use std::path::Path;

/// Owner of the active scene.
///
/// Any number of threads may query the scene concurrently. Changes to the
/// scene are gathered and applied in a single update phase per frame, which
/// holds the only write lock for its duration.
#[derive(Debug)]
pub struct Engine {
    scene: RwLock<Scene>,
}

/// A change to apply to the scene during the update phase.
#[derive(Clone, Debug)]
pub enum SceneUpdate {
    Spawn {
        name: String,
        transform: ModelTransform,
        collider: Option<Collider>,
    },
    Move {
        entity: EntityID,
        transform: ModelTransform,
    },
    Despawn {
        entity: EntityID,
    },
}

impl Engine {
    /// Creates a new engine owning the given scene.
    pub fn new(scene: Scene) -> Self {
        Self {
            scene: RwLock::new(scene),
        }
    }

    /// Loads the scene described in the given RON file, using the scene
    /// configuration in the given RON file if provided.
    pub fn load(scene_path: impl AsRef<Path>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(config_path) => SceneConfig::from_ron_file(config_path)?,
            None => SceneConfig::default(),
        };
        let description = SceneDescription::from_ron_file(scene_path)?;
        Ok(Self::new(Scene::from_description(&description, config)?))
    }

    /// Returns a reference to the [`Scene`], guarded by a [`RwLock`].
    pub fn scene(&self) -> &RwLock<Scene> {
        &self.scene
    }

    /// Acquires a read lock on the scene for querying.
    pub fn read_scene(&self) -> RwLockReadGuard<'_, Scene> {
        self.scene.read()
    }

    /// Applies the given updates in order under a single write lock.
    ///
    /// Returns the IDs of spawned entities, in the order they were spawned.
    ///
    /// # Errors
    /// Returns an error if an update refers to an entity that does not
    /// exist. Updates preceding the failing one remain applied.
    pub fn apply_scene_updates(
        &self,
        updates: impl IntoIterator<Item = SceneUpdate>,
    ) -> Result<Vec<EntityID>> {
        let mut scene = self.scene.write();
        let mut spawned = Vec::new();

        for update in updates {
            match update {
                SceneUpdate::Spawn {
                    name,
                    transform,
                    collider,
                } => {
                    spawned.push(scene.spawn_entity(name, transform, collider)?);
                }
                SceneUpdate::Move { entity, transform } => {
                    scene.set_entity_transform(entity, transform)?;
                }
                SceneUpdate::Despawn { entity } => {
                    scene.despawn_entity(entity)?;
                }
            }
        }
        Ok(spawned)
    }

    /// Returns the entities whose bounds intersect the given box.
    pub fn entities_in_box(&self, axis_aligned_box: &AxisAlignedBox) -> Vec<EntityID> {
        let mut entities = Vec::new();
        self.scene
            .read()
            .for_each_entity_in_box(axis_aligned_box, |id| entities.push(id));
        entities
    }

    /// Executes the given console command, taking a write lock on the scene
    /// only if the command modifies it.
    pub fn execute_command(&self, command: &ConsoleCommand) -> Result<String> {
        if command.modifies_scene() {
            command.execute_mut(&mut self.scene.write())
        } else {
            command.execute(&self.scene.read())
        }
    }
}
