//! Scene entities.

use g10_geometry::AxisAlignedBox;
use g10_id::EntityID;
use g10_intersection::NodeID;
use nalgebra::{Matrix4, Similarity3, Translation3, UnitQuaternion, Vector3};

/// An object in a scene.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityID,
    name: String,
    transform: ModelTransform,
    collider: Option<Collider>,
}

/// Transform from the local space of an entity to world space, consisting of
/// a uniform scaling followed by a rotation and a translation.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelTransform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: f32,
}

/// A box shaped collider, defined in the local space of its entity.
///
/// The collider refers back to the leaf of the scene's bounding volume
/// hierarchy that bounds it. The reference does not keep the leaf alive and
/// is maintained by the hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct Collider {
    local_box: AxisAlignedBox,
    bounding_node: Option<NodeID>,
}

impl Entity {
    pub fn new(
        id: EntityID,
        name: impl Into<String>,
        transform: ModelTransform,
        collider: Option<Collider>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            transform,
            collider,
        }
    }

    pub fn id(&self) -> EntityID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: ModelTransform) {
        self.transform = transform;
    }

    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    pub fn collider_mut(&mut self) -> Option<&mut Collider> {
        self.collider.as_mut()
    }

    /// Whether the entity has a collider and therefore belongs in the
    /// bounding volume hierarchy.
    pub fn is_collidable(&self) -> bool {
        self.collider.is_some()
    }

    /// Computes the world space bound of the entity's collider.
    pub fn world_aabb(&self) -> Option<AxisAlignedBox> {
        self.collider.as_ref().map(|collider| {
            collider
                .local_box
                .aabb_of_oriented_extents(&self.transform.model_matrix())
        })
    }
}

impl ModelTransform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: 1.0,
        }
    }

    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    pub fn with_rotation(self, rotation: UnitQuaternion<f32>) -> Self {
        Self { rotation, ..self }
    }

    pub fn with_scale(self, scale: f32) -> Self {
        Self { scale, ..self }
    }

    pub fn as_similarity(&self) -> Similarity3<f32> {
        Similarity3::from_parts(Translation3::from(self.translation), self.rotation, self.scale)
    }

    /// Returns the homogeneous model-to-world matrix.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.as_similarity().to_homogeneous()
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Collider {
    pub fn new(local_box: AxisAlignedBox) -> Self {
        Self {
            local_box,
            bounding_node: None,
        }
    }

    pub fn local_box(&self) -> &AxisAlignedBox {
        &self.local_box
    }

    /// Returns the hierarchy leaf bounding this collider, if any.
    pub fn bounding_node(&self) -> Option<NodeID> {
        self.bounding_node
    }

    pub(crate) fn set_bounding_node(&mut self, node: Option<NodeID>) {
        self.bounding_node = node;
    }
}
