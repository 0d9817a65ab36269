//! Serializable descriptions of scenes.

use crate::entity::{Collider, ModelTransform};
use anyhow::{Context, Result, bail};
use g10_geometry::AxisAlignedBox;
use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Description of a scene and the entities it starts out with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityDescription>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    #[serde(default)]
    pub transform: TransformDescription,
    #[serde(default)]
    pub collider: Option<ColliderDescription>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDescription {
    pub translation: [f32; 3],
    /// Rotation axis. Need not be normalized.
    pub rotation_axis: [f32; 3],
    pub rotation_angle_degrees: f32,
    pub scale: f32,
}

/// Box collider given by its local space corners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColliderDescription {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl SceneDescription {
    /// Parses the scene description in the RON file at the given path.
    pub fn from_ron_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let description: Self = g10_io::parse_ron_file(file_path)?;
        description
            .validate()
            .with_context(|| format!("Invalid scene description in {}", file_path.display()))?;
        Ok(description)
    }

    pub fn validate(&self) -> Result<()> {
        for entity in &self.entities {
            entity
                .validate()
                .with_context(|| format!("Invalid entity {}", entity.name))?;
        }
        Ok(())
    }
}

impl EntityDescription {
    fn validate(&self) -> Result<()> {
        self.transform.validate()?;
        if let Some(collider) = &self.collider {
            collider.validate()?;
        }
        Ok(())
    }
}

impl TransformDescription {
    fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0) {
            bail!("Non-positive scale {}", self.scale);
        }
        if self.rotation_angle_degrees != 0.0 && Vector3::from(self.rotation_axis).norm() == 0.0 {
            bail!("Rotation of {} degrees about zero axis", self.rotation_angle_degrees);
        }
        Ok(())
    }

    pub fn to_model_transform(&self) -> ModelTransform {
        let rotation = Unit::try_new(Vector3::from(self.rotation_axis), f32::EPSILON).map_or_else(
            UnitQuaternion::identity,
            |axis| UnitQuaternion::from_axis_angle(&axis, self.rotation_angle_degrees.to_radians()),
        );
        ModelTransform::from_translation(Vector3::from(self.translation))
            .with_rotation(rotation)
            .with_scale(self.scale)
    }
}

impl Default for TransformDescription {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation_axis: [0.0, 0.0, 1.0],
            rotation_angle_degrees: 0.0,
            scale: 1.0,
        }
    }
}

impl ColliderDescription {
    fn validate(&self) -> Result<()> {
        if (0..3).any(|axis| !(self.min[axis] <= self.max[axis])) {
            bail!(
                "Collider lower corner {:?} is not below upper corner {:?}",
                self.min,
                self.max
            );
        }
        Ok(())
    }

    pub fn to_collider(&self) -> Collider {
        Collider::new(AxisAlignedBox::new(
            Point3::from(self.min),
            Point3::from(self.max),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::vector;

    const SCENE: &str = r#"
(
    name: "Three crates",
    entities: [
        (
            name: "a",
            collider: Some((min: (-0.5, -0.5, -0.5), max: (0.5, 0.5, 0.5))),
        ),
        (
            name: "b",
            transform: (translation: (10.0, 0.0, 0.0)),
            collider: Some((min: (-0.5, -0.5, -0.5), max: (0.5, 0.5, 0.5))),
        ),
        (
            name: "camera",
            transform: (translation: (0.0, 2.0, 5.0)),
        ),
    ],
)
"#;

    #[test]
    fn scene_description_is_parsed_with_defaults() {
        let description: SceneDescription = ron::from_str(SCENE).unwrap();
        assert!(description.validate().is_ok());

        assert_eq!(description.name, "Three crates");
        assert_eq!(description.entities.len(), 3);
        assert!(description.entities[2].collider.is_none());

        let transform = description.entities[1].transform.to_model_transform();
        assert_abs_diff_eq!(transform.translation, vector![10.0, 0.0, 0.0]);
        assert_abs_diff_eq!(transform.scale, 1.0);
    }

    #[test]
    fn inverted_collider_is_invalid() {
        let collider = ColliderDescription {
            min: [0.0, 1.0, 0.0],
            max: [1.0, 0.0, 1.0],
        };
        assert!(collider.validate().is_err());
    }

    #[test]
    fn zero_scale_is_invalid() {
        let transform = TransformDescription {
            scale: 0.0,
            ..TransformDescription::default()
        };
        assert!(transform.validate().is_err());
    }

    #[test]
    fn rotation_is_applied_about_given_axis() {
        let transform = TransformDescription {
            rotation_axis: [0.0, 0.0, 2.0],
            rotation_angle_degrees: 90.0,
            ..TransformDescription::default()
        }
        .to_model_transform();
        assert_abs_diff_eq!(
            transform.rotation * vector![1.0, 0.0, 0.0],
            vector![0.0, 1.0, 0.0],
            epsilon = 1e-6
        );
    }
}
