//! Representation of axis-aligned boxes.

use approx::AbsDiffEq;
use nalgebra::{Matrix4, Point3, Vector3};

/// A box with orientation aligned with the coordinate system axes. The width,
/// height and depth axes are aligned with the x-, y- and z-axis respectively.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisAlignedBox {
    corners: [Point3<f32>; 2],
}

impl AxisAlignedBox {
    /// Creates a new box with the given lower and upper corner points.
    pub fn new(lower_corner: Point3<f32>, upper_corner: Point3<f32>) -> Self {
        Self {
            corners: [lower_corner, upper_corner],
        }
    }

    /// Creates an inverted box with the lower corner at positive infinity and
    /// the upper corner at negative infinity. Its union with any other box is
    /// that box. The box is not well formed.
    pub fn empty() -> Self {
        Self::new(
            Point3::from(Vector3::repeat(f32::INFINITY)),
            Point3::from(Vector3::repeat(f32::NEG_INFINITY)),
        )
    }

    /// Creates the axis-aligned box bounding both the given axis-aligned boxes.
    pub fn aabb_from_pair(aabb_1: &Self, aabb_2: &Self) -> Self {
        Self::new(
            aabb_1.lower_corner().inf(aabb_2.lower_corner()),
            aabb_1.upper_corner().sup(aabb_2.upper_corner()),
        )
    }

    /// Returns a reference to the lower corner of the box.
    pub fn lower_corner(&self) -> &Point3<f32> {
        &self.corners[0]
    }

    /// Returns a reference to the upper corner of the box.
    pub fn upper_corner(&self) -> &Point3<f32> {
        &self.corners[1]
    }

    /// Calculates and returns the center point of the box.
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(self.lower_corner(), self.upper_corner())
    }

    /// Returns the extents of the box along the three axes.
    pub fn extents(&self) -> Vector3<f32> {
        self.upper_corner() - self.lower_corner()
    }

    /// Whether no component of the lower corner exceeds the corresponding
    /// component of the upper corner.
    pub fn is_well_formed(&self) -> bool {
        (0..3).all(|dim| self.lower_corner()[dim] <= self.upper_corner()[dim])
    }

    /// Whether the given point is inside this axis-aligned box. A point exactly
    /// on the surface of the box is considered inside.
    pub fn contains_point(&self, point: &Point3<f32>) -> bool {
        (0..3).all(|dim| {
            point[dim] >= self.lower_corner()[dim] && point[dim] <= self.upper_corner()[dim]
        })
    }

    /// Whether all of the given axis-aligned box is inside this box. If a
    /// corner exactly touches the surface, it is still considered inside.
    pub fn contains_box(&self, other: &Self) -> bool {
        (0..3).all(|dim| {
            other.lower_corner()[dim] >= self.lower_corner()[dim]
                && other.upper_corner()[dim] <= self.upper_corner()[dim]
        })
    }

    /// Whether this box and the given box overlap. Boxes whose boundaries
    /// exactly touch are considered to intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|dim| {
            self.lower_corner()[dim] <= other.upper_corner()[dim]
                && self.upper_corner()[dim] >= other.lower_corner()[dim]
        })
    }

    /// Estimates the separation between this box and the given box.
    ///
    /// Along each axis, the gap is how far the lower corner of `other` lies
    /// beyond the upper corner of `self`, clamped to zero. The result is the
    /// length of the vector of gaps. The estimate is not symmetric: it only
    /// measures separation towards the positive side of `self`, and is zero
    /// whenever `other` does not lie strictly beyond `self` on any axis.
    pub fn separation_distance(&self, other: &Self) -> f32 {
        let gaps = (other.lower_corner() - self.upper_corner()).map(|gap| gap.max(0.0));
        gaps.norm()
    }

    /// Computes a conservative world space bound for this box, which is taken
    /// to be in the local space of the given homogeneous model-to-world
    /// transform.
    ///
    /// The radius along each axis is the sum of the absolute components of
    /// the transformed basis vector for that axis. Each corner is scaled
    /// component-wise by the radii and then translated. Rotated boxes get a
    /// looser bound than the tight AABB of the rotated box.
    pub fn aabb_of_oriented_extents(&self, model_matrix: &Matrix4<f32>) -> Self {
        let radii = Vector3::from_fn(|axis, _| {
            (0..3).map(|row| model_matrix[(row, axis)].abs()).sum::<f32>()
        });
        let translation = Vector3::new(
            model_matrix[(0, 3)],
            model_matrix[(1, 3)],
            model_matrix[(2, 3)],
        );

        Self::new(
            Point3::from(self.lower_corner().coords.component_mul(&radii) + translation),
            Point3::from(self.upper_corner().coords.component_mul(&radii) + translation),
        )
    }

    /// Computes the axis-aligned box resulting from translating this box with
    /// the given displacement vector.
    pub fn translated(&self, displacement: &Vector3<f32>) -> Self {
        Self::new(
            self.lower_corner() + displacement,
            self.upper_corner() + displacement,
        )
    }
}

impl AbsDiffEq for AxisAlignedBox {
    type Epsilon = f32;

    fn default_epsilon() -> Self::Epsilon {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        Point3::abs_diff_eq(self.lower_corner(), other.lower_corner(), epsilon)
            && Point3::abs_diff_eq(self.upper_corner(), other.upper_corner(), epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Similarity3, Translation3, UnitQuaternion, point, vector};
    use proptest::prelude::*;
    use std::f32::consts::FRAC_PI_4;

    fn unit_cube_at(x: f32, y: f32, z: f32) -> AxisAlignedBox {
        AxisAlignedBox::new(
            point![x - 0.5, y - 0.5, z - 0.5],
            point![x + 0.5, y + 0.5, z + 0.5],
        )
    }

    prop_compose! {
        fn aabb_strategy(max_coord: f32)(
            x in -max_coord..max_coord,
            y in -max_coord..max_coord,
            z in -max_coord..max_coord,
            ex in 0.0..max_coord,
            ey in 0.0..max_coord,
            ez in 0.0..max_coord,
        ) -> AxisAlignedBox {
            AxisAlignedBox::new(point![x, y, z], point![x + ex, y + ey, z + ez])
        }
    }

    #[test]
    fn overlapping_boxes_intersect() {
        let a = AxisAlignedBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);
        let b = AxisAlignedBox::new(point![0.5, 0.5, 0.5], point![1.5, 1.5, 1.5]);
        assert!(a.intersects(&b));
    }

    #[test]
    fn separated_boxes_do_not_intersect() {
        let a = AxisAlignedBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);
        let c = AxisAlignedBox::new(point![2.0, 2.0, 2.0], point![3.0, 3.0, 3.0]);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = AxisAlignedBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);
        let b = AxisAlignedBox::new(point![1.0, 0.0, 0.0], point![2.0, 1.0, 1.0]);
        assert!(a.intersects(&b));
    }

    #[test]
    fn boxes_separated_along_one_axis_do_not_intersect() {
        let a = AxisAlignedBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);
        let b = AxisAlignedBox::new(point![0.0, 0.0, 1.5], point![1.0, 1.0, 2.0]);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn separation_distance_of_box_to_positive_side_is_axis_gap() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(10.0, 0.0, 0.0);
        assert_abs_diff_eq!(a.separation_distance(&b), 9.0);
    }

    #[test]
    fn separation_distance_is_zero_for_touching_boxes() {
        let a = unit_cube_at(10.0, 0.0, 0.0);
        let b = unit_cube_at(10.5, 0.0, 0.0);
        assert_abs_diff_eq!(a.separation_distance(&b), 0.0);
    }

    #[test]
    fn separation_distance_ignores_boxes_on_negative_side() {
        let a = unit_cube_at(10.0, 0.0, 0.0);
        let b = unit_cube_at(0.0, 0.0, 0.0);
        assert_abs_diff_eq!(a.separation_distance(&b), 0.0);
        assert_abs_diff_eq!(b.separation_distance(&a), 9.0);
    }

    #[test]
    fn separation_distance_combines_axis_gaps() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(4.0, 5.0, 0.0);
        assert_abs_diff_eq!(a.separation_distance(&b), 5.0);
    }

    #[test]
    fn union_of_pair_is_tight() {
        let a = AxisAlignedBox::new(point![-1.0, 0.0, 2.0], point![0.0, 1.0, 3.0]);
        let b = AxisAlignedBox::new(point![0.5, -2.0, 0.0], point![4.0, 0.5, 1.0]);
        let union = AxisAlignedBox::aabb_from_pair(&a, &b);
        assert_abs_diff_eq!(
            union,
            AxisAlignedBox::new(point![-1.0, -2.0, 0.0], point![4.0, 1.0, 3.0])
        );
    }

    #[test]
    fn union_with_empty_box_is_other_box() {
        let a = unit_cube_at(1.0, 2.0, 3.0);
        assert_eq!(AxisAlignedBox::aabb_from_pair(&AxisAlignedBox::empty(), &a), a);
        assert!(!AxisAlignedBox::empty().is_well_formed());
    }

    #[test]
    fn oriented_extents_with_identity_transform_are_unchanged() {
        let local = unit_cube_at(0.0, 0.0, 0.0);
        assert_abs_diff_eq!(local.aabb_of_oriented_extents(&Matrix4::identity()), local);
    }

    #[test]
    fn oriented_extents_are_translated_and_scaled() {
        let local = unit_cube_at(0.0, 0.0, 0.0);
        let transform = Similarity3::from_parts(
            Translation3::new(10.0, -2.0, 4.0),
            UnitQuaternion::identity(),
            3.0,
        );
        let bound = local.aabb_of_oriented_extents(&transform.to_homogeneous());
        assert_abs_diff_eq!(
            bound,
            AxisAlignedBox::new(point![8.5, -3.5, 2.5], point![11.5, -0.5, 5.5]),
            epsilon = 1e-5
        );
    }

    #[test]
    fn oriented_extents_of_rotated_box_are_conservative() {
        let local = unit_cube_at(0.0, 0.0, 0.0);
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_4);
        let bound = local.aabb_of_oriented_extents(&rotation.to_homogeneous());

        let radius = 0.5 * 2.0_f32.sqrt();
        assert_abs_diff_eq!(bound.upper_corner().x, radius, epsilon = 1e-5);
        assert_abs_diff_eq!(bound.lower_corner().y, -radius, epsilon = 1e-5);
        assert_abs_diff_eq!(bound.upper_corner().z, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn contains_box_with_nested_box_works() {
        let outer = AxisAlignedBox::new(point![0.0, 0.0, 0.0], point![2.0, 2.0, 2.0]);
        let inner = AxisAlignedBox::new(point![0.5, 0.5, 0.5], point![1.5, 1.5, 1.5]);
        assert!(outer.contains_box(&inner));
        assert!(!inner.contains_box(&outer));
        assert!(outer.contains_point(&point![2.0, 1.0, 0.0]));
    }

    #[test]
    fn translated_box_moves_both_corners() {
        let moved = unit_cube_at(0.0, 0.0, 0.0).translated(&vector![1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(moved, unit_cube_at(1.0, 2.0, 3.0));
        assert_abs_diff_eq!(moved.extents(), vector![1.0, 1.0, 1.0]);
        assert_abs_diff_eq!(moved.center(), point![1.0, 2.0, 3.0]);
    }

    proptest! {
        #[test]
        fn intersection_is_symmetric(a in aabb_strategy(1e2), b in aabb_strategy(1e2)) {
            prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        }
    }

    proptest! {
        #[test]
        fn separation_distance_to_self_is_zero(a in aabb_strategy(1e2)) {
            prop_assert_eq!(a.separation_distance(&a), 0.0);
        }
    }

    proptest! {
        #[test]
        fn union_contains_both_boxes(a in aabb_strategy(1e2), b in aabb_strategy(1e2)) {
            let union = AxisAlignedBox::aabb_from_pair(&a, &b);
            prop_assert!(union.contains_box(&a));
            prop_assert!(union.contains_box(&b));
        }
    }
}
