//! Geometrical primitives.

mod axis_aligned_box;

pub use axis_aligned_box::AxisAlignedBox;
