//! Math helpers shared by the animation, culling and render modules.

pub mod bounds;
pub mod transform;

pub use bounds::BoundingBox;
pub use transform::{BoneTransform, matrix_rows, rows_to_affine};

/// Fixed-point scale used for weights, alphas and mask values sent to the GPU.
pub const WEIGHT_SCALE: f32 = 32767.0;

/// Tolerance used for "nearly zero" weight comparisons.
pub const SMALL_NUMBER: f32 = 1e-8;

/// Quantizes a `[0, 1]` value to the 15-bit fixed-point range.
#[inline]
#[must_use]
pub fn quantize_unit(value: f32) -> i32 {
    (value.clamp(0.0, 1.0) * WEIGHT_SCALE).round() as i32
}

#[inline]
#[must_use]
pub fn is_nearly_zero(value: f32) -> bool {
    value.abs() <= SMALL_NUMBER
}
