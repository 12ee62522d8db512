//! Multi-camera frustum culling.
//!
//! Frustums are built once per frame from the camera views, then every
//! instance box is tested against them. An instance is visible when it
//! touches any frustum.

pub mod frustum;
pub mod view;

pub use frustum::Frustum;
pub use view::CameraView;

use glam::Vec3;

use crate::math::{BoneTransform, BoundingBox};

/// World box of an instance: its location plus the mesh bounds scaled by the
/// largest instance scale. Rotation is ignored.
#[must_use]
pub fn instance_bounds(transform: &BoneTransform, mesh_bounds: &BoundingBox) -> BoundingBox {
    let scale = transform.max_scale();
    BoundingBox::from_center_extent(
        transform.translation + mesh_bounds.center() * scale,
        mesh_bounds.extent() * scale,
    )
}

/// Whether `bounds` touches any of `frustums`.
///
/// A sphere fully inside a frustum is accepted without the box test.
#[must_use]
pub fn is_visible(bounds: &BoundingBox, frustums: &[Frustum]) -> bool {
    let center: Vec3 = bounds.center();
    let radius = bounds.radius();
    frustums.iter().any(|frustum| {
        frustum.contains_sphere(center, radius)
            || (frustum.intersects_sphere(center, radius) && frustum.intersects_box(bounds))
    })
}
