use glam::{Affine3A, Mat4};

use crate::culling::frustum::Frustum;

/// A perspective camera, as seen by the culling stage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraView {
    /// Camera-to-world transform; the camera looks down -Z
    pub world: Affine3A,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraView {
    #[must_use]
    pub fn new(world: Affine3A, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            world,
            fov_degrees,
            aspect,
            near,
            far,
        }
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from(self.world).inverse()
    }

    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    #[must_use]
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(self.view_projection_matrix())
    }
}
