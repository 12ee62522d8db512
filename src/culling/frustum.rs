use glam::{Mat4, Vec3, Vec4};

use crate::math::BoundingBox;

/// Six clip planes with inward-facing normals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Extracts the planes of a view-projection matrix with a `[0, 1]` depth
    /// range (Gribb-Hartmann).
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    #[inline]
    fn distance(plane: Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|&plane| Self::distance(plane, center) >= -radius)
    }

    /// Whether the sphere lies entirely inside every plane.
    #[must_use]
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|&plane| Self::distance(plane, center) >= radius)
    }

    /// Tests the box corner furthest along each plane normal.
    #[must_use]
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        self.planes.iter().all(|&plane| {
            let normal = plane.truncate();
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), bounds.max, bounds.min);
            Self::distance(plane, positive) >= 0.0
        })
    }
}
