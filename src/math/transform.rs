use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Translation / rotation / scale of a single bone or instance.
///
/// Composition follows the child-to-parent convention used throughout the
/// crate: `child.then(&parent)` yields the child expressed in the parent's
/// space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Decomposes an affine matrix. Shear is lost.
    #[must_use]
    pub fn from_affine(matrix: &Affine3A) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[inline]
    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    #[inline]
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Expresses `self` (relative to `parent`) in the parent's space.
    #[must_use]
    pub fn then(&self, parent: &BoneTransform) -> BoneTransform {
        Self::from_affine(&(parent.to_affine() * self.to_affine()))
    }

    #[must_use]
    pub fn inverse(&self) -> BoneTransform {
        Self::from_affine(&self.to_affine().inverse())
    }

    /// Component-wise lerp of translation and scale, slerp of rotation.
    #[must_use]
    pub fn interpolate(&self, other: &BoneTransform, t: f32) -> BoneTransform {
        Self {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Largest absolute scale component.
    #[inline]
    #[must_use]
    pub fn max_scale(&self) -> f32 {
        self.scale.abs().max_element()
    }

    #[must_use]
    pub fn abs_diff_eq(&self, other: &BoneTransform, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            && self.rotation.dot(other.rotation).abs() >= 1.0 - max_abs_diff
    }
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<BoneTransform> for Affine3A {
    fn from(value: BoneTransform) -> Self {
        value.to_affine()
    }
}

/// Packs a matrix as the first three rows of its row-major form.
///
/// This is the transposed 3×4 layout consumed by the GPU stage: each row holds
/// one basis component in `xyz` and the translation component in `w`.
#[must_use]
pub fn matrix_rows(matrix: &Affine3A) -> [Vec4; 3] {
    let m = Mat4::from(*matrix);
    [m.row(0), m.row(1), m.row(2)]
}

/// Inverse of [`matrix_rows`].
#[must_use]
pub fn rows_to_affine(rows: &[Vec4; 3]) -> Affine3A {
    Affine3A::from_mat4(Mat4::from_cols(rows[0], rows[1], rows[2], Vec4::W).transpose())
}
