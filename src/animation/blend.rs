use glam::{Quat, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::animation::layer::AnimationLayer;
use crate::animation::mask::MaskRegistry;
use crate::library::PoseLibrary;
use crate::math::{BoneTransform, is_nearly_zero};
use crate::skeleton::ReferenceSkeleton;

/// Space of a queried or overridden bone transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoneSpace {
    /// Relative to the parent bone
    Local,
    /// Relative to the instance origin
    #[default]
    Component,
    /// Relative to the world
    World,
}

/// Read-only view of everything needed to evaluate an instance's bones on the
/// CPU.
#[derive(Clone, Copy)]
pub struct PoseView<'a> {
    pub layers: &'a [AnimationLayer],
    pub library: &'a PoseLibrary,
    pub masks: &'a MaskRegistry,
    pub skeleton: &'a ReferenceSkeleton,
    /// Component-space overrides keyed by CPU bone
    pub overrides: &'a FxHashMap<usize, BoneTransform>,
    pub world: &'a BoneTransform,
}

impl PoseView<'_> {
    /// Local transform of `bone` blended across all layers.
    ///
    /// Layers are applied oldest first. Each layer's weight is scaled by its
    /// mask and capped by what earlier layers left unclaimed. Returns identity
    /// when no layer contributes.
    #[must_use]
    pub fn blend_bone(&self, bone: usize) -> BoneTransform {
        let rest = self.skeleton.rest_pose(bone).unwrap_or_default();

        let mut cumulative = 0.0_f32;
        let mut translation = Vec3::ZERO;
        let mut scale = Vec3::ZERO;
        let mut rotation = Vec4::ZERO;
        let mut contributed = false;

        for layer in self.layers {
            let weight = layer.final_weight * self.masks.bone_weight(layer.mask, bone);
            let weight = weight.min(1.0 - cumulative);
            cumulative += weight;
            if is_nearly_zero(weight) {
                continue;
            }

            let sample = |frame: usize| {
                self.library
                    .pose(layer.pose_key, frame)
                    .and_then(|pose| pose.get(bone).copied())
                    .unwrap_or(rest)
            };
            let pose = sample(layer.span.before).interpolate(&sample(layer.span.after), layer.span.alpha);

            translation += pose.translation * weight;
            scale += pose.scale * weight;

            let q = Vec4::from(pose.rotation);
            let q = if contributed && rotation.dot(q) < 0.0 { -q } else { q };
            rotation += q * weight;
            contributed = true;
        }

        if !contributed || rotation.length_squared() <= f32::EPSILON {
            return BoneTransform::IDENTITY;
        }

        BoneTransform {
            translation,
            rotation: Quat::from_vec4(rotation).normalize(),
            scale,
        }
    }

    /// Transform of `bone` in `space`.
    ///
    /// Component and world space walk the parent chain and stop at the first
    /// overridden bone, whose override already is in component space.
    #[must_use]
    pub fn bone_transform(&self, bone: usize, space: BoneSpace) -> BoneTransform {
        if space == BoneSpace::Local {
            return self.blend_bone(bone);
        }

        let mut result = BoneTransform::IDENTITY;
        let mut current = Some(bone);
        while let Some(index) = current {
            if let Some(component) = self.overrides.get(&index) {
                result = result.then(component);
                break;
            }
            result = result.then(&self.blend_bone(index));
            current = self.skeleton.parent_index(index);
        }

        match space {
            BoneSpace::World => result.then(self.world),
            _ => result,
        }
    }
}
