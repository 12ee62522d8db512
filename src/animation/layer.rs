use std::sync::Arc;

use crate::animation::clip::AnimationClip;
use crate::animation::keyframe::KeyframeSpan;
use crate::animation::mask::{MaskDefinition, MaskProxyHandle, MaskSourceHandle};
use crate::library::PoseKey;

/// How playing a new animation treats the layers already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForceMode {
    /// Blend in alongside existing layers
    #[default]
    None,
    /// Drop layers that share a masked bone with the new one
    PerLayer,
    /// Drop every layer except the bind pose
    AllLayers,
}

/// Whether a new layer fades out earlier layers on the same bones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManagementMode {
    #[default]
    Auto,
    /// Earlier layers are left alone; the caller removes them explicitly
    SelfManaged,
}

/// When a layer contributes to the instance's root motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootMotionMode {
    None,
    /// Only when the layer's mask covers the root bone
    #[default]
    OnRootBoneAnimated,
    /// Regardless of the mask
    Force,
}

/// Per-play configuration of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaySettings {
    pub mask: MaskDefinition,
    /// Time is only changed through [`tweak`](crate::animation::AnimationState::tweak_animation)
    pub time_self_managed: bool,
    /// Normalize against other layers with the same mask
    pub normalize_in_group: bool,
    /// Upper bound of the applied weight
    pub weight: f32,
    /// Initial play position in seconds
    pub start_time: f32,
    pub speed: f32,
    pub force_mode: ForceMode,
    /// Blend-in duration in seconds
    pub blend_in: f32,
    /// Blend-out duration in seconds; one-shots start fading this long before
    /// their end
    pub blend_out: f32,
    pub management: ManagementMode,
    pub root_motion: RootMotionMode,
}

impl Default for PlaySettings {
    fn default() -> Self {
        Self {
            mask: MaskDefinition::default(),
            time_self_managed: false,
            normalize_in_group: true,
            weight: 1.0,
            start_time: 0.0,
            speed: 1.0,
            force_mode: ForceMode::None,
            blend_in: 0.25,
            blend_out: 0.25,
            management: ManagementMode::Auto,
            root_motion: RootMotionMode::OnRootBoneAnimated,
        }
    }
}

/// Options of a single play call that are not stored with the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayOptions {
    /// Loop even when the clip is a one-shot
    pub force_loop: bool,
    /// Insert right after the bind pose instead of at the end
    pub force_front: bool,
}

/// Per-instance identifier of a played animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationId(pub u32);

/// One active animation contribution on an instance.
#[derive(Debug, Clone)]
pub struct AnimationLayer {
    pub(crate) id: AnimationId,
    pub(crate) clip: Option<Arc<AnimationClip>>,
    pub(crate) pose_key: PoseKey,
    pub(crate) settings: PlaySettings,
    pub(crate) mask: MaskProxyHandle,
    pub(crate) group: MaskSourceHandle,

    pub(crate) time: f32,
    pub(crate) last_time: f32,
    pub(crate) normalized_time: f32,
    pub(crate) length: f32,
    pub(crate) looping: bool,
    pub(crate) loop_count: u32,

    pub(crate) blend_in_time: f32,
    pub(crate) blend_out_time: f32,
    pub(crate) pending_removal: bool,
    pub(crate) final_weight: f32,

    pub(crate) span: KeyframeSpan,
    pub(crate) slots: [Option<u32>; 2],
}

impl AnimationLayer {
    #[inline]
    #[must_use]
    pub fn id(&self) -> AnimationId {
        self.id
    }

    /// `None` for the bind pose.
    #[must_use]
    pub fn clip(&self) -> Option<&Arc<AnimationClip>> {
        self.clip.as_ref()
    }

    #[must_use]
    pub fn is_bind_pose(&self) -> bool {
        self.clip.is_none()
    }

    #[must_use]
    pub fn pose_key(&self) -> PoseKey {
        self.pose_key
    }

    #[must_use]
    pub fn settings(&self) -> &PlaySettings {
        &self.settings
    }

    #[must_use]
    pub fn mask(&self) -> MaskProxyHandle {
        self.mask
    }

    #[must_use]
    pub fn group(&self) -> MaskSourceHandle {
        self.group
    }

    /// Local play time in seconds.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Play time at the start of the last solve.
    #[must_use]
    pub fn last_time(&self) -> f32 {
        self.last_time
    }

    #[must_use]
    pub fn normalized_time(&self) -> f32 {
        self.normalized_time
    }

    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Number of times the play time wrapped around.
    #[must_use]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    #[must_use]
    pub fn is_pending_removal(&self) -> bool {
        self.pending_removal
    }

    /// Weight applied after group normalization.
    #[must_use]
    pub fn final_weight(&self) -> f32 {
        self.final_weight
    }

    /// Sampled frames around the current play position.
    #[must_use]
    pub fn span(&self) -> KeyframeSpan {
        self.span
    }

    /// Library slots of `span.before` and `span.after`.
    #[must_use]
    pub fn slots(&self) -> [Option<u32>; 2] {
        self.slots
    }
}
