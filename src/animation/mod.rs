//! Animation System
//!
//! Clip data, bone masks and the per-instance layer blending that drives the
//! pose library:
//!
//! - [`AnimationClip`] / [`KeyframeTrack`]: keyed bone channels
//! - [`MaskDefinition`] / [`MaskRegistry`]: per-bone layer weights
//! - [`AnimationState`]: layer stack of one instance, solved once per frame
//! - [`PoseView`]: CPU evaluation of blended bone transforms

mod values;

pub mod blend;
pub mod clip;
pub mod keyframe;
pub mod layer;
pub mod mask;
pub mod solver;
pub mod tracks;

pub use blend::{BoneSpace, PoseView};
pub use clip::{AnimationClip, BoneTrack, RootLock};
pub use keyframe::{KeyframeSpan, time_to_index};
pub use layer::{
    AnimationId, AnimationLayer, ForceMode, ManagementMode, PlayOptions, PlaySettings, RootMotionMode,
};
pub use mask::{BoneLayer, MASK_FULL, MaskDefinition, MaskProxyHandle, MaskRegistry, MaskSourceHandle};
pub use solver::{AnimationState, BIND_POSE_ID};
pub use tracks::{InterpolationMode, KeyframeTrack};
pub use values::Interpolatable;
