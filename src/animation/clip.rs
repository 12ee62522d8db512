use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Quat, Vec3};

use crate::animation::tracks::{InterpolationMode, KeyframeTrack};
use crate::math::BoneTransform;
use crate::skeleton::ReferenceSkeleton;
use crate::utils::interner::{self, Symbol};

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

/// What bone 0 is baked as when a clip carries root motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootLock {
    /// The skeleton's rest pose
    #[default]
    ReferencePose,
    /// The clip's own pose at time 0
    FirstFrame,
    /// Identity
    Zero,
}

/// Channels animating a single bone, matched to the skeleton by name.
#[derive(Debug, Clone)]
pub struct BoneTrack {
    pub bone: Symbol,
    pub translation: Option<KeyframeTrack<Vec3>>,
    pub rotation: Option<KeyframeTrack<Quat>>,
    pub scale: Option<KeyframeTrack<Vec3>>,
}

impl BoneTrack {
    #[must_use]
    pub fn new(bone_name: &str) -> Self {
        Self {
            bone: interner::intern(bone_name),
            translation: None,
            rotation: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn with_translation(mut self, track: KeyframeTrack<Vec3>) -> Self {
        self.translation = Some(track);
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, track: KeyframeTrack<Quat>) -> Self {
        self.rotation = Some(track);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, track: KeyframeTrack<Vec3>) -> Self {
        self.scale = Some(track);
        self
    }

    #[must_use]
    pub fn end_time(&self) -> f32 {
        let t = self.translation.as_ref().map_or(0.0, KeyframeTrack::end_time);
        let r = self.rotation.as_ref().map_or(0.0, KeyframeTrack::end_time);
        let s = self.scale.as_ref().map_or(0.0, KeyframeTrack::end_time);
        t.max(r).max(s)
    }

    /// Samples every channel; missing channels keep the `rest` component.
    #[must_use]
    pub fn sample(&self, time: f32, rest: &BoneTransform) -> BoneTransform {
        BoneTransform {
            translation: self
                .translation
                .as_ref()
                .and_then(|track| track.sample(time))
                .unwrap_or(rest.translation),
            rotation: self
                .rotation
                .as_ref()
                .and_then(|track| track.sample(time))
                .map_or(rest.rotation, Quat::normalize),
            scale: self
                .scale
                .as_ref()
                .and_then(|track| track.sample(time))
                .unwrap_or(rest.scale),
        }
    }
}

/// A skeletal animation.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    id: u64,
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<BoneTrack>,
    pub looping: bool,
    /// How sampled frames are blended at play time
    pub interpolation: InterpolationMode,
    /// `Some` when the clip carries root motion; bone 0 is then baked with
    /// the given lock instead of its animated transform.
    pub root_lock: Option<RootLock>,
}

impl AnimationClip {
    /// Creates a looping clip whose duration is the last keyframe time.
    #[must_use]
    pub fn new(name: &str, tracks: Vec<BoneTrack>) -> Self {
        let duration = tracks.iter().map(BoneTrack::end_time).fold(0.0_f32, f32::max);

        Self {
            id: NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            duration,
            tracks,
            looping: true,
            interpolation: InterpolationMode::Linear,
            root_lock: None,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    #[must_use]
    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.interpolation = interpolation;
        self
    }

    #[must_use]
    pub fn with_root_lock(mut self, lock: RootLock) -> Self {
        self.root_lock = Some(lock);
        self
    }

    /// Process-unique identity, shared by clones.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn find_track(&self, bone: Symbol) -> Option<usize> {
        self.tracks.iter().position(|track| track.bone == bone)
    }

    /// Track index for every CPU bone of `skeleton`.
    #[must_use]
    pub fn track_lookup(&self, skeleton: &ReferenceSkeleton) -> Vec<Option<usize>> {
        skeleton
            .bones()
            .iter()
            .map(|bone| self.find_track(bone.name))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn has_root_motion(&self) -> bool {
        self.root_lock.is_some()
    }

    /// Movement of bone 0 while playing `delta` seconds from `start`, as the
    /// transform taking the start pose to the end pose. Looping clips wrap
    /// past the end; one-shots stop at it. Identity without a root track.
    #[must_use]
    pub fn extract_root_motion(
        &self,
        skeleton: &ReferenceSkeleton,
        start: f32,
        delta: f32,
        looping: bool,
    ) -> BoneTransform {
        let Some(root) = skeleton.bones().first() else {
            return BoneTransform::IDENTITY;
        };
        let Some(track) = self.find_track(root.name).and_then(|t| self.tracks.get(t)) else {
            return BoneTransform::IDENTITY;
        };
        let motion = |from: f32, to: f32| {
            let from_pose = track.sample(from, &root.rest_pose);
            let to_pose = track.sample(to, &root.rest_pose);
            to_pose.then(&from_pose.inverse())
        };

        let length = self.duration;
        if length <= 0.0 {
            return BoneTransform::IDENTITY;
        }
        let start = start.clamp(0.0, length);
        let end = start + delta;
        if !looping || (0.0..=length).contains(&end) {
            return motion(start, end.clamp(0.0, length));
        }

        // Split at the loop boundary.
        if delta > 0.0 {
            let first = motion(start, length);
            let second = motion(0.0, end.rem_euclid(length));
            second.then(&first)
        } else {
            let first = motion(start, 0.0);
            let second = motion(length, end.rem_euclid(length));
            second.then(&first)
        }
    }

    /// Local pose of every CPU bone at `time`. Bones without a track keep
    /// their rest pose.
    #[must_use]
    pub fn sample_pose(
        &self,
        skeleton: &ReferenceSkeleton,
        lookup: &[Option<usize>],
        time: f32,
    ) -> Vec<BoneTransform> {
        skeleton
            .bones()
            .iter()
            .enumerate()
            .map(|(index, bone)| {
                match lookup.get(index).copied().flatten().and_then(|t| self.tracks.get(t)) {
                    Some(track) => track.sample(time, &bone.rest_pose),
                    None => bone.rest_pose,
                }
            })
            .collect()
    }
}
