use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::animation::{AnimationClip, RootLock};
use crate::math::BoneTransform;
use crate::skeleton::MeshAsset;

/// Identity of a pose source: (skeleton, mesh asset, animation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoseKey(pub u64);

impl PoseKey {
    /// `clip == None` keys the bind pose of the asset.
    #[must_use]
    pub fn new(asset: &MeshAsset, clip: Option<&AnimationClip>) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(&asset.skeleton().id().to_le_bytes());
        hasher.update(&asset.id().to_le_bytes());
        hasher.update(&clip.map_or(0, AnimationClip::id).to_le_bytes());
        Self(hasher.digest())
    }
}

/// Baked frames of one pose source.
#[derive(Debug)]
pub struct LibraryEntry {
    key: PoseKey,
    asset: Arc<MeshAsset>,
    clip: Option<Arc<AnimationClip>>,
    max_frames: usize,
    slot_of_frame: Vec<Option<u32>>,
    poses: Vec<Option<Vec<BoneTransform>>>,
    track_lookup: Vec<Option<usize>>,
}

impl LibraryEntry {
    pub(crate) fn new(key: PoseKey, asset: Arc<MeshAsset>, clip: Option<Arc<AnimationClip>>) -> Self {
        let max_frames = match &clip {
            Some(clip) if clip.duration > 0.0 => {
                ((clip.duration / asset.sample_interval()).round() as usize).max(2)
            }
            _ => 1,
        };
        let track_lookup = clip
            .as_ref()
            .map(|clip| clip.track_lookup(asset.skeleton()))
            .unwrap_or_default();

        Self {
            key,
            asset,
            clip,
            max_frames,
            slot_of_frame: vec![None; max_frames],
            poses: vec![None; max_frames],
            track_lookup,
        }
    }

    #[must_use]
    pub fn key(&self) -> PoseKey {
        self.key
    }

    #[must_use]
    pub fn asset(&self) -> &Arc<MeshAsset> {
        &self.asset
    }

    #[must_use]
    pub fn clip(&self) -> Option<&Arc<AnimationClip>> {
        self.clip.as_ref()
    }

    /// Number of sampled frames; fixed at creation.
    #[inline]
    #[must_use]
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    #[must_use]
    pub fn slot_of_frame(&self, frame: usize) -> Option<u32> {
        self.slot_of_frame.get(frame).copied().flatten()
    }

    #[must_use]
    pub fn pose(&self, frame: usize) -> Option<&[BoneTransform]> {
        self.poses.get(frame)?.as_deref()
    }

    #[must_use]
    pub fn baked_frames(&self) -> usize {
        self.slot_of_frame.iter().filter(|slot| slot.is_some()).count()
    }

    /// Clip time of `frame`.
    #[must_use]
    pub fn frame_time(&self, frame: usize) -> f32 {
        match &self.clip {
            Some(clip) if self.max_frames > 1 => {
                frame as f32 / (self.max_frames - 1) as f32 * clip.duration
            }
            _ => 0.0,
        }
    }

    /// Local pose of every CPU bone at `frame`.
    pub(crate) fn evaluate_frame(&self, frame: usize) -> Vec<BoneTransform> {
        let skeleton = self.asset.skeleton();
        let Some(clip) = &self.clip else {
            return skeleton.bones().iter().map(|bone| bone.rest_pose).collect();
        };

        let mut pose = clip.sample_pose(skeleton, &self.track_lookup, self.frame_time(frame));
        if let (Some(lock), Some(root)) = (clip.root_lock, pose.first_mut()) {
            *root = match lock {
                RootLock::ReferencePose => skeleton.rest_pose(0).unwrap_or_default(),
                RootLock::FirstFrame => match self.track_lookup.first().copied().flatten() {
                    Some(track) => clip.tracks[track].sample(0.0, &skeleton.bones()[0].rest_pose),
                    None => skeleton.bones()[0].rest_pose,
                },
                RootLock::Zero => BoneTransform::IDENTITY,
            };
        }
        pose
    }

    pub(crate) fn store_frame(&mut self, frame: usize, slot: u32, pose: Vec<BoneTransform>) {
        self.slot_of_frame[frame] = Some(slot);
        self.poses[frame] = Some(pose);
    }
}
