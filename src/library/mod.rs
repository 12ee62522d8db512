//! GPU Pose Library
//!
//! Deduplicating store of baked skeleton poses. A pose is identified by a
//! [`PoseKey`] (skeleton, mesh asset, animation) plus a sampled frame index,
//! and is baked at most once no matter how many instances request it.
//!
//! Baked poses are appended to one flat row buffer: each GPU bone takes three
//! `Vec4` rows holding its transposed 3×4 local matrix. The slot handed out for
//! a frame is the index of its first row. Rows never move, so a slot stays
//! valid for the lifetime of the library.
//!
//! ```text
//! rows: [ bind(asset A) | walk f0 | walk f5 | run f2 | walk f1 | ... ]
//!         ^slot 0         ^slot 3n  ...
//! ```
//!
//! The external upload step consumes the rows appended since its last visit
//! through [`PoseLibrary::take_new_rows`].

mod entry;

pub use entry::{LibraryEntry, PoseKey};

use std::sync::Arc;

use glam::Vec4;
use rustc_hash::FxHashMap;

use crate::animation::AnimationClip;
use crate::math::{BoneTransform, matrix_rows};
use crate::skeleton::MeshAsset;

/// Rows written per GPU bone.
pub const ROWS_PER_BONE: usize = 3;

#[derive(Debug, Default)]
pub struct PoseLibrary {
    entries: FxHashMap<PoseKey, LibraryEntry>,
    rows: Vec<Vec4>,
    flushed_rows: usize,
    bake_count: usize,
}

impl PoseLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key for (`asset`, `clip`), creating its entry on first use.
    ///
    /// `None` stands for the bind pose of the asset.
    pub fn ensure_entry(
        &mut self,
        asset: &Arc<MeshAsset>,
        clip: Option<&Arc<AnimationClip>>,
    ) -> PoseKey {
        let key = PoseKey::new(asset, clip.map(|c| &**c));
        self.entries.entry(key).or_insert_with(|| {
            let entry = LibraryEntry::new(key, Arc::clone(asset), clip.cloned());
            log::info!(
                "Pose library entry '{}' / '{}': {} frames",
                asset.name(),
                clip.map_or("<bind pose>", |c| c.name.as_str()),
                entry.max_frames()
            );
            entry
        });
        key
    }

    #[must_use]
    pub fn entry(&self, key: PoseKey) -> Option<&LibraryEntry> {
        self.entries.get(&key)
    }

    #[must_use]
    pub fn contains(&self, key: PoseKey) -> bool {
        self.entries.contains_key(&key)
    }

    #[must_use]
    pub fn max_frames(&self, key: PoseKey) -> Option<usize> {
        self.entries.get(&key).map(LibraryEntry::max_frames)
    }

    /// Slot of an already baked frame.
    #[must_use]
    pub fn slot_of_frame(&self, key: PoseKey, frame: usize) -> Option<u32> {
        self.entries.get(&key).and_then(|entry| entry.slot_of_frame(frame))
    }

    /// Returns the slot of `frame`, baking it first if needed.
    ///
    /// Returns `None` for unknown keys and frames outside the entry.
    pub fn get_or_bake_frame(&mut self, key: PoseKey, frame: usize) -> Option<u32> {
        let entry = self.entries.get_mut(&key)?;
        if frame >= entry.max_frames() {
            log::trace!("Frame {frame} outside pose entry {:016x}", key.0);
            return None;
        }
        if let Some(slot) = entry.slot_of_frame(frame) {
            return Some(slot);
        }

        let pose = entry.evaluate_frame(frame);
        let slot = self.rows.len() as u32;

        let asset = entry.asset();
        self.rows.reserve(asset.num_gpu_bones() * ROWS_PER_BONE);
        for &cpu in asset.gpu_to_cpu() {
            let local = pose.get(cpu).copied().unwrap_or(BoneTransform::IDENTITY);
            self.rows.extend_from_slice(&matrix_rows(&local.to_affine()));
        }

        entry.store_frame(frame, slot, pose);
        self.bake_count += 1;
        log::debug!("Baked pose {:016x} frame {frame} into slot {slot}", key.0);
        Some(slot)
    }

    /// Local CPU pose of a baked frame, indexed by CPU bone.
    #[must_use]
    pub fn pose(&self, key: PoseKey, frame: usize) -> Option<&[BoneTransform]> {
        self.entries.get(&key).and_then(|entry| entry.pose(frame))
    }

    /// All baked rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec4] {
        &self.rows
    }

    /// The three rows of `gpu_bone` in the pose at `slot`.
    #[must_use]
    pub fn bone_rows(&self, slot: u32, gpu_bone: usize) -> Option<[Vec4; 3]> {
        let start = slot as usize + gpu_bone * ROWS_PER_BONE;
        let rows = self.rows.get(start..start + ROWS_PER_BONE)?;
        Some([rows[0], rows[1], rows[2]])
    }

    #[inline]
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows appended since the previous call, with the index of the first one.
    pub fn take_new_rows(&mut self) -> (usize, &[Vec4]) {
        let start = self.flushed_rows;
        self.flushed_rows = self.rows.len();
        (start, &self.rows[start..])
    }

    /// Number of frames baked so far.
    #[must_use]
    pub fn bake_count(&self) -> usize {
        self.bake_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.rows.clear();
        self.flushed_rows = 0;
        self.bake_count = 0;
    }
}
