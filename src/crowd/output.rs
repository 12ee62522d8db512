//! Per-frame arrays for the external GPU dispatch.
//!
//! All per-instance data is flattened into segments: instance `i` owns
//! `keyframes[animation_segments[i][0]..animation_segments[i][1]]` and the
//! matching IK range. Every array carries one sentinel entry when it would
//! otherwise be empty, so the consumer never binds a zero-sized buffer; the
//! real counts are in the `*_count` fields.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::crowd::handles::InstanceHandle;
use crate::remap::BoneRemapRow;

/// One layer contribution of one instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct KeyframeEntry {
    /// Library slot of the frame before the play position, `-1` if unbaked
    pub frame0_slot: i32,
    pub frame1_slot: i32,
    /// Interpolation alpha × 0x7FFF
    pub alpha: i32,
    /// Applied weight × 0x7FFF
    pub weight: i32,
    /// Row of the layer mask in the mask table
    pub mask_index: i32,
}

impl KeyframeEntry {
    pub const SENTINEL: Self = Self {
        frame0_slot: -1,
        frame1_slot: -1,
        alpha: 0,
        weight: 0,
        mask_index: -1,
    };
}

/// Everything the GPU stage needs for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub frame: u64,
    pub instance_count: usize,
    /// Visible instances in output order
    pub instances: Vec<InstanceHandle>,

    /// Per instance: first row of its range in the bone texture
    pub skeleton_indices: Vec<u32>,
    /// Per instance: block index of its asset in the remap tables
    pub asset_indices: Vec<u32>,
    /// Per instance: `[start, end)` into `keyframes`
    pub animation_segments: Vec<[u32; 2]>,
    pub keyframe_count: usize,
    pub keyframes: Vec<KeyframeEntry>,

    /// Per instance: `[start, end)` into `ik_bones` / `ik_rows`
    pub ik_segments: Vec<[u32; 2]>,
    pub ik_count: usize,
    /// GPU bone of each override
    pub ik_bones: Vec<i32>,
    /// Component-space override matrices, three rows each
    pub ik_rows: Vec<Vec4>,

    /// Entries per asset block in `remap` / `inverse_rest`
    pub max_cpu_bones: usize,
    pub remap: Vec<BoneRemapRow>,
    pub inverse_rest: Vec<Vec4>,
    pub remap_changed: bool,

    /// Entries per mask row in `mask_table`
    pub mask_stride: usize,
    pub mask_table: Vec<u16>,
    pub masks_changed: bool,

    /// Index of the first row in `new_rows` within the pose library
    pub new_rows_start: usize,
    /// Pose rows baked since the previous frame output
    pub new_rows: Vec<Vec4>,
    pub total_rows: usize,
}

impl FrameOutput {
    /// Pads every empty array with one sentinel entry.
    pub(crate) fn pad_empty(&mut self) {
        fn pad<T: Copy>(values: &mut Vec<T>, sentinel: &[T]) {
            if values.is_empty() {
                values.extend_from_slice(sentinel);
            }
        }

        pad(&mut self.skeleton_indices, &[u32::MAX]);
        pad(&mut self.asset_indices, &[u32::MAX]);
        pad(&mut self.animation_segments, &[[0, 0]]);
        pad(&mut self.keyframes, &[KeyframeEntry::SENTINEL]);
        pad(&mut self.ik_segments, &[[0, 0]]);
        pad(&mut self.ik_bones, &[-1]);
        pad(&mut self.ik_rows, &[Vec4::X, Vec4::Y, Vec4::Z]);
        pad(&mut self.remap, &[BoneRemapRow::SENTINEL]);
        pad(&mut self.inverse_rest, &[Vec4::X, Vec4::Y, Vec4::Z]);
        pad(&mut self.mask_table, &[0]);
        pad(&mut self.new_rows, &[Vec4::ZERO]);
    }

    #[must_use]
    pub fn keyframe_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.keyframes)
    }

    #[must_use]
    pub fn remap_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.remap)
    }

    #[must_use]
    pub fn new_row_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.new_rows)
    }

    /// Keyframes of the `index`-th output instance.
    #[must_use]
    pub fn instance_keyframes(&self, index: usize) -> &[KeyframeEntry] {
        match self.animation_segments.get(index) {
            Some(&[start, end]) if index < self.instance_count => {
                &self.keyframes[start as usize..end as usize]
            }
            _ => &[],
        }
    }
}

/// External consumer of finalized frame arrays.
pub trait DispatchSink {
    fn dispatch(&mut self, frame: &FrameOutput);
}
