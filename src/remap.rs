//! Shared bone remap tables.
//!
//! Every distinct mesh asset contributes one block of `max_cpu_bones` rows to
//! the remap table and the same number of 3-row triplets to the inverse rest
//! pose table. Blocks are laid out in the order the assets are passed to
//! [`BoneRemapBuilder::rebuild`]; the block index is the asset index written
//! into the per-instance output.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use rustc_hash::FxHashMap;

use crate::math::matrix_rows;
use crate::skeleton::MeshAsset;

/// Padding value of unused remap entries.
pub const REMAP_SENTINEL: i32 = -1;

/// Remap entry of one CPU bone.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BoneRemapRow {
    pub cpu_bone: i32,
    /// `-1` when the bone is not skinned
    pub gpu_bone: i32,
    pub parent_read: i32,
    pub parent_write: i32,
}

impl BoneRemapRow {
    pub const SENTINEL: Self = Self {
        cpu_bone: REMAP_SENTINEL,
        gpu_bone: REMAP_SENTINEL,
        parent_read: REMAP_SENTINEL,
        parent_write: REMAP_SENTINEL,
    };
}

#[derive(Debug)]
pub struct BoneRemapBuilder {
    dirty: bool,
    max_cpu_bones: usize,
    max_gpu_bones: usize,
    rows: Vec<BoneRemapRow>,
    inverse_rest: Vec<Vec4>,
    asset_index: FxHashMap<u64, u32>,
}

impl Default for BoneRemapBuilder {
    fn default() -> Self {
        Self {
            dirty: true,
            max_cpu_bones: 0,
            max_gpu_bones: 0,
            rows: Vec::new(),
            inverse_rest: Vec::new(),
            asset_index: FxHashMap::default(),
        }
    }
}

impl BoneRemapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuilds both tables if marked dirty. Returns whether a rebuild ran.
    pub fn rebuild(&mut self, assets: &[Arc<MeshAsset>]) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        self.max_cpu_bones = assets.iter().map(|a| a.num_cpu_bones()).max().unwrap_or(0);
        self.max_gpu_bones = assets.iter().map(|a| a.num_gpu_bones()).max().unwrap_or(0);

        self.rows.clear();
        self.inverse_rest.clear();
        self.asset_index.clear();
        self.rows.reserve(assets.len() * self.max_cpu_bones);
        self.inverse_rest.reserve(assets.len() * self.max_cpu_bones * 3);

        for (index, asset) in assets.iter().enumerate() {
            self.asset_index.insert(asset.id(), index as u32);

            let cache = asset.parent_cache();
            let skeleton = asset.skeleton();
            for cpu in 0..asset.num_cpu_bones() {
                let row = match asset.gpu_bone_index(cpu) {
                    Some(gpu) => BoneRemapRow {
                        cpu_bone: cpu as i32,
                        gpu_bone: gpu as i32,
                        parent_read: cache.read.get(gpu as usize).copied().unwrap_or(REMAP_SENTINEL),
                        parent_write: cache.write.get(gpu as usize).copied().unwrap_or(REMAP_SENTINEL),
                    },
                    None => BoneRemapRow {
                        cpu_bone: cpu as i32,
                        ..BoneRemapRow::SENTINEL
                    },
                };
                self.rows.push(row);
                self.inverse_rest
                    .extend_from_slice(&matrix_rows(&skeleton.component_rest_matrix(cpu).inverse()));
            }

            let padding = self.max_cpu_bones - asset.num_cpu_bones();
            self.rows.extend(std::iter::repeat_n(BoneRemapRow::SENTINEL, padding));
            for _ in 0..padding {
                self.inverse_rest.extend_from_slice(&[Vec4::X, Vec4::Y, Vec4::Z]);
            }
        }

        log::info!(
            "Rebuilt bone remap: {} assets, {} max CPU bones, {} max GPU bones",
            assets.len(),
            self.max_cpu_bones,
            self.max_gpu_bones
        );
        true
    }

    #[must_use]
    pub fn max_cpu_bones(&self) -> usize {
        self.max_cpu_bones
    }

    #[must_use]
    pub fn max_gpu_bones(&self) -> usize {
        self.max_gpu_bones
    }

    #[must_use]
    pub fn rows(&self) -> &[BoneRemapRow] {
        &self.rows
    }

    /// Inverse component-space rest matrices, three rows per bone.
    #[must_use]
    pub fn inverse_rest_rows(&self) -> &[Vec4] {
        &self.inverse_rest
    }

    /// Block index of an asset in the last rebuild.
    #[must_use]
    pub fn asset_index(&self, asset_id: u64) -> Option<u32> {
        self.asset_index.get(&asset_id).copied()
    }

    /// Remap entry of `cpu_bone` in the block of `asset_index`.
    #[must_use]
    pub fn row(&self, asset_index: u32, cpu_bone: usize) -> Option<&BoneRemapRow> {
        if cpu_bone >= self.max_cpu_bones {
            return None;
        }
        self.rows.get(asset_index as usize * self.max_cpu_bones + cpu_bone)
    }
}
