//! Bone masks (layer masks).
//!
//! A [`MaskDefinition`] is a list of branch filters. Resolved against a mesh
//! asset it becomes a per-CPU-bone weight array in 15-bit fixed point. Built
//! arrays are shared by every layer using the same (definition, asset) pair
//! through the reference-counted [`MaskRegistry`].

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::Xxh3;

use crate::math::WEIGHT_SCALE;
use crate::skeleton::{MeshAsset, ReferenceSkeleton};
use crate::utils::interner::{self, Symbol};

/// Full weight in mask fixed point.
pub const MASK_FULL: u16 = 0x7FFF;

/// A branch filter: `bone` and everything below it.
///
/// Weight ramps from `1 / depth` at the branch bone to full weight `depth - 1`
/// levels below it. A depth of zero or less applies full weight everywhere in
/// the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneLayer {
    pub bone: Symbol,
    pub depth: i32,
}

impl BoneLayer {
    #[must_use]
    pub fn new(bone_name: &str, depth: i32) -> Self {
        Self {
            bone: interner::intern(bone_name),
            depth,
        }
    }

    #[must_use]
    pub fn bone_name(&self) -> &'static str {
        interner::resolve(self.bone)
    }

    fn weight_at(&self, depth_below: usize) -> f32 {
        if self.depth <= 0 {
            1.0
        } else {
            ((depth_below + 1) as f32 / self.depth as f32).min(1.0)
        }
    }
}

/// Identity of a mask definition, also used as the weight normalization group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskSourceHandle(pub u64);

/// Identity of a mask definition resolved against one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskProxyHandle(pub u64);

/// Ordered branch filters. Empty means "whole body".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskDefinition {
    pub layers: SmallVec<[BoneLayer; 4]>,
}

impl MaskDefinition {
    #[must_use]
    pub fn full_body() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_layer(mut self, bone_name: &str, depth: i32) -> Self {
        self.layers.push(BoneLayer::new(bone_name, depth));
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[must_use]
    pub fn source_handle(&self) -> MaskSourceHandle {
        let mut hasher = Xxh3::new();
        for layer in &self.layers {
            hasher.update(layer.bone_name().as_bytes());
            hasher.update(&layer.depth.to_le_bytes());
        }
        MaskSourceHandle(hasher.digest())
    }

    #[must_use]
    pub fn proxy_handle(&self, asset: &MeshAsset) -> MaskProxyHandle {
        let mut hasher = Xxh3::new();
        hasher.update(&self.source_handle().0.to_le_bytes());
        hasher.update(&asset.id().to_le_bytes());
        MaskProxyHandle(hasher.digest())
    }

    /// Whether two masks affect a common branch. Two whole-body masks match.
    #[must_use]
    pub fn shares_bones_with(&self, other: &MaskDefinition) -> bool {
        if self.is_empty() && other.is_empty() {
            return true;
        }
        self.layers
            .iter()
            .any(|layer| other.layers.iter().any(|o| o.bone == layer.bone))
    }

    /// Per-CPU-bone weights of this mask on `skeleton`.
    #[must_use]
    pub fn generate_weights(&self, skeleton: &ReferenceSkeleton) -> Vec<u16> {
        let count = skeleton.num_bones();
        if self.is_empty() {
            return vec![MASK_FULL; count];
        }

        let branches: SmallVec<[(usize, &BoneLayer); 4]> = self
            .layers
            .iter()
            .filter_map(|layer| match skeleton.find_bone_symbol(layer.bone) {
                Some(index) => Some((index, layer)),
                None => {
                    log::warn!("Bone mask references unknown bone '{}'", layer.bone_name());
                    None
                }
            })
            .collect();

        (0..count)
            .map(|bone| {
                let weight = branches
                    .iter()
                    .filter_map(|(root, layer)| {
                        skeleton.depth_below(bone, *root).map(|d| layer.weight_at(d))
                    })
                    .fold(0.0_f32, f32::max);
                (weight * WEIGHT_SCALE).round() as u16
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct BuiltMask {
    weights: Vec<u16>,
    ref_count: u32,
}

/// Shared, reference-counted built masks.
#[derive(Debug, Default)]
pub struct MaskRegistry {
    masks: FxHashMap<MaskProxyHandle, BuiltMask>,
    dirty: bool,
}

impl MaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reference on the mask for `definition` on `asset`, building it
    /// on first use.
    pub fn acquire(&mut self, definition: &MaskDefinition, asset: &MeshAsset) -> MaskProxyHandle {
        let handle = definition.proxy_handle(asset);
        if let Some(mask) = self.masks.get_mut(&handle) {
            mask.ref_count += 1;
        } else {
            let weights = definition.generate_weights(asset.skeleton());
            log::debug!("Built bone mask {:016x} for '{}'", handle.0, asset.name());
            self.masks.insert(
                handle,
                BuiltMask {
                    weights,
                    ref_count: 1,
                },
            );
            self.dirty = true;
        }
        handle
    }

    /// Drops a reference; the mask is discarded with its last reference.
    pub fn release(&mut self, handle: MaskProxyHandle) {
        let Some(mask) = self.masks.get_mut(&handle) else {
            return;
        };
        mask.ref_count = mask.ref_count.saturating_sub(1);
        if mask.ref_count == 0 {
            self.masks.remove(&handle);
            self.dirty = true;
        }
    }

    #[must_use]
    pub fn weights(&self, handle: MaskProxyHandle) -> Option<&[u16]> {
        self.masks.get(&handle).map(|mask| mask.weights.as_slice())
    }

    /// Weight of `bone` in `[0, 1]`; unknown masks and bones are unmasked.
    #[must_use]
    pub fn bone_weight(&self, handle: MaskProxyHandle, bone: usize) -> f32 {
        self.masks
            .get(&handle)
            .and_then(|mask| mask.weights.get(bone))
            .map_or(1.0, |&w| f32::from(w) / WEIGHT_SCALE)
    }

    #[must_use]
    pub fn ref_count(&self, handle: MaskProxyHandle) -> u32 {
        self.masks.get(&handle).map_or(0, |mask| mask.ref_count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Whether masks were added or removed since the last table build.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Flattens every mask into one table of `stride` entries per mask,
    /// padded with zero weight, and returns each mask's row.
    pub fn build_table(&mut self, stride: usize) -> (Vec<u16>, FxHashMap<MaskProxyHandle, u32>) {
        let mut handles: Vec<MaskProxyHandle> = self.masks.keys().copied().collect();
        handles.sort_unstable();

        let mut table = Vec::with_capacity(handles.len() * stride);
        let mut index_of = FxHashMap::default();
        for (row, handle) in handles.iter().enumerate() {
            let weights = &self.masks[handle].weights;
            table.extend(weights.iter().take(stride));
            table.resize((row + 1) * stride, 0);
            index_of.insert(*handle, row as u32);
        }

        self.dirty = false;
        (table, index_of)
    }
}
