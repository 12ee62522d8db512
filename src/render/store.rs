use std::hash::Hash;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::math::{BoneTransform, BoundingBox};
use crate::render::flags::{DirtyFields, InstanceFlags};
use crate::render::handle::RenderHandle;
use crate::render::sink::{RenderField, RenderSink};

/// Dense per-instance arrays of one renderer.
///
/// Slots are recycled through a free list, so the arrays only grow. A slot is
/// either owned by exactly one key or sits in the free list with its alive
/// bit cleared. Every setter marks a field dirty only when a value changes.
#[derive(Debug)]
pub struct InstanceRenderStore<K> {
    handle: RenderHandle,
    mesh_bounds: BoundingBox,
    custom_data_width: usize,

    slots: FxHashMap<K, u32>,
    free: Vec<u32>,

    positions: Vec<Vec3>,
    rotations: Vec<Quat>,
    scales: Vec<Vec3>,
    flags: Vec<u8>,
    custom_data: Vec<f32>,
    skeleton_indices: Vec<u32>,

    dirty: DirtyFields,
    bounds: BoundingBox,
}

impl<K: Copy + Eq + Hash> InstanceRenderStore<K> {
    #[must_use]
    pub fn new(handle: RenderHandle, mesh_bounds: BoundingBox, custom_data_width: usize) -> Self {
        Self {
            handle,
            mesh_bounds,
            custom_data_width,
            slots: FxHashMap::default(),
            free: Vec::new(),
            positions: Vec::new(),
            rotations: Vec::new(),
            scales: Vec::new(),
            flags: Vec::new(),
            custom_data: Vec::new(),
            skeleton_indices: Vec::new(),
            dirty: DirtyFields::empty(),
            bounds: BoundingBox::EMPTY,
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> RenderHandle {
        self.handle
    }

    /// Number of live slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Length of the per-instance arrays, live and free slots included.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn slot(&self, key: K) -> Option<u32> {
        self.slots.get(&key).copied()
    }

    #[must_use]
    pub fn free_slots(&self) -> &[u32] {
        &self.free
    }

    #[must_use]
    pub fn dirty(&self) -> DirtyFields {
        self.dirty
    }

    #[must_use]
    pub fn custom_data_width(&self) -> usize {
        self.custom_data_width
    }

    /// Returns the slot of `key`, reusing a free slot when possible.
    pub fn allocate(&mut self, key: K) -> u32 {
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }

        let slot = if let Some(slot) = self.free.pop() {
            let index = slot as usize;
            self.flags[index] = InstanceFlags::alive(0).bits();
            let range = self.custom_range(index);
            self.custom_data[range].fill(0.0);
            self.dirty |= DirtyFields::FLAGS | DirtyFields::CUSTOM_DATA;
            slot
        } else {
            let slot = self.flags.len() as u32;
            self.positions.push(Vec3::ZERO);
            self.rotations.push(Quat::IDENTITY);
            self.scales.push(Vec3::ONE);
            self.flags.push(InstanceFlags::alive(0).bits());
            self.custom_data
                .resize(self.custom_data.len() + self.custom_data_width, 0.0);
            self.skeleton_indices.push(0);
            self.dirty |= DirtyFields::SIZE;
            slot
        };

        self.slots.insert(key, slot);
        slot
    }

    /// Frees the slot of `key`.
    pub fn remove(&mut self, key: K) -> bool {
        let Some(slot) = self.slots.remove(&key) else {
            return false;
        };
        self.flags[slot as usize] &= !InstanceFlags::ALIVE.bits();
        self.free.push(slot);
        self.dirty |= DirtyFields::FLAGS;
        true
    }

    /// Writes position, rotation and scale, marking only changed fields
    /// unless `force` is set.
    pub fn update_transform(&mut self, key: K, transform: &BoneTransform, force: bool) -> bool {
        let Some(index) = self.index(key) else {
            return false;
        };

        if force || self.positions[index] != transform.translation {
            self.positions[index] = transform.translation;
            self.dirty |= DirtyFields::POSITION;
        }
        if force || self.rotations[index] != transform.rotation {
            self.rotations[index] = transform.rotation;
            self.dirty |= DirtyFields::ROTATION;
        }
        if force || self.scales[index] != transform.scale {
            self.scales[index] = transform.scale;
            self.dirty |= DirtyFields::SCALE;
        }
        true
    }

    pub fn set_flags(&mut self, key: K, flags: InstanceFlags) -> bool {
        let Some(index) = self.index(key) else {
            return false;
        };
        if self.flags[index] != flags.bits() {
            self.flags[index] = flags.bits();
            self.dirty |= DirtyFields::FLAGS;
        }
        true
    }

    #[must_use]
    pub fn flags(&self, key: K) -> Option<InstanceFlags> {
        self.index(key)
            .map(|index| InstanceFlags::from_bits_retain(self.flags[index]))
    }

    pub fn set_skeleton_index(&mut self, key: K, skeleton_index: u32) -> bool {
        let Some(index) = self.index(key) else {
            return false;
        };
        if self.skeleton_indices[index] != skeleton_index {
            self.skeleton_indices[index] = skeleton_index;
            self.dirty |= DirtyFields::SKELETON_INDEX;
        }
        true
    }

    /// Writes one custom float. Indices at or beyond the width are rejected.
    pub fn set_custom_data(&mut self, key: K, index: usize, value: f32) -> bool {
        if index >= self.custom_data_width {
            return false;
        }
        let Some(slot) = self.index(key) else {
            return false;
        };
        let current = &mut self.custom_data[slot * self.custom_data_width + index];
        if *current != value {
            *current = value;
            self.dirty |= DirtyFields::CUSTOM_DATA;
        }
        true
    }

    /// Writes custom floats from index 0, truncated to the width.
    pub fn set_custom_data_array(&mut self, key: K, values: &[f32]) -> bool {
        let Some(slot) = self.index(key) else {
            return false;
        };
        let count = values.len().min(self.custom_data_width);
        let start = slot * self.custom_data_width;
        let current = &mut self.custom_data[start..start + count];
        if *current != values[..count] {
            current.copy_from_slice(&values[..count]);
            self.dirty |= DirtyFields::CUSTOM_DATA;
        }
        true
    }

    #[must_use]
    pub fn custom_data(&self, key: K) -> Option<&[f32]> {
        self.index(key)
            .map(|index| &self.custom_data[self.custom_range(index)])
    }

    #[must_use]
    pub fn transform(&self, key: K) -> Option<BoneTransform> {
        self.index(key).map(|index| {
            BoneTransform::new(self.positions[index], self.rotations[index], self.scales[index])
        })
    }

    /// Bounds of the live instances at the last flush.
    #[must_use]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Recomputes the renderer bounds from scratch.
    pub fn refresh_bounds(&mut self) {
        self.bounds = BoundingBox::EMPTY;
        for &slot in self.slots.values() {
            let index = slot as usize;
            let scale = self.scales[index].abs().max_element();
            let position = self.positions[index];
            self.bounds.expand(position + self.mesh_bounds.min * scale);
            self.bounds.expand(position + self.mesh_bounds.max * scale);
        }
    }

    /// Copies every dirty array (all of them after a size change) and the
    /// refreshed bounds, then clears the dirty fields. Returns `None` when
    /// nothing changed.
    pub fn take_flush(&mut self) -> Option<RenderFlush> {
        if self.dirty.is_empty() {
            return None;
        }

        let dirty = if self.dirty.contains(DirtyFields::SIZE) {
            DirtyFields::all()
        } else {
            self.dirty
        };
        fn copy<T: Clone>(dirty: DirtyFields, field: DirtyFields, values: &[T]) -> Vec<T> {
            if dirty.contains(field) {
                values.to_vec()
            } else {
                Vec::new()
            }
        }

        self.refresh_bounds();
        let flush = RenderFlush {
            handle: self.handle,
            dirty,
            positions: copy(dirty, DirtyFields::POSITION, &self.positions),
            rotations: copy(dirty, DirtyFields::ROTATION, &self.rotations),
            scales: copy(dirty, DirtyFields::SCALE, &self.scales),
            flags: copy(dirty, DirtyFields::FLAGS, &self.flags),
            custom_data: copy(dirty, DirtyFields::CUSTOM_DATA, &self.custom_data),
            skeleton_indices: copy(dirty, DirtyFields::SKELETON_INDEX, &self.skeleton_indices),
            bounds: self.bounds,
        };
        log::trace!("Flushed render store {:016x}: {:?}", self.handle.0, dirty);

        self.dirty = DirtyFields::empty();
        Some(flush)
    }

    /// [`take_flush`](Self::take_flush) sent straight to `sink`. Returns
    /// whether anything was sent.
    pub fn flush<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        self.take_flush().map(|flush| flush.send(sink)).is_some()
    }

    fn index(&self, key: K) -> Option<usize> {
        self.slots.get(&key).map(|&slot| slot as usize)
    }

    fn custom_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.custom_data_width;
        start..start + self.custom_data_width
    }
}

/// Owned copy of the dirty arrays of one render store.
///
/// Arrays of clean fields are left empty. Taken under the crowd lock and sent
/// to the [`RenderSink`] after it is released.
#[derive(Debug, Clone)]
pub struct RenderFlush {
    pub handle: RenderHandle,
    pub dirty: DirtyFields,
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
    pub flags: Vec<u8>,
    pub custom_data: Vec<f32>,
    pub skeleton_indices: Vec<u32>,
    pub bounds: BoundingBox,
}

impl RenderFlush {
    /// Uploads the dirty fields in declaration order, then the bounds.
    pub fn send<S: RenderSink + ?Sized>(&self, sink: &mut S) {
        let fields = [
            (DirtyFields::POSITION, RenderField::Position(&self.positions)),
            (DirtyFields::ROTATION, RenderField::Rotation(&self.rotations)),
            (DirtyFields::SCALE, RenderField::Scale(&self.scales)),
            (DirtyFields::FLAGS, RenderField::Flags(&self.flags)),
            (DirtyFields::CUSTOM_DATA, RenderField::CustomData(&self.custom_data)),
            (
                DirtyFields::SKELETON_INDEX,
                RenderField::SkeletonIndex(&self.skeleton_indices),
            ),
        ];
        for (flag, field) in fields {
            if self.dirty.contains(flag) {
                sink.upload(self.handle, field);
            }
        }
        sink.set_bounds(self.handle, &self.bounds);
    }
}
