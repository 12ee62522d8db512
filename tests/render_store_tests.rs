//! Render Store Tests
//!
//! Tests for:
//! - Slot allocation and free-list reuse
//! - Per-field dirty tracking
//! - Custom data bounds checks
//! - Flush ordering and renderer bounds
//! - Owned flush snapshots
//! - Render handle identity

use glam::{Quat, Vec3};

use crowd::math::{BoneTransform, BoundingBox};
use crowd::render::{
    DirtyFields, InstanceFlags, InstanceRenderStore, RenderField, RenderHandle, RenderHandleDesc,
    RenderSink,
};

const EPSILON: f32 = 1e-5;

#[derive(Default)]
struct RecordingSink {
    uploads: Vec<(&'static str, usize)>,
    bounds: Option<BoundingBox>,
}

impl RenderSink for RecordingSink {
    fn upload(&mut self, _handle: RenderHandle, field: RenderField<'_>) {
        self.uploads.push((field.name(), field.as_bytes().len()));
    }

    fn set_bounds(&mut self, _handle: RenderHandle, bounds: &BoundingBox) {
        self.bounds = Some(*bounds);
    }
}

impl RecordingSink {
    fn names(&self) -> Vec<&'static str> {
        self.uploads.iter().map(|(name, _)| *name).collect()
    }
}

fn store() -> InstanceRenderStore<u32> {
    InstanceRenderStore::new(
        RenderHandle(7),
        BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
        4,
    )
}

// ============================================================================
// Slots
// ============================================================================

#[test]
fn allocation_appends_and_marks_size() {
    let mut store = store();
    assert_eq!(store.allocate(10), 0);
    assert_eq!(store.allocate(11), 1);
    assert_eq!(store.allocate(10), 0);

    assert_eq!(store.len(), 2);
    assert!(store.dirty().contains(DirtyFields::SIZE));
    assert!(store.flags(10).unwrap().is_alive());
}

#[test]
fn removed_slots_are_reused() {
    let mut store = store();
    store.allocate(1);
    store.allocate(2);
    store.set_custom_data(1, 0, 5.0);

    let mut sink = RecordingSink::default();
    store.flush(&mut sink);

    assert!(store.remove(1));
    assert!(!store.remove(1));
    assert_eq!(store.free_slots(), &[0]);

    assert_eq!(store.allocate(3), 0);
    assert_eq!(store.custom_data(3).unwrap(), &[0.0; 4]);
    assert!(store.flags(3).unwrap().is_alive());
    assert_eq!(store.dirty(), DirtyFields::FLAGS | DirtyFields::CUSTOM_DATA);
    assert_eq!(store.capacity(), 2);
}

#[test]
fn removal_clears_only_the_alive_bit() {
    let mut store = store();
    store.allocate(1);
    store.set_flags(1, InstanceFlags::alive(5));
    store.flush(&mut RecordingSink::default());

    assert!(store.remove(1));
    let flush = store.take_flush().unwrap();
    assert_eq!(flush.dirty, DirtyFields::FLAGS);

    let flags = InstanceFlags::from_bits_retain(flush.flags[0]);
    assert!(!flags.is_alive());
    assert_eq!(flags.bone_index(), 5);
}

// ============================================================================
// Dirty Tracking
// ============================================================================

#[test]
fn only_changed_transform_fields_are_dirty() {
    let mut store = store();
    store.allocate(1);
    let transform = BoneTransform::new(Vec3::X, Quat::IDENTITY, Vec3::ONE);
    store.update_transform(1, &transform, true);
    store.flush(&mut RecordingSink::default());

    store.update_transform(1, &transform, false);
    assert!(store.dirty().is_empty());

    let moved = BoneTransform {
        translation: Vec3::new(2.0, 0.0, 0.0),
        ..transform
    };
    store.update_transform(1, &moved, false);
    assert_eq!(store.dirty(), DirtyFields::POSITION);

    store.update_transform(1, &moved, true);
    assert_eq!(
        store.dirty(),
        DirtyFields::POSITION | DirtyFields::ROTATION | DirtyFields::SCALE
    );
}

#[test]
fn unchanged_flags_and_skeleton_index_stay_clean() {
    let mut store = store();
    store.allocate(1);
    store.flush(&mut RecordingSink::default());

    store.set_flags(1, InstanceFlags::alive(0));
    store.set_skeleton_index(1, 0);
    assert!(store.dirty().is_empty());

    store.set_flags(1, InstanceFlags::alive(5));
    store.set_skeleton_index(1, 48);
    assert_eq!(store.dirty(), DirtyFields::FLAGS | DirtyFields::SKELETON_INDEX);
    assert_eq!(store.flags(1).unwrap().bone_index(), 5);
}

// ============================================================================
// Custom Data
// ============================================================================

#[test]
fn custom_data_index_is_bounded_by_width() {
    let mut store = store();
    store.allocate(1);

    assert!(store.set_custom_data(1, 3, 1.5));
    assert!(!store.set_custom_data(1, 4, 1.5));
    assert!(!store.set_custom_data(99, 0, 1.5));
    assert_eq!(store.custom_data(1).unwrap(), &[0.0, 0.0, 0.0, 1.5]);
}

#[test]
fn custom_data_array_is_truncated() {
    let mut store = store();
    store.allocate(1);
    store.allocate(2);

    assert!(store.set_custom_data_array(1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    assert_eq!(store.custom_data(1).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(store.custom_data(2).unwrap(), &[0.0; 4]);

    assert!(store.set_custom_data_array(2, &[9.0]));
    assert_eq!(store.custom_data(2).unwrap(), &[9.0, 0.0, 0.0, 0.0]);
}

#[test]
fn unchanged_custom_data_stays_clean() {
    let mut store = store();
    store.allocate(1);
    store.set_custom_data_array(1, &[1.0, 2.0]);
    store.flush(&mut RecordingSink::default());

    assert!(store.set_custom_data(1, 0, 1.0));
    assert!(store.set_custom_data_array(1, &[1.0, 2.0, 0.0]));
    assert!(store.dirty().is_empty());

    assert!(store.set_custom_data(1, 3, 0.5));
    assert_eq!(store.dirty(), DirtyFields::CUSTOM_DATA);
    store.flush(&mut RecordingSink::default());

    assert!(store.set_custom_data_array(1, &[1.0, 4.0]));
    assert_eq!(store.dirty(), DirtyFields::CUSTOM_DATA);
    assert_eq!(store.custom_data(1).unwrap(), &[1.0, 4.0, 0.0, 0.5]);
}

// ============================================================================
// Flush
// ============================================================================

#[test]
fn size_change_flushes_every_field() {
    let mut store = store();
    store.allocate(1);

    let mut sink = RecordingSink::default();
    assert!(store.flush(&mut sink));
    assert_eq!(
        sink.names(),
        vec!["position", "rotation", "scale", "flags", "custom_data", "skeleton_index"]
    );
    assert_eq!(sink.uploads[0].1, 12);
    assert_eq!(sink.uploads[4].1, 16);

    let mut sink = RecordingSink::default();
    assert!(!store.flush(&mut sink));
    assert!(sink.uploads.is_empty());
    assert!(sink.bounds.is_none());
}

#[test]
fn partial_flush_sends_dirty_fields_only() {
    let mut store = store();
    store.allocate(1);
    store.flush(&mut RecordingSink::default());

    store.set_custom_data(1, 0, 1.0);
    let mut sink = RecordingSink::default();
    store.flush(&mut sink);
    assert_eq!(sink.names(), vec!["custom_data"]);
    assert!(sink.bounds.is_some());
}

#[test]
fn taken_flush_copies_dirty_arrays_only() {
    let mut store = store();
    store.allocate(1);
    store.allocate(2);
    store.flush(&mut RecordingSink::default());

    store.update_transform(
        2,
        &BoneTransform::from_translation(Vec3::new(3.0, 0.0, 0.0)),
        false,
    );
    let flush = store.take_flush().unwrap();
    assert!(store.dirty().is_empty());
    assert!(store.take_flush().is_none());

    assert_eq!(flush.handle, RenderHandle(7));
    assert_eq!(flush.dirty, DirtyFields::POSITION);
    assert_eq!(flush.positions.len(), 2);
    assert!(flush.positions[1].abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), EPSILON));
    assert!(flush.rotations.is_empty());
    assert!(flush.custom_data.is_empty());

    let mut sink = RecordingSink::default();
    flush.send(&mut sink);
    assert_eq!(sink.names(), vec!["position"]);
    assert_eq!(sink.bounds, Some(flush.bounds));
}

#[test]
fn bounds_cover_scaled_instances() {
    let mut store = store();
    store.allocate(1);
    store.allocate(2);
    store.update_transform(1, &BoneTransform::IDENTITY, true);
    store.update_transform(
        2,
        &BoneTransform::new(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, Vec3::splat(2.0)),
        true,
    );

    let mut sink = RecordingSink::default();
    store.flush(&mut sink);

    let bounds = sink.bounds.unwrap();
    assert!(bounds.min.abs_diff_eq(Vec3::new(-1.0, -2.0, -2.0), EPSILON));
    assert!(bounds.max.abs_diff_eq(Vec3::new(12.0, 2.0, 2.0), EPSILON));
    assert_eq!(*store.bounds(), bounds);
}

// ============================================================================
// Render Handles
// ============================================================================

#[test]
fn render_handle_depends_on_every_input() {
    let base = RenderHandleDesc::new("soldier");
    assert_eq!(base.handle(), RenderHandleDesc::new("soldier").handle());
    assert_ne!(base.handle(), RenderHandleDesc::new("archer").handle());
    assert_ne!(base.handle(), base.clone().with_material("red").handle());

    let mut no_decals = base.clone();
    no_decals.receives_decals = !base.receives_decals;
    assert_ne!(base.handle(), no_decals.handle());
}
