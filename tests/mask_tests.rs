//! Bone Mask Tests
//!
//! Tests for:
//! - Per-bone weight generation with branch depth ramps
//! - Mask overlap detection
//! - Reference-counted sharing in MaskRegistry
//! - Flattened mask table layout

use std::sync::Arc;

use glam::Vec3;

use crowd::animation::{MASK_FULL, MaskDefinition, MaskRegistry};
use crowd::math::BoneTransform;
use crowd::skeleton::{Bone, MeshAsset, MeshAssetDesc, ReferenceSkeleton};

fn skeleton() -> Arc<ReferenceSkeleton> {
    Arc::new(
        ReferenceSkeleton::new(
            "biped",
            vec![
                Bone::new("root", None, BoneTransform::IDENTITY),
                Bone::new("spine", Some(0), BoneTransform::from_translation(Vec3::Y)),
                Bone::new("head", Some(1), BoneTransform::from_translation(Vec3::Y)),
                Bone::new("arm", Some(1), BoneTransform::from_translation(Vec3::X)),
                Bone::new("hand", Some(3), BoneTransform::from_translation(Vec3::X)),
            ],
        )
        .unwrap(),
    )
}

fn asset(name: &str) -> MeshAsset {
    MeshAsset::new(MeshAssetDesc::new(name, skeleton())).unwrap()
}

// ============================================================================
// Weight Generation
// ============================================================================

#[test]
fn full_body_weights_every_bone() {
    let weights = MaskDefinition::full_body().generate_weights(&skeleton());
    assert_eq!(weights, vec![MASK_FULL; 5]);
}

#[test]
fn branch_without_depth_is_full_below_root() {
    let weights = MaskDefinition::full_body()
        .with_layer("arm", 0)
        .generate_weights(&skeleton());
    assert_eq!(weights, vec![0, 0, 0, MASK_FULL, MASK_FULL]);
}

#[test]
fn branch_depth_ramps_weight() {
    let weights = MaskDefinition::full_body()
        .with_layer("spine", 3)
        .generate_weights(&skeleton());

    // spine 1/3, head and arm 2/3, hand 3/3
    assert_eq!(weights[0], 0);
    assert_eq!(weights[1], (32767.0_f32 / 3.0).round() as u16);
    assert_eq!(weights[2], (32767.0_f32 * 2.0 / 3.0).round() as u16);
    assert_eq!(weights[3], weights[2]);
    assert_eq!(weights[4], MASK_FULL);
}

#[test]
fn overlapping_branches_take_the_maximum() {
    let weights = MaskDefinition::full_body()
        .with_layer("spine", 4)
        .with_layer("arm", 0)
        .generate_weights(&skeleton());
    assert_eq!(weights[3], MASK_FULL);
    assert_eq!(weights[4], MASK_FULL);
    assert!(weights[2] < MASK_FULL);
}

#[test]
fn unknown_bones_are_ignored() {
    let weights = MaskDefinition::full_body()
        .with_layer("tail", 0)
        .generate_weights(&skeleton());
    assert_eq!(weights, vec![0; 5]);
}

// ============================================================================
// Identity & Overlap
// ============================================================================

#[test]
fn overlap_rules() {
    let full = MaskDefinition::full_body();
    let arm = MaskDefinition::full_body().with_layer("arm", 0);
    let arm_and_head = MaskDefinition::full_body().with_layer("head", 0).with_layer("arm", 2);
    let head = MaskDefinition::full_body().with_layer("head", 0);

    assert!(full.shares_bones_with(&MaskDefinition::full_body()));
    assert!(!full.shares_bones_with(&arm));
    assert!(!arm.shares_bones_with(&full));
    assert!(arm.shares_bones_with(&arm_and_head));
    assert!(!arm.shares_bones_with(&head));
}

#[test]
fn handles_depend_on_definition_and_asset() {
    let a = MaskDefinition::full_body().with_layer("arm", 2);
    let b = MaskDefinition::full_body().with_layer("arm", 2);
    let c = MaskDefinition::full_body().with_layer("arm", 3);
    assert_eq!(a.source_handle(), b.source_handle());
    assert_ne!(a.source_handle(), c.source_handle());

    let first = asset("mesh_a");
    let second = asset("mesh_b");
    assert_eq!(a.proxy_handle(&first), b.proxy_handle(&first));
    assert_ne!(a.proxy_handle(&first), a.proxy_handle(&second));
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn registry_shares_and_releases() {
    let mesh = asset("mesh");
    let mask = MaskDefinition::full_body().with_layer("arm", 0);
    let mut registry = MaskRegistry::new();

    let first = registry.acquire(&mask, &mesh);
    let second = registry.acquire(&mask, &mesh);
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.ref_count(first), 2);
    assert!(registry.is_dirty());

    registry.build_table(8);
    assert!(!registry.is_dirty());

    registry.release(first);
    assert_eq!(registry.ref_count(first), 1);
    assert!(!registry.is_dirty());

    registry.release(first);
    assert!(registry.is_empty());
    assert!(registry.is_dirty());
    assert!(registry.weights(first).is_none());
}

#[test]
fn bone_weight_is_normalized() {
    let mesh = asset("mesh");
    let mut registry = MaskRegistry::new();
    let handle = registry.acquire(&MaskDefinition::full_body().with_layer("arm", 0), &mesh);

    assert!((registry.bone_weight(handle, 3) - 1.0).abs() < 1e-6);
    assert!(registry.bone_weight(handle, 2).abs() < 1e-6);
    // Out of range bones are unmasked.
    assert!((registry.bone_weight(handle, 99) - 1.0).abs() < 1e-6);
}

#[test]
fn table_rows_are_padded_to_stride() {
    let mesh = asset("mesh");
    let mut registry = MaskRegistry::new();
    let full = registry.acquire(&MaskDefinition::full_body(), &mesh);
    let arm = registry.acquire(&MaskDefinition::full_body().with_layer("arm", 0), &mesh);

    let (table, rows) = registry.build_table(8);
    assert_eq!(table.len(), 16);
    assert_eq!(rows.len(), 2);

    let full_row = rows[&full] as usize * 8;
    assert_eq!(&table[full_row..full_row + 5], &[MASK_FULL; 5]);
    assert_eq!(&table[full_row + 5..full_row + 8], &[0; 3]);

    let arm_row = rows[&arm] as usize * 8;
    assert_eq!(&table[arm_row..arm_row + 5], &[0, 0, 0, MASK_FULL, MASK_FULL]);
}
