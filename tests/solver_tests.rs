//! Animation Solver Tests
//!
//! Tests for:
//! - Bind-pose layer lifetime and weight
//! - Looping time advance and loop counting
//! - Blend-in / blend-out weights and one-shot removal
//! - Weight normalization per mask group
//! - Force modes and automatic blend-out of overlapping layers
//! - Self-managed time, tick gating and priority queries
//! - Root motion extraction, wrapping and mode filtering

use std::sync::Arc;

use glam::Vec3;

use crowd::animation::{
    AnimationClip, AnimationState, BIND_POSE_ID, BoneTrack, ForceMode, KeyframeTrack,
    ManagementMode, MaskDefinition, MaskRegistry, PlayOptions, PlaySettings, RootLock,
    RootMotionMode,
};
use crowd::library::PoseLibrary;
use crowd::math::BoneTransform;
use crowd::skeleton::{Bone, MeshAsset, MeshAssetDesc, ReferenceSkeleton};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn test_asset() -> Arc<MeshAsset> {
    let skeleton = ReferenceSkeleton::new(
        "biped",
        vec![
            Bone::new("root", None, BoneTransform::IDENTITY),
            Bone::new("spine", Some(0), BoneTransform::from_translation(Vec3::Y)),
            Bone::new("head", Some(1), BoneTransform::from_translation(Vec3::Y)),
            Bone::new("arm", Some(1), BoneTransform::from_translation(Vec3::X)),
        ],
    )
    .unwrap();
    Arc::new(MeshAsset::new(MeshAssetDesc::new("biped_mesh", Arc::new(skeleton))).unwrap())
}

fn clip(name: &str, looping: bool) -> Arc<AnimationClip> {
    let track = BoneTrack::new("spine").with_translation(KeyframeTrack::linear(&[
        (0.0, Vec3::Y),
        (1.0, Vec3::new(0.0, 2.0, 0.0)),
    ]));
    Arc::new(AnimationClip::new(name, vec![track]).with_looping(looping))
}

struct Fixture {
    asset: Arc<MeshAsset>,
    library: PoseLibrary,
    masks: MaskRegistry,
    state: AnimationState,
    frame: u64,
}

impl Fixture {
    fn new() -> Self {
        let asset = test_asset();
        let mut library = PoseLibrary::new();
        let mut masks = MaskRegistry::new();
        let state = AnimationState::new(&asset, &mut library, &mut masks);
        Self {
            asset,
            library,
            masks,
            state,
            frame: 0,
        }
    }

    fn play(&mut self, clip: &Arc<AnimationClip>, settings: PlaySettings) -> crowd::AnimationId {
        self.state.play(
            &self.asset,
            Some(clip),
            settings,
            PlayOptions::default(),
            &mut self.library,
            &mut self.masks,
        )
    }

    fn solve(&mut self, delta: f32) -> bool {
        self.frame += 1;
        self.state.solve(delta, self.frame, &mut self.library, &mut self.masks)
    }

    fn total_weight(&self) -> f32 {
        self.state.layers().iter().map(|layer| layer.final_weight()).sum()
    }
}

// ============================================================================
// Bind Pose
// ============================================================================

#[test]
fn bind_pose_alone_takes_full_weight() {
    let mut fx = Fixture::new();
    assert!(fx.solve(1.0 / 60.0));

    let layers = fx.state.layers();
    assert_eq!(layers.len(), 1);
    assert!(layers[0].is_bind_pose());
    assert!(approx(layers[0].final_weight(), 1.0));
    assert_eq!(layers[0].slots(), [Some(0), Some(0)]);
}

#[test]
fn bind_pose_cannot_be_removed() {
    let mut fx = Fixture::new();
    assert!(!fx.state.remove_animation(BIND_POSE_ID, &mut fx.masks));
    assert!(!fx.state.set_animation_time(BIND_POSE_ID, 0.5));

    let removed = fx.state.clear_animations(
        ForceMode::AllLayers,
        &MaskDefinition::full_body(),
        &mut fx.masks,
        |_| true,
    );
    assert_eq!(removed, 0);
    assert_eq!(fx.state.layers().len(), 1);
}

#[test]
fn bind_pose_time_stays_at_zero() {
    let mut fx = Fixture::new();
    for _ in 0..10 {
        fx.solve(0.1);
    }
    assert!(approx(fx.state.layers()[0].time(), 0.0));
}

// ============================================================================
// Time Advance
// ============================================================================

#[test]
fn looping_clip_wraps_and_counts_loops() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(
        &walk,
        PlaySettings {
            speed: 2.0,
            ..Default::default()
        },
    );

    for _ in 0..40 {
        fx.solve(0.025);
    }

    let layer = fx.state.layer(id).unwrap();
    assert_eq!(layer.loop_count(), 2);
    assert!(layer.time() >= 0.0 && layer.time() < layer.length());

    // One second at the default interval has 20 distinct frames.
    let entry = fx.library.entry(layer.pose_key()).unwrap();
    assert!(entry.baked_frames() <= 20);
}

#[test]
fn same_frame_is_solved_once() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(&walk, PlaySettings::default());

    assert!(fx.solve(0.1));
    let time = fx.state.layer(id).unwrap().time();
    assert!(!fx.state.solve(0.1, fx.frame, &mut fx.library, &mut fx.masks));
    assert!(approx(fx.state.layer(id).unwrap().time(), time));
    assert_eq!(fx.state.last_solved_frame(), Some(fx.frame));
}

#[test]
fn disabled_tick_freezes_layers() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(&walk, PlaySettings::default());

    fx.state.set_tick_enabled(false);
    assert!(!fx.solve(0.1));
    assert!(approx(fx.state.layer(id).unwrap().time(), 0.0));

    fx.state.set_tick_enabled(true);
    assert!(fx.solve(0.1));
    assert!(approx(fx.state.layer(id).unwrap().time(), 0.1));
}

#[test]
fn self_managed_time_is_not_advanced() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(
        &walk,
        PlaySettings {
            time_self_managed: true,
            ..Default::default()
        },
    );

    assert!(fx.state.set_animation_time(id, 0.5));
    fx.solve(0.2);

    let layer = fx.state.layer(id).unwrap();
    assert!(approx(layer.time(), 0.5));
    assert!(approx(layer.normalized_time(), 0.5));

    // 1 s at 0.05 s -> 20 frames, position 0.5 * 19 = 9.5
    let span = layer.span();
    assert_eq!((span.before, span.after), (9, 10));
    assert!(approx(span.alpha, 0.5));
    assert!(layer.slots()[0].is_some() && layer.slots()[1].is_some());
}

// ============================================================================
// Blend In / Out
// ============================================================================

#[test]
fn blend_in_ramps_weight() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(
        &walk,
        PlaySettings {
            normalize_in_group: false,
            blend_in: 0.25,
            ..Default::default()
        },
    );

    fx.solve(0.125);
    assert!(approx(fx.state.layer(id).unwrap().final_weight(), 0.5));

    fx.solve(0.125);
    assert!(approx(fx.state.layer(id).unwrap().final_weight(), 1.0));

    fx.solve(0.125);
    assert!(approx(fx.state.layer(id).unwrap().final_weight(), 1.0));
}

#[test]
fn layer_weight_caps_final_weight() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(
        &walk,
        PlaySettings {
            weight: 0.3,
            blend_in: 0.0,
            ..Default::default()
        },
    );

    fx.solve(0.1);
    let weight = fx.state.layer(id).unwrap().final_weight();
    assert!(approx(weight, 0.3), "Expected 0.3, got {weight}");
    assert!(approx(fx.state.layers()[0].final_weight(), 0.7));
}

#[test]
fn one_shot_fades_out_and_is_removed() {
    let mut fx = Fixture::new();
    let jump = clip("jump", false);
    let id = fx.play(
        &jump,
        PlaySettings {
            normalize_in_group: false,
            blend_out: 0.25,
            ..Default::default()
        },
    );

    for _ in 0..9 {
        fx.solve(0.1);
    }
    let layer = fx.state.layer(id).unwrap();
    assert!(layer.is_pending_removal());
    assert!(layer.final_weight() > 0.0 && layer.final_weight() < 1.0);

    for _ in 0..3 {
        fx.solve(0.1);
    }
    assert!(fx.state.layer(id).is_none());
    assert_eq!(fx.state.layers().len(), 1);
    assert!(approx(fx.state.layers()[0].final_weight(), 1.0));
}

#[test]
fn forced_loop_keeps_one_shot_alive() {
    let mut fx = Fixture::new();
    let jump = clip("jump", false);
    let id = fx.state.play(
        &fx.asset,
        Some(&jump),
        PlaySettings::default(),
        PlayOptions {
            force_loop: true,
            ..Default::default()
        },
        &mut fx.library,
        &mut fx.masks,
    );

    for _ in 0..35 {
        fx.solve(0.1);
    }
    let layer = fx.state.layer(id).unwrap();
    assert!(layer.is_looping());
    assert!(!layer.is_pending_removal());
    assert_eq!(layer.loop_count(), 3);
}

// ============================================================================
// Group Normalization
// ============================================================================

#[test]
fn crossfade_keeps_total_weight_at_one() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let run = clip("run", true);

    let walk_id = fx.play(&walk, PlaySettings::default());
    for _ in 0..10 {
        fx.solve(0.05);
        assert!(approx(fx.total_weight(), 1.0));
    }

    let run_id = fx.play(&run, PlaySettings::default());
    assert!(fx.state.layer(walk_id).unwrap().is_pending_removal());

    for _ in 0..10 {
        fx.solve(0.05);
        let total = fx.total_weight();
        assert!(approx(total, 1.0), "Total weight {total}");
    }

    assert!(fx.state.layer(walk_id).is_none());
    assert!(approx(fx.state.layer(run_id).unwrap().final_weight(), 1.0));
}

#[test]
fn different_masks_do_not_blend_out_each_other() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let wave = clip("wave", true);

    let walk_id = fx.play(&walk, PlaySettings::default());
    let wave_id = fx.play(
        &wave,
        PlaySettings {
            mask: MaskDefinition::full_body().with_layer("arm", 0),
            ..Default::default()
        },
    );
    fx.solve(0.5);

    assert!(!fx.state.layer(walk_id).unwrap().is_pending_removal());
    let walk_layer = fx.state.layer(walk_id).unwrap();
    let wave_layer = fx.state.layer(wave_id).unwrap();
    assert_ne!(walk_layer.group(), wave_layer.group());
    assert!(approx(walk_layer.final_weight(), 1.0));
    assert!(approx(wave_layer.final_weight(), 1.0));
}

#[test]
fn self_managed_layers_stay_active() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let run = clip("run", true);

    let walk_id = fx.play(&walk, PlaySettings::default());
    fx.play(
        &run,
        PlaySettings {
            management: ManagementMode::SelfManaged,
            ..Default::default()
        },
    );
    assert!(!fx.state.layer(walk_id).unwrap().is_pending_removal());
}

// ============================================================================
// Force Modes
// ============================================================================

#[test]
fn force_all_layers_replaces_stack() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let run = clip("run", true);

    fx.play(&walk, PlaySettings::default());
    let run_id = fx.play(
        &run,
        PlaySettings {
            force_mode: ForceMode::AllLayers,
            weight: 0.8,
            ..Default::default()
        },
    );

    let layers = fx.state.layers();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[1].id(), run_id);
    assert!(approx(layers[1].final_weight(), 0.8));
}

#[test]
fn force_per_layer_only_clears_overlapping_masks() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let wave = clip("wave", true);
    let point = clip("point", true);
    let arm_mask = MaskDefinition::full_body().with_layer("arm", 0);

    let walk_id = fx.play(&walk, PlaySettings::default());
    let wave_id = fx.play(
        &wave,
        PlaySettings {
            mask: arm_mask.clone(),
            force_mode: ForceMode::PerLayer,
            ..Default::default()
        },
    );
    assert_eq!(fx.state.layers().len(), 3);

    let point_id = fx.play(
        &point,
        PlaySettings {
            mask: arm_mask,
            force_mode: ForceMode::PerLayer,
            ..Default::default()
        },
    );

    let ids: Vec<_> = fx.state.layers().iter().map(|layer| layer.id()).collect();
    assert_eq!(ids, vec![BIND_POSE_ID, walk_id, point_id]);
    assert!(fx.state.layer(wave_id).is_none());
}

#[test]
fn force_front_inserts_above_bind_pose() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let run = clip("run", true);

    fx.play(&walk, PlaySettings::default());
    let run_id = fx.state.play(
        &fx.asset,
        Some(&run),
        PlaySettings {
            management: ManagementMode::SelfManaged,
            ..Default::default()
        },
        PlayOptions {
            force_front: true,
            ..Default::default()
        },
        &mut fx.library,
        &mut fx.masks,
    );
    assert_eq!(fx.state.layers()[1].id(), run_id);
}

// ============================================================================
// Tweak / Clear / Priority
// ============================================================================

#[test]
fn tweak_changes_speed_and_mask() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let id = fx.play(&walk, PlaySettings::default());
    let old_mask = fx.state.layer(id).unwrap().mask();

    let settings = PlaySettings {
        speed: 0.5,
        mask: MaskDefinition::full_body().with_layer("spine", 2),
        ..Default::default()
    };
    assert!(fx.state.tweak_animation(id, settings, &fx.asset, &mut fx.masks));

    let layer = fx.state.layer(id).unwrap();
    assert!(approx(layer.settings().speed, 0.5));
    assert_ne!(layer.mask(), old_mask);
    assert!(fx.masks.weights(layer.mask()).is_some());

    fx.solve(1.0);
    assert!(approx(fx.state.layer(id).unwrap().time(), 0.5));
}

#[test]
fn clear_with_predicate() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    let wave = clip("wave", true);

    fx.play(&walk, PlaySettings::default());
    fx.play(
        &wave,
        PlaySettings {
            mask: MaskDefinition::full_body().with_layer("arm", 0),
            ..Default::default()
        },
    );

    let removed = fx.state.clear_animations(
        ForceMode::None,
        &MaskDefinition::full_body(),
        &mut fx.masks,
        |layer| layer.clip().is_some_and(|clip| clip.name == "wave"),
    );
    assert_eq!(removed, 1);
    assert_eq!(fx.state.layers().len(), 2);
}

#[test]
fn highest_priority_follows_weight() {
    let mut fx = Fixture::new();
    assert_eq!(fx.state.highest_priority().unwrap().id(), BIND_POSE_ID);

    let walk = clip("walk", true);
    let id = fx.play(
        &walk,
        PlaySettings {
            blend_in: 0.0,
            ..Default::default()
        },
    );
    fx.solve(0.1);
    assert_eq!(fx.state.highest_priority().unwrap().id(), id);
}

#[test]
fn release_drops_every_mask_reference() {
    let mut fx = Fixture::new();
    let walk = clip("walk", true);
    fx.play(
        &walk,
        PlaySettings {
            mask: MaskDefinition::full_body().with_layer("spine", 0),
            ..Default::default()
        },
    );
    assert_eq!(fx.masks.len(), 2);

    fx.state.release(&mut fx.masks);
    assert!(fx.masks.is_empty());
}

// ============================================================================
// Root Motion
// ============================================================================

/// Walks the root two units along +Z per second.
fn stride(looping: bool) -> Arc<AnimationClip> {
    let track = BoneTrack::new("root").with_translation(KeyframeTrack::linear(&[
        (0.0, Vec3::ZERO),
        (1.0, Vec3::new(0.0, 0.0, 2.0)),
    ]));
    Arc::new(
        AnimationClip::new("stride", vec![track])
            .with_looping(looping)
            .with_root_lock(RootLock::ReferencePose),
    )
}

fn forced(settings: PlaySettings) -> PlaySettings {
    PlaySettings {
        force_mode: ForceMode::AllLayers,
        ..settings
    }
}

fn root_motion(fx: &Fixture, delta: f32) -> Vec3 {
    fx.state.root_motion(fx.asset.skeleton(), delta).translation
}

#[test]
fn root_motion_follows_root_track() {
    let mut fx = Fixture::new();
    fx.play(&stride(true), forced(PlaySettings::default()));
    assert!(root_motion(&fx, 0.25).abs_diff_eq(Vec3::new(0.0, 0.0, 0.5), EPSILON));

    let mut fx = Fixture::new();
    fx.play(
        &stride(true),
        forced(PlaySettings {
            speed: 2.0,
            ..Default::default()
        }),
    );
    assert!(root_motion(&fx, 0.25).abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), EPSILON));
}

#[test]
fn root_motion_wraps_looping_clips() {
    let mut fx = Fixture::new();
    fx.play(
        &stride(true),
        forced(PlaySettings {
            start_time: 0.9,
            ..Default::default()
        }),
    );
    // 0.9 -> 1.0 then 0.0 -> 0.1
    assert!(root_motion(&fx, 0.2).abs_diff_eq(Vec3::new(0.0, 0.0, 0.4), EPSILON));

    let mut fx = Fixture::new();
    fx.play(
        &stride(false),
        forced(PlaySettings {
            start_time: 0.9,
            ..Default::default()
        }),
    );
    assert!(root_motion(&fx, 0.5).abs_diff_eq(Vec3::new(0.0, 0.0, 0.2), EPSILON));
}

#[test]
fn root_motion_is_weighted() {
    let mut fx = Fixture::new();
    fx.play(
        &stride(true),
        forced(PlaySettings {
            weight: 0.5,
            ..Default::default()
        }),
    );
    assert!(root_motion(&fx, 0.5).abs_diff_eq(Vec3::new(0.0, 0.0, 0.5), EPSILON));
}

#[test]
fn root_motion_respects_mode_and_mask() {
    let upper_body = MaskDefinition::default().with_layer("spine", 0);
    let cases = [
        (RootMotionMode::OnRootBoneAnimated, MaskDefinition::full_body(), 0.5),
        (RootMotionMode::OnRootBoneAnimated, upper_body.clone(), 0.0),
        (RootMotionMode::OnRootBoneAnimated, MaskDefinition::default().with_layer("root", 0), 0.5),
        (RootMotionMode::Force, upper_body, 0.5),
        (RootMotionMode::None, MaskDefinition::full_body(), 0.0),
    ];

    for (mode, mask, expected) in cases {
        let mut fx = Fixture::new();
        fx.play(
            &stride(true),
            forced(PlaySettings {
                root_motion: mode,
                mask,
                ..Default::default()
            }),
        );
        assert!(
            approx(root_motion(&fx, 0.25).z, expected),
            "{mode:?} moved {:?}",
            root_motion(&fx, 0.25)
        );
    }
}

#[test]
fn clips_without_root_motion_do_not_move() {
    let mut fx = Fixture::new();
    let moving = BoneTrack::new("root").with_translation(KeyframeTrack::linear(&[
        (0.0, Vec3::ZERO),
        (1.0, Vec3::new(0.0, 0.0, 2.0)),
    ]));
    let clip = Arc::new(AnimationClip::new("in_place", vec![moving]));
    fx.play(&clip, forced(PlaySettings::default()));

    let motion = fx.state.root_motion(fx.asset.skeleton(), 0.5);
    assert!(motion.abs_diff_eq(&BoneTransform::IDENTITY, EPSILON));
}
