use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::{Quat, Vec3};

use crowd::animation::{BoneTrack, KeyframeTrack};
use crowd::skeleton::Bone;
use crowd::{
    AnimationClip, AssetHandle, BoneTransform, CrowdContext, CrowdSettings, ForceMode,
    MeshAssetDesc, PlayOptions, PlaySettings, ReferenceSkeleton,
};

const BONES: usize = 64;

/// A chain of `BONES` bones, each one unit above its parent.
fn skeleton() -> Arc<ReferenceSkeleton> {
    let bones = (0..BONES)
        .map(|i| {
            let parent = i.checked_sub(1);
            Bone::new(&format!("bone_{i}"), parent, BoneTransform::from_translation(Vec3::Y))
        })
        .collect();
    Arc::new(ReferenceSkeleton::new("chain", bones).unwrap())
}

fn sway(name: &str, duration: f32) -> Arc<AnimationClip> {
    let tracks = (0..BONES)
        .step_by(4)
        .map(|i| {
            BoneTrack::new(&format!("bone_{i}")).with_rotation(KeyframeTrack::linear(&[
                (0.0, Quat::IDENTITY),
                (duration * 0.5, Quat::from_rotation_z(0.2)),
                (duration, Quat::IDENTITY),
            ]))
        })
        .collect();
    Arc::new(AnimationClip::new(name, tracks))
}

fn populate(count: usize) -> (CrowdContext, AssetHandle) {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = CrowdContext::new(CrowdSettings {
        bone_texture_rows: 2048 * 2048,
        frustum_culling: false,
        ..Default::default()
    });
    let asset = context
        .register_asset(MeshAssetDesc::new("crowd", skeleton()))
        .unwrap();
    let clips = [sway("idle", 2.0), sway("walk", 1.0), sway("run", 0.6)];

    for i in 0..count {
        let position = Vec3::new((i % 100) as f32, 0.0, (i / 100) as f32);
        let instance = context
            .spawn(asset, BoneTransform::from_translation(position))
            .unwrap();
        let settings = PlaySettings {
            force_mode: ForceMode::AllLayers,
            start_time: (i % 17) as f32 * 0.05,
            ..Default::default()
        };
        context
            .play_animation(instance, Some(&clips[i % clips.len()]), settings, PlayOptions::default())
            .unwrap();
    }
    (context, asset)
}

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");
    for count in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(populate(count)));
        });
    }
    group.finish();
}

fn frame_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_and_build_frame");
    for count in [100, 1000, 5000] {
        let (context, _) = populate(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &context, |b, context| {
            b.iter(|| {
                context.tick(black_box(1.0 / 60.0), &[]);
                black_box(context.build_frame());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, spawn_benchmark, frame_benchmark);
criterion_main!(benches);
