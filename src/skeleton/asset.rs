use std::sync::Arc;

use rustc_hash::FxHashSet;
use xxhash_rust::xxh3::Xxh3;

use crate::animation::AnimationClip;
use crate::errors::{CrowdError, Result};
use crate::math::BoundingBox;
use crate::render::{RenderHandle, RenderHandleDesc};
use crate::settings::DEFAULT_SAMPLE_INTERVAL;
use crate::skeleton::parent_cache::{ParentCache, build_parent_cache};
use crate::skeleton::reference::ReferenceSkeleton;

/// Everything the external baking step provides about a crowd mesh.
#[derive(Debug, Clone)]
pub struct MeshAssetDesc {
    pub name: String,
    pub skeleton: Arc<ReferenceSkeleton>,
    /// CPU bones referenced by the vertex weights. Empty means every bone.
    pub skinned_bones: Vec<usize>,
    /// Local-space bounds of the static mesh
    pub bounds: BoundingBox,
    /// Pose sampling interval in seconds; `None` uses the crowd default
    pub sample_interval: Option<f32>,
    pub lod_vertex_counts: Vec<u32>,
    pub frustum_culling: bool,
    /// Played with [`ForceMode::AllLayers`](crate::ForceMode) on spawn
    pub default_animation: Option<Arc<AnimationClip>>,
    pub render: RenderHandleDesc,
}

impl MeshAssetDesc {
    #[must_use]
    pub fn new(name: &str, skeleton: Arc<ReferenceSkeleton>) -> Self {
        Self {
            name: name.to_string(),
            skeleton,
            skinned_bones: Vec::new(),
            bounds: BoundingBox::default(),
            sample_interval: None,
            lod_vertex_counts: Vec::new(),
            frustum_culling: true,
            default_animation: None,
            render: RenderHandleDesc::new(name),
        }
    }
}

/// A crowd mesh with its compacted GPU bone layout.
///
/// Only skinned bones and their ancestors get a GPU index; GPU order is the
/// sorted CPU order.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    id: u64,
    name: String,
    skeleton: Arc<ReferenceSkeleton>,
    cpu_to_gpu: Vec<Option<u32>>,
    gpu_to_cpu: Vec<usize>,
    parent_cache: ParentCache,
    bounds: BoundingBox,
    sample_interval: f32,
    lod_vertex_counts: Vec<u32>,
    frustum_culling: bool,
    default_animation: Option<Arc<AnimationClip>>,
    render_handle: RenderHandle,
}

impl MeshAsset {
    pub fn new(desc: MeshAssetDesc) -> Result<Self> {
        let skeleton = desc.skeleton;
        let num_bones = skeleton.num_bones();

        let sample_interval = desc.sample_interval.unwrap_or(DEFAULT_SAMPLE_INTERVAL);
        if !(sample_interval.is_finite() && sample_interval > 0.0) {
            return Err(CrowdError::InvalidSampleInterval(sample_interval));
        }

        let mut used = FxHashSet::default();
        if desc.skinned_bones.is_empty() {
            used.extend(0..num_bones);
        } else {
            for &bone in &desc.skinned_bones {
                if bone >= num_bones {
                    return Err(CrowdError::BoneOutOfRange {
                        index: bone,
                        count: num_bones,
                    });
                }
                used.insert(bone);
                used.extend(skeleton.ancestors(bone));
            }
        }

        let mut gpu_to_cpu: Vec<usize> = used.into_iter().collect();
        gpu_to_cpu.sort_unstable();

        let mut cpu_to_gpu = vec![None; num_bones];
        for (gpu, &cpu) in gpu_to_cpu.iter().enumerate() {
            cpu_to_gpu[cpu] = Some(gpu as u32);
        }

        let parents: Vec<Option<usize>> = gpu_to_cpu
            .iter()
            .map(|&cpu| skeleton.parent_index(cpu))
            .collect();
        let parent_cache = build_parent_cache(&gpu_to_cpu, &parents);
        log::debug!(
            "Mesh asset '{}': {} CPU bones, {} GPU bones, {} parent cache lines",
            desc.name,
            num_bones,
            gpu_to_cpu.len(),
            parent_cache.lines_used
        );

        let mut hasher = Xxh3::new();
        hasher.update(desc.name.as_bytes());
        hasher.update(&skeleton.id().to_le_bytes());
        for &cpu in &gpu_to_cpu {
            hasher.update(&(cpu as u64).to_le_bytes());
        }
        hasher.update(&sample_interval.to_le_bytes());
        for value in desc.bounds.min.to_array().into_iter().chain(desc.bounds.max.to_array()) {
            hasher.update(&value.to_le_bytes());
        }

        Ok(Self {
            id: hasher.digest(),
            render_handle: desc.render.handle(),
            name: desc.name,
            skeleton,
            cpu_to_gpu,
            gpu_to_cpu,
            parent_cache,
            bounds: desc.bounds,
            sample_interval,
            lod_vertex_counts: desc.lod_vertex_counts,
            frustum_culling: desc.frustum_culling,
            default_animation: desc.default_animation,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Arc<ReferenceSkeleton> {
        &self.skeleton
    }

    #[inline]
    #[must_use]
    pub fn num_cpu_bones(&self) -> usize {
        self.cpu_to_gpu.len()
    }

    #[inline]
    #[must_use]
    pub fn num_gpu_bones(&self) -> usize {
        self.gpu_to_cpu.len()
    }

    #[inline]
    #[must_use]
    pub fn gpu_bone_index(&self, cpu_bone: usize) -> Option<u32> {
        self.cpu_to_gpu.get(cpu_bone).copied().flatten()
    }

    #[inline]
    #[must_use]
    pub fn cpu_bone_index(&self, gpu_bone: usize) -> Option<usize> {
        self.gpu_to_cpu.get(gpu_bone).copied()
    }

    /// CPU bone index for every GPU bone, in GPU order.
    #[must_use]
    pub fn gpu_to_cpu(&self) -> &[usize] {
        &self.gpu_to_cpu
    }

    #[must_use]
    pub fn parent_cache(&self) -> &ParentCache {
        &self.parent_cache
    }

    #[must_use]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    #[inline]
    #[must_use]
    pub fn sample_interval(&self) -> f32 {
        self.sample_interval
    }

    #[must_use]
    pub fn lod_vertex_counts(&self) -> &[u32] {
        &self.lod_vertex_counts
    }

    #[must_use]
    pub fn frustum_culling(&self) -> bool {
        self.frustum_culling
    }

    #[must_use]
    pub fn default_animation(&self) -> Option<&Arc<AnimationClip>> {
        self.default_animation.as_ref()
    }

    #[must_use]
    pub fn render_handle(&self) -> RenderHandle {
        self.render_handle
    }
}
