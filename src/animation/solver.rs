//! Per-instance animation blend state.
//!
//! An [`AnimationState`] owns the ordered layer list of one instance. Layer 0
//! is always the bind pose: it never advances and is never removed, and it
//! receives whatever weight the normalized layers above it leave over.
//!
//! Each solve walks the layers from the newest to the oldest:
//!
//! 1. advance play time (wrapping looped clips),
//! 2. advance the blend-in timer,
//! 3. start fading one-shots that are about to end,
//! 4. advance the blend-out timer of fading layers and drop finished ones,
//! 5. request the two bracketing frames from the pose library.
//!
//! A second pass then normalizes weights per mask group and hands the rest to
//! the bind pose.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::animation::clip::AnimationClip;
use crate::animation::keyframe::{KeyframeSpan, time_to_index};
use crate::animation::layer::{
    AnimationId, AnimationLayer, ForceMode, ManagementMode, PlayOptions, PlaySettings,
    RootMotionMode,
};
use crate::animation::mask::{MaskDefinition, MaskRegistry, MaskSourceHandle};
use crate::animation::tracks::InterpolationMode;
use crate::library::PoseLibrary;
use crate::math::{BoneTransform, SMALL_NUMBER, is_nearly_zero};
use crate::skeleton::{MeshAsset, ReferenceSkeleton};

/// Id of the bind-pose layer of every instance.
pub const BIND_POSE_ID: AnimationId = AnimationId(0);

#[derive(Debug, Clone)]
pub struct AnimationState {
    layers: Vec<AnimationLayer>,
    last_solved_frame: Option<u64>,
    tick_enabled: bool,
    next_id: u32,
}

impl AnimationState {
    /// Creates the state with its bind-pose layer.
    pub fn new(asset: &Arc<MeshAsset>, library: &mut PoseLibrary, masks: &mut MaskRegistry) -> Self {
        let settings = PlaySettings::default();
        let bind_pose = AnimationLayer {
            id: BIND_POSE_ID,
            clip: None,
            pose_key: library.ensure_entry(asset, None),
            mask: masks.acquire(&settings.mask, asset),
            group: settings.mask.source_handle(),
            settings,
            time: 0.0,
            last_time: 0.0,
            normalized_time: 0.0,
            length: 1.0,
            looping: true,
            loop_count: 0,
            blend_in_time: 0.0,
            blend_out_time: 0.0,
            pending_removal: false,
            final_weight: 1.0,
            span: KeyframeSpan::default(),
            slots: [None; 2],
        };

        Self {
            layers: vec![bind_pose],
            last_solved_frame: None,
            tick_enabled: true,
            next_id: BIND_POSE_ID.0 + 1,
        }
    }

    #[must_use]
    pub fn layers(&self) -> &[AnimationLayer] {
        &self.layers
    }

    #[must_use]
    pub fn layer(&self, id: AnimationId) -> Option<&AnimationLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    #[must_use]
    pub fn last_solved_frame(&self) -> Option<u64> {
        self.last_solved_frame
    }

    #[must_use]
    pub fn is_tick_enabled(&self) -> bool {
        self.tick_enabled
    }

    pub fn set_tick_enabled(&mut self, enabled: bool) {
        self.tick_enabled = enabled;
    }

    /// Adds a layer playing `clip` (`None` plays the bind pose).
    pub fn play(
        &mut self,
        asset: &Arc<MeshAsset>,
        clip: Option<&Arc<AnimationClip>>,
        settings: PlaySettings,
        options: PlayOptions,
        library: &mut PoseLibrary,
        masks: &mut MaskRegistry,
    ) -> AnimationId {
        let forced = settings.force_mode != ForceMode::None;
        if forced {
            self.clear_animations(settings.force_mode, &settings.mask, masks, |_| true);
        }

        if settings.management != ManagementMode::SelfManaged {
            for layer in self.layers.iter_mut().skip(1) {
                if !layer.pending_removal && layer.settings.mask.shares_bones_with(&settings.mask) {
                    layer.pending_removal = true;
                    layer.blend_out_time = 0.0;
                }
            }
        }

        let id = AnimationId(self.next_id);
        self.next_id += 1;

        let length = clip.map_or(1.0, |clip| clip.duration);
        let looping = clip.is_none_or(|clip| clip.looping) || options.force_loop;
        let layer = AnimationLayer {
            id,
            clip: clip.cloned(),
            pose_key: library.ensure_entry(asset, clip),
            mask: masks.acquire(&settings.mask, asset),
            group: settings.mask.source_handle(),
            time: settings.start_time,
            last_time: settings.start_time,
            normalized_time: normalize(settings.start_time, length),
            length,
            looping,
            loop_count: 0,
            blend_in_time: if forced { settings.blend_in } else { 0.0 },
            blend_out_time: 0.0,
            pending_removal: false,
            final_weight: if forced { settings.weight } else { 0.0 },
            span: KeyframeSpan::default(),
            slots: [None; 2],
            settings,
        };

        log::trace!(
            "Play {:?} '{}' ({} layers)",
            id,
            clip.map_or("<bind pose>", |clip| clip.name.as_str()),
            self.layers.len() + 1
        );

        if options.force_front {
            self.layers.insert(1, layer);
        } else {
            self.layers.push(layer);
        }
        id
    }

    /// Removes every layer above the bind pose accepted by `predicate`.
    ///
    /// With [`ForceMode::PerLayer`] only layers whose mask shares a branch
    /// with `mask` are candidates.
    pub fn clear_animations<F>(
        &mut self,
        force_mode: ForceMode,
        mask: &MaskDefinition,
        masks: &mut MaskRegistry,
        mut predicate: F,
    ) -> usize
    where
        F: FnMut(&AnimationLayer) -> bool,
    {
        let mut removed = 0;
        let mut index = self.layers.len();
        while index > 1 {
            index -= 1;
            let layer = &self.layers[index];
            if !predicate(layer) {
                continue;
            }
            if force_mode == ForceMode::PerLayer && !layer.settings.mask.shares_bones_with(mask) {
                continue;
            }
            self.remove_at(index, masks);
            removed += 1;
        }
        removed
    }

    /// Removes the layer with `id` immediately. The bind pose cannot be
    /// removed.
    pub fn remove_animation(&mut self, id: AnimationId, masks: &mut MaskRegistry) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                self.remove_at(index, masks);
                true
            }
            _ => false,
        }
    }

    /// Replaces the settings of a running layer.
    ///
    /// A force mode clears the other layers and jumps to the end of the
    /// blend-in. A changed mask is rebuilt for `asset`.
    pub fn tweak_animation(
        &mut self,
        id: AnimationId,
        settings: PlaySettings,
        asset: &MeshAsset,
        masks: &mut MaskRegistry,
    ) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }

        if settings.force_mode != ForceMode::None {
            self.clear_animations(settings.force_mode, &settings.mask, masks, |layer| {
                layer.id != id
            });
        }

        let Some(index) = self.index_of(id) else {
            return false;
        };
        let layer = &mut self.layers[index];
        if settings.force_mode != ForceMode::None {
            layer.blend_in_time = settings.blend_in;
        }
        if layer.settings.mask != settings.mask {
            let previous = layer.mask;
            layer.mask = masks.acquire(&settings.mask, asset);
            masks.release(previous);
            layer.group = settings.mask.source_handle();
        }
        layer.settings = settings;
        true
    }

    /// Sets the play time of a layer, typically one with self-managed time.
    pub fn set_animation_time(&mut self, id: AnimationId, time: f32) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                let layer = &mut self.layers[index];
                layer.time = time;
                layer.normalized_time = normalize(time, layer.length);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn settings_of(&self, id: AnimationId) -> Option<&PlaySettings> {
        self.layer(id).map(|layer| &layer.settings)
    }

    /// The layer with the largest applied weight.
    #[must_use]
    pub fn highest_priority(&self) -> Option<&AnimationLayer> {
        self.layers.iter().fold(None, |best: Option<&AnimationLayer>, layer| match best {
            Some(best) if best.final_weight >= layer.final_weight => Some(best),
            _ => Some(layer),
        })
    }

    /// Advances every layer by `delta` seconds.
    ///
    /// Does nothing when `frame` was already solved or ticking is disabled.
    /// Returns whether a solve happened.
    pub fn solve(
        &mut self,
        delta: f32,
        frame: u64,
        library: &mut PoseLibrary,
        masks: &mut MaskRegistry,
    ) -> bool {
        if self.last_solved_frame == Some(frame) || !self.tick_enabled {
            return false;
        }
        self.last_solved_frame = Some(frame);

        let mut group_weights: FxHashMap<MaskSourceHandle, f32> = FxHashMap::default();

        let mut index = self.layers.len();
        while index > 0 {
            index -= 1;
            let layer = &mut self.layers[index];
            layer.last_time = layer.time;

            if index == 0 {
                layer.time = 0.0;
                layer.normalized_time = 0.0;
            } else {
                if !layer.settings.time_self_managed {
                    advance_time(layer, delta);
                }
                layer.normalized_time = normalize(layer.time, layer.length);

                let blend_in = layer.settings.blend_in.max(0.0);
                layer.blend_in_time = (layer.blend_in_time + delta).clamp(0.0, blend_in);
                let mut weight = fraction(layer.blend_in_time, blend_in);

                let blend_out = layer.settings.blend_out.max(0.0);
                if !layer.pending_removal
                    && !layer.looping
                    && layer.settings.speed.abs() > SMALL_NUMBER
                    && (layer.length - layer.time) / layer.settings.speed < blend_out
                {
                    layer.pending_removal = true;
                    layer.blend_out_time = 0.0;
                }

                if layer.pending_removal {
                    layer.blend_out_time = (layer.blend_out_time + delta).clamp(0.0, blend_out);
                    weight = weight.min(1.0 - fraction(layer.blend_out_time, blend_out));
                    if is_nearly_zero(weight) {
                        self.remove_at(index, masks);
                        continue;
                    }
                }

                layer.final_weight = weight.min(layer.settings.weight);
                if layer.settings.normalize_in_group {
                    *group_weights.entry(layer.group).or_insert(0.0) += layer.final_weight;
                }
            }

            request_frames(layer, library);
        }

        let mut base_weight = 1.0_f32;
        for (index, layer) in self.layers.iter_mut().enumerate().rev() {
            if !layer.settings.normalize_in_group {
                continue;
            }
            if index == 0 {
                layer.final_weight = base_weight.clamp(0.0, 1.0);
            } else {
                let total = group_weights.get(&layer.group).copied().unwrap_or(0.0);
                if total > SMALL_NUMBER {
                    layer.final_weight /= total;
                }
                layer.final_weight = layer.final_weight.min(layer.settings.weight);
                base_weight -= layer.final_weight;
            }
        }
        true
    }

    /// Root motion of the next `delta` seconds, blended over every layer whose
    /// clip carries root motion. Each layer moves at its own speed and is
    /// weighted by its last solved weight.
    #[must_use]
    pub fn root_motion(&self, skeleton: &ReferenceSkeleton, delta: f32) -> BoneTransform {
        let root = skeleton.bones().first().map(|bone| bone.name);
        self.layers
            .iter()
            .filter_map(|layer| {
                let clip = layer.clip.as_ref().filter(|clip| clip.has_root_motion())?;
                let contributes = match layer.settings.root_motion {
                    RootMotionMode::None => false,
                    RootMotionMode::Force => true,
                    RootMotionMode::OnRootBoneAnimated => {
                        let mask = &layer.settings.mask;
                        mask.is_empty() || mask.layers.iter().any(|l| Some(l.bone) == root)
                    }
                };
                contributes.then(|| {
                    let motion = clip.extract_root_motion(
                        skeleton,
                        layer.time,
                        delta * layer.settings.speed,
                        layer.looping,
                    );
                    (motion, layer.final_weight.clamp(0.0, 1.0))
                })
            })
            .fold(BoneTransform::IDENTITY, |out, (motion, weight)| {
                out.interpolate(&motion, weight)
            })
    }

    /// Releases every layer's mask reference.
    pub fn release(&mut self, masks: &mut MaskRegistry) {
        for layer in self.layers.drain(..) {
            masks.release(layer.mask);
        }
    }

    fn index_of(&self, id: AnimationId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    fn remove_at(&mut self, index: usize, masks: &mut MaskRegistry) {
        let layer = self.layers.remove(index);
        masks.release(layer.mask);
        log::trace!("Removed animation layer {:?}", layer.id);
    }
}

fn normalize(time: f32, length: f32) -> f32 {
    if length > SMALL_NUMBER {
        (time / length).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// `elapsed / duration` in `[0, 1]`; a zero duration counts as complete.
fn fraction(elapsed: f32, duration: f32) -> f32 {
    if duration > SMALL_NUMBER {
        (elapsed / duration).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn advance_time(layer: &mut AnimationLayer, delta: f32) {
    let next = layer.time + delta * layer.settings.speed;
    if layer.looping && layer.length > SMALL_NUMBER {
        let cycles = (next / layer.length).floor();
        if cycles != 0.0 {
            layer.loop_count += cycles.abs() as u32;
        }
        layer.time = next.rem_euclid(layer.length);
    } else {
        layer.time = next;
    }
}

fn request_frames(layer: &mut AnimationLayer, library: &mut PoseLibrary) {
    let Some(max_frames) = library.max_frames(layer.pose_key) else {
        log::warn!("Animation layer {:?} has no pose library entry", layer.id);
        layer.span = KeyframeSpan::default();
        layer.slots = [None; 2];
        return;
    };

    let mode = layer
        .clip
        .as_ref()
        .map_or(InterpolationMode::Linear, |clip| clip.interpolation);
    layer.span = time_to_index(layer.normalized_time, max_frames, mode);
    layer.slots = [
        library.get_or_bake_frame(layer.pose_key, layer.span.before),
        library.get_or_bake_frame(layer.pose_key, layer.span.after),
    ];
}
