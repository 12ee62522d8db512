//! Crowd Context
//!
//! [`CrowdContext`] owns every crowd subsystem behind one
//! [`parking_lot::Mutex`]. The simulation thread calls [`CrowdContext::tick`]
//! once per frame (cull, then solve every instance), the render side calls
//! [`CrowdContext::build_frame`] / [`CrowdContext::dispatch`] and
//! [`CrowdContext::flush_render`] to snapshot the results.
//!
//! ```text
//! tick(dt, cameras)
//!   ├─ frustums from cameras
//!   ├─ per instance: visibility, AnimationState::solve ──▶ PoseLibrary bakes
//!   └─ BoneRemapBuilder::rebuild (when assets changed)
//! build_frame()
//!   ├─ mask table (when masks changed)
//!   ├─ per visible instance: keyframe + IK segments
//!   └─ pose rows baked since the last frame
//! ```
//!
//! Culled instances keep solving so they resume at the right play position;
//! they are only left out of the frame arrays.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::allocator::BestFitAllocator;
use crate::animation::{
    AnimationClip, AnimationId, AnimationLayer, AnimationState, BoneSpace, ForceMode,
    MaskDefinition, MaskProxyHandle, MaskRegistry, PlayOptions, PlaySettings, PoseView,
};
use crate::crowd::handles::{AssetHandle, AttachmentHandle, InstanceHandle, RenderKey};
use crate::crowd::instance::{Attachment, AttachmentDesc, InstanceRuntime};
use crate::crowd::output::{DispatchSink, FrameOutput, KeyframeEntry};
use crate::culling::{CameraView, Frustum, instance_bounds, is_visible};
use crate::errors::{CrowdError, Result};
use crate::library::{PoseLibrary, ROWS_PER_BONE};
use crate::math::{BoneTransform, BoundingBox, matrix_rows, quantize_unit};
use crate::remap::BoneRemapBuilder;
use crate::render::{InstanceFlags, InstanceRenderStore, RenderFlush, RenderHandle, RenderSink};
use crate::settings::CrowdSettings;
use crate::skeleton::{MeshAsset, MeshAssetDesc};
use crate::utils::FrameClock;

/// Counters for tooling and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrowdStats {
    pub frame: u64,
    pub assets: usize,
    /// Distinct assets with at least one live instance
    pub active_assets: usize,
    pub instances: usize,
    pub visible_instances: usize,
    pub attachments: usize,
    pub render_stores: usize,
    pub pose_entries: usize,
    pub pose_bakes: usize,
    pub pose_rows: usize,
    pub bone_texture_rows: usize,
    pub masks: usize,
}

#[derive(Debug)]
struct CrowdState {
    settings: CrowdSettings,
    clock: FrameClock,
    allocator: BestFitAllocator,
    library: PoseLibrary,
    masks: MaskRegistry,
    remap: BoneRemapBuilder,

    assets: SlotMap<AssetHandle, Arc<MeshAsset>>,
    active_assets: Vec<Arc<MeshAsset>>,
    asset_users: FxHashMap<u64, usize>,

    instances: SlotMap<InstanceHandle, InstanceRuntime>,
    attachments: SlotMap<AttachmentHandle, Attachment>,
    render_stores: FxHashMap<RenderHandle, InstanceRenderStore<RenderKey>>,

    frustums: Vec<Frustum>,
    last_frame_cameras: Vec<CameraView>,

    mask_table: Vec<u16>,
    mask_rows: FxHashMap<MaskProxyHandle, u32>,
    mask_stride: usize,
    remap_changed: bool,
    masks_changed: bool,
}

impl CrowdState {
    fn new(settings: CrowdSettings) -> Self {
        Self {
            allocator: BestFitAllocator::new(settings.bone_block_size, settings.bone_texture_rows),
            settings,
            clock: FrameClock::new(),
            library: PoseLibrary::new(),
            masks: MaskRegistry::new(),
            remap: BoneRemapBuilder::new(),
            assets: SlotMap::with_key(),
            active_assets: Vec::new(),
            asset_users: FxHashMap::default(),
            instances: SlotMap::with_key(),
            attachments: SlotMap::with_key(),
            render_stores: FxHashMap::default(),
            frustums: Vec::new(),
            last_frame_cameras: Vec::new(),
            mask_table: Vec::new(),
            mask_rows: FxHashMap::default(),
            mask_stride: 0,
            remap_changed: false,
            masks_changed: false,
        }
    }

    fn render_store(
        &mut self,
        handle: RenderHandle,
        mesh_bounds: &BoundingBox,
    ) -> &mut InstanceRenderStore<RenderKey> {
        let width = self.settings.custom_data_width;
        self.render_stores
            .entry(handle)
            .or_insert_with(|| InstanceRenderStore::new(handle, *mesh_bounds, width))
    }

    fn acquire_asset(&mut self, asset: &Arc<MeshAsset>) {
        let users = self.asset_users.entry(asset.id()).or_insert(0);
        *users += 1;
        if *users == 1 {
            self.active_assets.push(Arc::clone(asset));
            self.remap.mark_dirty();
        }
    }

    fn release_asset(&mut self, asset: &MeshAsset) {
        let Some(users) = self.asset_users.get_mut(&asset.id()) else {
            return;
        };
        *users = users.saturating_sub(1);
        if *users == 0 {
            self.asset_users.remove(&asset.id());
            self.active_assets.retain(|active| active.id() != asset.id());
            self.remap.mark_dirty();
        }
    }

    fn rebuild_tables(&mut self) {
        if self.remap.rebuild(&self.active_assets) {
            self.remap_changed = true;
        }

        let stride = self.remap.max_cpu_bones().max(1);
        if self.masks.is_dirty() || stride != self.mask_stride {
            let (table, rows) = self.masks.build_table(stride);
            self.mask_table = table;
            self.mask_rows = rows;
            self.mask_stride = stride;
            self.masks_changed = true;
        }
    }

    fn pose_view<'a>(&'a self, instance: &'a InstanceRuntime) -> PoseView<'a> {
        PoseView {
            layers: instance.animation.layers(),
            library: &self.library,
            masks: &self.masks,
            skeleton: instance.asset.skeleton(),
            overrides: &instance.overrides,
            world: &instance.world,
        }
    }

    fn remove_attachment(&mut self, handle: AttachmentHandle) -> Option<Attachment> {
        let attachment = self.attachments.remove(handle)?;
        if let Some(store) = self.render_stores.get_mut(&attachment.render) {
            store.remove(RenderKey::Attachment(handle));
        }
        Some(attachment)
    }

    /// Render keys of an instance and its attachments, optionally limited to
    /// attachments that mirror custom data.
    fn render_targets(
        &self,
        handle: InstanceHandle,
        include_attachments: bool,
        custom_data_only: bool,
    ) -> Vec<(RenderHandle, RenderKey)> {
        let Some(instance) = self.instances.get(handle) else {
            return Vec::new();
        };
        let mut targets = vec![(instance.asset.render_handle(), RenderKey::Instance(handle))];
        if include_attachments {
            for &child in &instance.attachments {
                if let Some(attachment) = self.attachments.get(child)
                    && (!custom_data_only || attachment.mirror_custom_data)
                {
                    targets.push((attachment.render, RenderKey::Attachment(child)));
                }
            }
        }
        targets
    }
}

/// Owner of every crowd subsystem.
///
/// All methods take `&self` and serialize through one internal lock, so the
/// context can be shared between the simulation and render threads.
#[derive(Debug)]
pub struct CrowdContext {
    state: Mutex<CrowdState>,
}

impl Default for CrowdContext {
    fn default() -> Self {
        Self::new(CrowdSettings::default())
    }
}

impl CrowdContext {
    #[must_use]
    pub fn new(settings: CrowdSettings) -> Self {
        log::info!(
            "Crowd context: {} bone texture rows, block size {}",
            settings.bone_texture_rows,
            settings.bone_block_size
        );
        Self {
            state: Mutex::new(CrowdState::new(settings)),
        }
    }

    #[must_use]
    pub fn settings(&self) -> CrowdSettings {
        self.state.lock().settings.clone()
    }

    // ========================================================================
    // Assets
    // ========================================================================

    /// [Write] Builds and registers a mesh asset.
    pub fn register_asset(&self, mut desc: MeshAssetDesc) -> Result<AssetHandle> {
        let mut state = self.state.lock();
        if desc.sample_interval.is_none() {
            desc.sample_interval = Some(state.settings.default_sample_interval);
        }
        let asset = MeshAsset::new(desc)?;
        Ok(state.assets.insert(Arc::new(asset)))
    }

    /// [Write] Unregisters an asset no instance uses any more.
    pub fn unregister_asset(&self, handle: AssetHandle) -> bool {
        let mut state = self.state.lock();
        if state.instances.values().any(|instance| instance.asset_handle == handle) {
            log::warn!("Cannot unregister an asset that still has instances");
            return false;
        }
        state.assets.remove(handle).is_some()
    }

    #[must_use]
    pub fn asset(&self, handle: AssetHandle) -> Option<Arc<MeshAsset>> {
        self.state.lock().assets.get(handle).cloned()
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// [Write] Spawns an instance of `asset` at `world`.
    ///
    /// Reserves the instance's bone texture range and plays the asset's
    /// default animation (or the bind pose). Nothing is committed when the
    /// bone texture is full.
    pub fn spawn(&self, asset: AssetHandle, world: BoneTransform) -> Result<InstanceHandle> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(asset_data) = state.assets.get(asset).cloned() else {
            log::warn!("Spawn with an unregistered mesh asset");
            return Err(CrowdError::AssetNotFound);
        };

        let rows = asset_data.num_gpu_bones() * ROWS_PER_BONE;
        let Some(bone_rows_start) = state.allocator.allocate(rows) else {
            log::warn!(
                "Bone texture full: cannot reserve {rows} rows for '{}'",
                asset_data.name()
            );
            return Err(CrowdError::SlotAllocationFailed { requested: rows });
        };

        let mut animation = AnimationState::new(&asset_data, &mut state.library, &mut state.masks);
        animation.play(
            &asset_data,
            asset_data.default_animation(),
            PlaySettings {
                force_mode: ForceMode::AllLayers,
                ..Default::default()
            },
            PlayOptions::default(),
            &mut state.library,
            &mut state.masks,
        );

        let handle = state.instances.insert(InstanceRuntime {
            asset_handle: asset,
            asset: Arc::clone(&asset_data),
            world,
            visible: true,
            animation,
            overrides: FxHashMap::default(),
            attachments: smallvec::SmallVec::new(),
            bone_rows_start,
            bone_rows_len: rows,
        });
        state.acquire_asset(&asset_data);

        let key = RenderKey::Instance(handle);
        let store = state.render_store(asset_data.render_handle(), asset_data.bounds());
        store.allocate(key);
        store.update_transform(key, &world, true);
        store.set_skeleton_index(key, bone_rows_start as u32);

        log::debug!("Spawned '{}' at bone rows {bone_rows_start}", asset_data.name());
        Ok(handle)
    }

    /// [Write] Removes an instance with its attachments and releases its
    /// bone texture range.
    pub fn despawn(&self, handle: InstanceHandle) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(mut instance) = state.instances.remove(handle) else {
            return false;
        };

        instance.animation.release(&mut state.masks);
        for &child in &instance.attachments {
            state.remove_attachment(child);
        }
        if let Some(store) = state.render_stores.get_mut(&instance.asset.render_handle()) {
            store.remove(RenderKey::Instance(handle));
        }
        state.allocator.free(instance.bone_rows_start, instance.bone_rows_len);
        state.release_asset(&instance.asset);
        true
    }

    #[must_use]
    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.state.lock().instances.contains_key(handle)
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.state.lock().instances.len()
    }

    #[must_use]
    pub fn instances(&self) -> Vec<InstanceHandle> {
        self.state.lock().instances.keys().collect()
    }

    #[must_use]
    pub fn is_visible(&self, handle: InstanceHandle) -> Option<bool> {
        self.state.lock().instances.get(handle).map(InstanceRuntime::is_visible)
    }

    /// [Write] Moves an instance and its attachments.
    pub fn set_world_transform(&self, handle: InstanceHandle, world: BoneTransform) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let instance = state.instances.get_mut(handle).ok_or(CrowdError::InstanceNotFound)?;
        instance.world = world;

        for (render, key) in state.render_targets(handle, true, false) {
            if let Some(store) = state.render_stores.get_mut(&render) {
                store.update_transform(key, &world, false);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn world_transform(&self, handle: InstanceHandle) -> Option<BoneTransform> {
        self.state.lock().instances.get(handle).map(|instance| instance.world)
    }

    /// Root motion of the instance's layers over the next `delta` seconds.
    /// [`BoneSpace::World`] returns the world transform the instance would
    /// move to; any other space returns the component-space delta.
    #[must_use]
    pub fn root_motion_transform(
        &self,
        handle: InstanceHandle,
        delta: f32,
        space: BoneSpace,
    ) -> Option<BoneTransform> {
        let state = self.state.lock();
        let instance = state.instances.get(handle)?;
        let motion = instance.animation.root_motion(instance.asset.skeleton(), delta);
        Some(match space {
            BoneSpace::World => motion.then(&instance.world),
            BoneSpace::Local | BoneSpace::Component => motion,
        })
    }

    /// [Write] Moves the instance by its root motion over the next `delta`
    /// seconds and returns the new world transform. `zero_vertical` drops the
    /// up-axis part of the motion; the world scale is kept unless
    /// `include_scale` is set.
    pub fn move_with_root_motion(
        &self,
        handle: InstanceHandle,
        delta: f32,
        zero_vertical: bool,
        include_scale: bool,
    ) -> Result<BoneTransform> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let instance = state.instances.get_mut(handle).ok_or(CrowdError::InstanceNotFound)?;
        let mut motion = instance.animation.root_motion(instance.asset.skeleton(), delta);
        if zero_vertical {
            motion.translation.y = 0.0;
        }
        let moved = motion.then(&instance.world);
        let world = BoneTransform {
            scale: if include_scale { moved.scale } else { instance.world.scale },
            ..moved
        };
        instance.world = world;

        for (render, key) in state.render_targets(handle, true, false) {
            if let Some(store) = state.render_stores.get_mut(&render) {
                store.update_transform(key, &world, false);
            }
        }
        Ok(world)
    }

    /// Index of the instance skeleton in the bone texture.
    #[must_use]
    pub fn skeleton_index(&self, handle: InstanceHandle) -> Option<u32> {
        self.state.lock().instances.get(handle).map(InstanceRuntime::skeleton_index)
    }

    // ========================================================================
    // Animation
    // ========================================================================

    /// [Write] Plays `clip` on an instance; `None` plays the bind pose.
    pub fn play_animation(
        &self,
        handle: InstanceHandle,
        clip: Option<&Arc<AnimationClip>>,
        settings: PlaySettings,
        options: PlayOptions,
    ) -> Result<AnimationId> {
        let mut guard = self.state.lock();
        let CrowdState {
            instances,
            library,
            masks,
            ..
        } = &mut *guard;

        let instance = instances.get_mut(handle).ok_or(CrowdError::InstanceNotFound)?;
        let asset = Arc::clone(&instance.asset);
        Ok(instance.animation.play(&asset, clip, settings, options, library, masks))
    }

    /// [Write] Replaces the settings of a playing animation.
    pub fn tweak_animation(&self, handle: InstanceHandle, id: AnimationId, settings: PlaySettings) -> bool {
        let mut guard = self.state.lock();
        let CrowdState { instances, masks, .. } = &mut *guard;
        let Some(instance) = instances.get_mut(handle) else {
            return false;
        };
        let asset = Arc::clone(&instance.asset);
        instance.animation.tweak_animation(id, settings, &asset, masks)
    }

    /// [Write] Sets the play time of an animation.
    pub fn set_animation_time(&self, handle: InstanceHandle, id: AnimationId, time: f32) -> bool {
        let mut state = self.state.lock();
        state
            .instances
            .get_mut(handle)
            .is_some_and(|instance| instance.animation.set_animation_time(id, time))
    }

    #[must_use]
    pub fn animation_settings(&self, handle: InstanceHandle, id: AnimationId) -> Option<PlaySettings> {
        let state = self.state.lock();
        state.instances.get(handle)?.animation.settings_of(id).cloned()
    }

    /// [Write] Removes an animation immediately, without blend-out.
    pub fn remove_animation(&self, handle: InstanceHandle, id: AnimationId) -> bool {
        let mut guard = self.state.lock();
        let CrowdState { instances, masks, .. } = &mut *guard;
        instances
            .get_mut(handle)
            .is_some_and(|instance| instance.animation.remove_animation(id, masks))
    }

    /// [Write] Removes every animation above the bind pose accepted by
    /// `predicate`. Returns the number of removed layers.
    pub fn clear_animations<F>(
        &self,
        handle: InstanceHandle,
        force_mode: ForceMode,
        mask: &MaskDefinition,
        predicate: F,
    ) -> usize
    where
        F: FnMut(&AnimationLayer) -> bool,
    {
        let mut guard = self.state.lock();
        let CrowdState { instances, masks, .. } = &mut *guard;
        instances.get_mut(handle).map_or(0, |instance| {
            instance.animation.clear_animations(force_mode, mask, masks, predicate)
        })
    }

    /// The layer currently contributing the largest weight.
    #[must_use]
    pub fn highest_priority_animation(&self, handle: InstanceHandle) -> Option<AnimationLayer> {
        let state = self.state.lock();
        state.instances.get(handle)?.animation.highest_priority().cloned()
    }

    /// Snapshot of the layer stack, bind pose first.
    #[must_use]
    pub fn animation_layers(&self, handle: InstanceHandle) -> Option<Vec<AnimationLayer>> {
        let state = self.state.lock();
        Some(state.instances.get(handle)?.animation.layers().to_vec())
    }

    /// [Write] Enables or disables animation solving for an instance.
    pub fn set_animation_tick(&self, handle: InstanceHandle, enabled: bool) -> bool {
        let mut state = self.state.lock();
        match state.instances.get_mut(handle) {
            Some(instance) => {
                instance.animation.set_tick_enabled(enabled);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Bones
    // ========================================================================

    #[must_use]
    pub fn bone_transform(&self, handle: InstanceHandle, bone: &str, space: BoneSpace) -> Option<BoneTransform> {
        let state = self.state.lock();
        let instance = state.instances.get(handle)?;
        let index = instance.asset.skeleton().find_bone(bone)?;
        Some(state.pose_view(instance).bone_transform(index, space))
    }

    /// Batch form of [`bone_transform`](Self::bone_transform) under a single
    /// lock. Unknown bones yield `None`.
    #[must_use]
    pub fn bone_transforms(&self, handle: InstanceHandle, bones: &[&str], space: BoneSpace) -> Vec<Option<BoneTransform>> {
        let state = self.state.lock();
        let Some(instance) = state.instances.get(handle) else {
            return vec![None; bones.len()];
        };
        let view = state.pose_view(instance);
        let skeleton = instance.asset.skeleton();
        bones
            .iter()
            .map(|name| skeleton.find_bone(name).map(|index| view.bone_transform(index, space)))
            .collect()
    }

    /// [Write] Pins a skinned bone to `transform`.
    ///
    /// Only bones with a GPU index can be overridden. Overrides are stored in
    /// component space and sent with the IK segment of every frame.
    pub fn override_bone_transform(
        &self,
        handle: InstanceHandle,
        bone: &str,
        transform: BoneTransform,
        space: BoneSpace,
    ) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(instance) = state.instances.get(handle) else {
            return false;
        };
        let skeleton = instance.asset.skeleton();
        let Some(index) = skeleton.find_bone(bone) else {
            return false;
        };
        if instance.asset.gpu_bone_index(index).is_none() {
            return false;
        }

        let component = match space {
            BoneSpace::Component => transform,
            BoneSpace::World => transform.then(&instance.world.inverse()),
            BoneSpace::Local => match skeleton.parent_index(index) {
                Some(parent) => {
                    let parent = state.pose_view(instance).bone_transform(parent, BoneSpace::Component);
                    transform.then(&parent)
                }
                None => transform,
            },
        };

        if let Some(instance) = state.instances.get_mut(handle) {
            instance.overrides.insert(index, component);
        }
        true
    }

    /// [Write] Releases a bone pinned by
    /// [`override_bone_transform`](Self::override_bone_transform).
    pub fn remove_override_bone_transform(&self, handle: InstanceHandle, bone: &str) -> bool {
        let mut state = self.state.lock();
        let Some(instance) = state.instances.get_mut(handle) else {
            return false;
        };
        let Some(index) = instance.asset.skeleton().find_bone(bone) else {
            return false;
        };
        instance.overrides.remove(&index).is_some()
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// [Write] Attaches a secondary mesh to an instance.
    pub fn attach(&self, parent: InstanceHandle, desc: AttachmentDesc) -> Result<AttachmentHandle> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let instance = state.instances.get(parent).ok_or(CrowdError::InstanceNotFound)?;
        let gpu_bone = match &desc.bone {
            Some(name) => {
                let gpu = instance
                    .asset
                    .skeleton()
                    .find_bone(name)
                    .and_then(|cpu| instance.asset.gpu_bone_index(cpu));
                Some(gpu.ok_or_else(|| CrowdError::BoneNotFound(name.clone()))?)
            }
            None => None,
        };

        let world = instance.world;
        let skeleton_index = instance.skeleton_index();
        let parent_custom = state
            .render_stores
            .get(&instance.asset.render_handle())
            .and_then(|store| store.custom_data(RenderKey::Instance(parent)))
            .map(<[f32]>::to_vec);

        let render = desc.render.handle();
        let handle = state.attachments.insert(Attachment {
            parent,
            render,
            gpu_bone,
            mirror_custom_data: desc.mirror_custom_data,
        });
        if let Some(instance) = state.instances.get_mut(parent) {
            instance.attachments.push(handle);
        }

        let key = RenderKey::Attachment(handle);
        let store = state.render_store(render, &desc.bounds);
        store.allocate(key);
        store.update_transform(key, &world, true);
        store.set_skeleton_index(key, skeleton_index);
        store.set_flags(key, InstanceFlags::alive(gpu_bone.unwrap_or(0).min(127) as u8));
        if desc.mirror_custom_data
            && let Some(values) = parent_custom
        {
            store.set_custom_data_array(key, &values);
        }
        Ok(handle)
    }

    /// [Write] Removes an attachment.
    pub fn detach(&self, handle: AttachmentHandle) -> bool {
        let mut state = self.state.lock();
        let Some(attachment) = state.remove_attachment(handle) else {
            return false;
        };
        if let Some(parent) = state.instances.get_mut(attachment.parent) {
            parent.attachments.retain(|child| *child != handle);
        }
        true
    }

    #[must_use]
    pub fn attachments(&self, parent: InstanceHandle) -> Vec<AttachmentHandle> {
        let state = self.state.lock();
        state
            .instances
            .get(parent)
            .map(|instance| instance.attachments.to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn attachment_parent(&self, handle: AttachmentHandle) -> Option<InstanceHandle> {
        self.state.lock().attachments.get(handle).map(|attachment| attachment.parent)
    }

    // ========================================================================
    // Custom data
    // ========================================================================

    /// [Write] Writes one custom float, optionally mirrored to attachments.
    ///
    /// Returns `false` for unknown instances and indices at or beyond the
    /// configured width.
    pub fn set_custom_data(&self, handle: InstanceHandle, index: usize, value: f32, include_attachments: bool) -> bool {
        let mut state = self.state.lock();
        if index >= state.settings.custom_data_width {
            return false;
        }
        let targets = state.render_targets(handle, include_attachments, true);
        let mut written = false;
        for (render, key) in targets {
            if let Some(store) = state.render_stores.get_mut(&render) {
                written |= store.set_custom_data(key, index, value);
            }
        }
        written
    }

    /// [Write] Writes custom floats from index 0, truncated to the width.
    pub fn set_custom_data_array(&self, handle: InstanceHandle, values: &[f32], include_attachments: bool) -> bool {
        let mut state = self.state.lock();
        let targets = state.render_targets(handle, include_attachments, true);
        let mut written = false;
        for (render, key) in targets {
            if let Some(store) = state.render_stores.get_mut(&render) {
                written |= store.set_custom_data_array(key, values);
            }
        }
        written
    }

    #[must_use]
    pub fn custom_data(&self, handle: InstanceHandle) -> Option<Vec<f32>> {
        let state = self.state.lock();
        let instance = state.instances.get(handle)?;
        state
            .render_stores
            .get(&instance.asset.render_handle())?
            .custom_data(RenderKey::Instance(handle))
            .map(<[f32]>::to_vec)
    }

    #[must_use]
    pub fn attachment_custom_data(&self, handle: AttachmentHandle) -> Option<Vec<f32>> {
        let state = self.state.lock();
        let attachment = state.attachments.get(handle)?;
        state
            .render_stores
            .get(&attachment.render)?
            .custom_data(RenderKey::Attachment(handle))
            .map(<[f32]>::to_vec)
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// [Write] Advances the crowd by `delta` seconds.
    ///
    /// Culls every instance against `cameras` (skipped when culling is off or
    /// no camera is given), solves every instance's animation and rebuilds
    /// the shared tables when needed. Returns the new frame number.
    pub fn tick(&self, delta: f32, cameras: &[CameraView]) -> u64 {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let frame = state.clock.tick(delta);
        let delta = state.clock.delta;
        state.frustums = cameras.iter().map(CameraView::frustum).collect();
        let culling = state.settings.frustum_culling && !state.frustums.is_empty();

        let CrowdState {
            instances,
            library,
            masks,
            frustums,
            ..
        } = &mut *state;
        for instance in instances.values_mut() {
            instance.visible = !culling
                || !instance.asset.frustum_culling()
                || is_visible(&instance_bounds(&instance.world, instance.asset.bounds()), frustums);
            instance.animation.solve(delta, frame, library, masks);
        }

        state.rebuild_tables();
        state.last_frame_cameras = cameras.to_vec();
        log::trace!("Crowd frame {frame}: {} instances", state.instances.len());
        frame
    }

    /// Cameras passed to the most recent [`tick`](Self::tick).
    #[must_use]
    pub fn last_frame_cameras(&self) -> Vec<CameraView> {
        self.state.lock().last_frame_cameras.clone()
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.state.lock().clock.frame_count
    }

    /// [Write] Collects the frame arrays of every visible instance and the
    /// pose rows baked since the previous call.
    pub fn build_frame(&self) -> FrameOutput {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.rebuild_tables();

        let mut output = FrameOutput {
            frame: state.clock.frame_count,
            max_cpu_bones: state.remap.max_cpu_bones(),
            remap: state.remap.rows().to_vec(),
            inverse_rest: state.remap.inverse_rest_rows().to_vec(),
            remap_changed: std::mem::take(&mut state.remap_changed),
            mask_stride: state.mask_stride,
            mask_table: state.mask_table.clone(),
            masks_changed: std::mem::take(&mut state.masks_changed),
            ..Default::default()
        };

        for (handle, instance) in &state.instances {
            if !instance.visible {
                continue;
            }
            output.instances.push(handle);
            output.skeleton_indices.push(instance.skeleton_index());
            output
                .asset_indices
                .push(state.remap.asset_index(instance.asset.id()).unwrap_or(u32::MAX));

            let start = output.keyframes.len() as u32;
            for layer in instance.animation.layers() {
                let span = layer.span();
                let [slot0, slot1] = layer.slots();
                output.keyframes.push(KeyframeEntry {
                    frame0_slot: slot0.map_or(-1, |slot| slot as i32),
                    frame1_slot: slot1.map_or(-1, |slot| slot as i32),
                    alpha: quantize_unit(span.alpha),
                    weight: quantize_unit(layer.final_weight()),
                    mask_index: state.mask_rows.get(&layer.mask()).map_or(-1, |&row| row as i32),
                });
            }
            output.animation_segments.push([start, output.keyframes.len() as u32]);

            let start = output.ik_bones.len() as u32;
            let mut overrides: Vec<(u32, &BoneTransform)> = instance
                .overrides
                .iter()
                .filter_map(|(&cpu, transform)| instance.asset.gpu_bone_index(cpu).map(|gpu| (gpu, transform)))
                .collect();
            overrides.sort_unstable_by_key(|(gpu, _)| *gpu);
            for (gpu, transform) in overrides {
                output.ik_bones.push(gpu as i32);
                output.ik_rows.extend_from_slice(&matrix_rows(&transform.to_affine()));
            }
            output.ik_segments.push([start, output.ik_bones.len() as u32]);
        }

        output.instance_count = output.instances.len();
        output.keyframe_count = output.keyframes.len();
        output.ik_count = output.ik_bones.len();

        let (new_rows_start, new_rows) = state.library.take_new_rows();
        output.new_rows_start = new_rows_start;
        output.new_rows = new_rows.to_vec();
        output.total_rows = state.library.row_count();

        output.pad_empty();
        output
    }

    /// Builds the frame arrays and hands them to `sink` outside the lock.
    pub fn dispatch<S: DispatchSink + ?Sized>(&self, sink: &mut S) -> FrameOutput {
        let frame = self.build_frame();
        sink.dispatch(&frame);
        frame
    }

    /// [Write] Flushes every render store with pending changes. Returns the
    /// number of stores flushed.
    ///
    /// Dirty arrays are copied under the lock and handed to `sink` after it
    /// is released, so the sink may call back into the context.
    pub fn flush_render<S: RenderSink + ?Sized>(&self, sink: &mut S) -> usize {
        let flushes: Vec<RenderFlush> = {
            let mut state = self.state.lock();
            let mut flushes: Vec<RenderFlush> = state
                .render_stores
                .values_mut()
                .filter_map(InstanceRenderStore::take_flush)
                .collect();
            flushes.sort_unstable_by_key(|flush| flush.handle);
            flushes
        };
        for flush in &flushes {
            flush.send(sink);
        }
        flushes.len()
    }

    #[must_use]
    pub fn stats(&self) -> CrowdStats {
        let state = self.state.lock();
        CrowdStats {
            frame: state.clock.frame_count,
            assets: state.assets.len(),
            active_assets: state.active_assets.len(),
            instances: state.instances.len(),
            visible_instances: state.instances.values().filter(|i| i.visible).count(),
            attachments: state.attachments.len(),
            render_stores: state.render_stores.len(),
            pose_entries: state.library.len(),
            pose_bakes: state.library.bake_count(),
            pose_rows: state.library.row_count(),
            bone_texture_rows: state.allocator.allocated(),
            masks: state.masks.len(),
        }
    }

    /// Runs `f` with read access to the pose library.
    pub fn with_library<R>(&self, f: impl FnOnce(&PoseLibrary) -> R) -> R {
        f(&self.state.lock().library)
    }
}
