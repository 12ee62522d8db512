use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::animation::AnimationState;
use crate::crowd::handles::{AssetHandle, AttachmentHandle, InstanceHandle};
use crate::math::{BoneTransform, BoundingBox};
use crate::render::{RenderHandle, RenderHandleDesc};
use crate::skeleton::MeshAsset;

/// Runtime state of one spawned crowd instance.
#[derive(Debug)]
pub struct InstanceRuntime {
    pub(crate) asset_handle: AssetHandle,
    pub(crate) asset: Arc<MeshAsset>,
    pub(crate) world: BoneTransform,
    pub(crate) visible: bool,
    pub(crate) animation: AnimationState,
    /// Component-space overrides keyed by CPU bone
    pub(crate) overrides: FxHashMap<usize, BoneTransform>,
    pub(crate) attachments: SmallVec<[AttachmentHandle; 2]>,
    /// First row of the instance's range in the shared bone texture
    pub(crate) bone_rows_start: usize,
    pub(crate) bone_rows_len: usize,
}

impl InstanceRuntime {
    #[must_use]
    pub fn asset_handle(&self) -> AssetHandle {
        self.asset_handle
    }

    #[must_use]
    pub fn asset(&self) -> &Arc<MeshAsset> {
        &self.asset
    }

    #[must_use]
    pub fn world_transform(&self) -> &BoneTransform {
        &self.world
    }

    /// Result of the last culling pass.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    #[must_use]
    pub fn overrides(&self) -> &FxHashMap<usize, BoneTransform> {
        &self.overrides
    }

    #[must_use]
    pub fn attachments(&self) -> &[AttachmentHandle] {
        &self.attachments
    }

    /// Index of the instance skeleton in the bone texture.
    #[must_use]
    pub fn skeleton_index(&self) -> u32 {
        self.bone_rows_start as u32
    }

    #[must_use]
    pub fn bone_rows(&self) -> std::ops::Range<usize> {
        self.bone_rows_start..self.bone_rows_start + self.bone_rows_len
    }
}

/// A secondary mesh that follows a crowd instance.
#[derive(Debug, Clone)]
pub struct AttachmentDesc {
    pub render: RenderHandleDesc,
    /// Local-space bounds of the attached mesh
    pub bounds: BoundingBox,
    /// Bone the attachment follows; `None` follows the instance root
    pub bone: Option<String>,
    /// Receive the parent's custom data writes
    pub mirror_custom_data: bool,
}

impl AttachmentDesc {
    #[must_use]
    pub fn new(mesh: &str) -> Self {
        Self {
            render: RenderHandleDesc::new(mesh),
            bounds: BoundingBox::default(),
            bone: None,
            mirror_custom_data: true,
        }
    }

    #[must_use]
    pub fn with_bone(mut self, bone: &str) -> Self {
        self.bone = Some(bone.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Attachment {
    pub(crate) parent: InstanceHandle,
    pub(crate) render: RenderHandle,
    pub(crate) gpu_bone: Option<u32>,
    pub(crate) mirror_custom_data: bool,
}
