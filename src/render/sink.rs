use glam::{Quat, Vec3};

use crate::math::BoundingBox;
use crate::render::RenderHandle;

/// One whole per-instance array of a render store.
#[derive(Debug, Clone, Copy)]
pub enum RenderField<'a> {
    Position(&'a [Vec3]),
    Rotation(&'a [Quat]),
    Scale(&'a [Vec3]),
    /// Packed [`InstanceFlags`](crate::render::InstanceFlags) bytes
    Flags(&'a [u8]),
    /// `custom_data_width` floats per instance
    CustomData(&'a [f32]),
    SkeletonIndex(&'a [u32]),
}

impl RenderField<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Position(_) => "position",
            Self::Rotation(_) => "rotation",
            Self::Scale(_) => "scale",
            Self::Flags(_) => "flags",
            Self::CustomData(_) => "custom_data",
            Self::SkeletonIndex(_) => "skeleton_index",
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Position(v) | Self::Scale(v) => bytemuck::cast_slice(v),
            Self::Rotation(v) => bytemuck::cast_slice(v),
            Self::Flags(v) => v,
            Self::CustomData(v) => bytemuck::cast_slice(v),
            Self::SkeletonIndex(v) => bytemuck::cast_slice(v),
        }
    }
}

/// External instance renderer receiving flushed render stores.
pub trait RenderSink {
    fn upload(&mut self, handle: RenderHandle, field: RenderField<'_>);

    fn set_bounds(&mut self, handle: RenderHandle, bounds: &BoundingBox);
}
