//! # Myth Crowd
//!
//! Animation core for large crowds of skinned-mesh instances.
//!
//! Bone animation is evaluated once per unique (skeleton, animation, sampled
//! frame) and shared by every instance that needs it. The crate covers:
//!
//! - [`animation`]: per-instance layer blending (blend in/out, group
//!   normalization, bone masks) and on-demand bone transform queries
//! - [`library`]: the deduplicating pose library that bakes a pose at most once
//!   and hands out a stable row slot
//! - [`remap`] and [`allocator`]: CPU→GPU bone tables and the best-fit range
//!   allocator for the shared bone texture
//! - [`render`]: per-renderer instance slots with dirty-field uploads
//! - [`culling`]: multi-camera frustum visibility
//! - [`crowd`]: the [`CrowdContext`] that ties everything together per frame
//!
//! Skinning itself and the GPU dispatch are external: the crate only produces
//! flat arrays through [`crowd::DispatchSink`] and [`render::RenderSink`].
//!
//! ```rust,ignore
//! use crowd::{CrowdContext, CrowdSettings};
//!
//! let context = CrowdContext::new(CrowdSettings::default());
//! let asset = context.register_asset(asset)?;
//! let instance = context.spawn(asset, transform)?;
//! context.tick(1.0 / 60.0, &cameras);
//! let frame = context.build_frame();
//! ```

pub mod allocator;
pub mod animation;
pub mod crowd;
pub mod culling;
pub mod errors;
pub mod library;
pub mod math;
pub mod remap;
pub mod render;
pub mod settings;
pub mod skeleton;
pub mod utils;

pub use allocator::BestFitAllocator;
pub use animation::{
    AnimationClip, AnimationId, BoneLayer, BoneSpace, ForceMode, ManagementMode, MaskDefinition,
    PlayOptions, PlaySettings, RootLock, RootMotionMode,
};
pub use crowd::{
    AssetHandle, AttachmentDesc, AttachmentHandle, CrowdContext, CrowdStats, FrameOutput,
    InstanceHandle,
};
pub use culling::{CameraView, Frustum};
pub use errors::{CrowdError, Result};
pub use library::{PoseKey, PoseLibrary};
pub use math::{BoneTransform, BoundingBox};
pub use settings::CrowdSettings;
pub use skeleton::{Bone, MeshAsset, MeshAssetDesc, ReferenceSkeleton};
