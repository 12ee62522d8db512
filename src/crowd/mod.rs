//! Crowd Runtime
//!
//! The public entry point of the crate. A [`CrowdContext`] owns the pose
//! library, mask registry, bone remap tables, bone texture allocator and the
//! per-renderer instance stores, and exposes the instance / animation /
//! attachment API through slotmap handles.
//!
//! - [`handles`]: typed keys for assets, instances and attachments
//! - [`instance`]: per-instance runtime state and attachment descriptors
//! - [`output`]: the flattened per-frame arrays for the GPU dispatch

pub mod context;
pub mod handles;
pub mod instance;
pub mod output;

pub use context::{CrowdContext, CrowdStats};
pub use handles::{AssetHandle, AttachmentHandle, InstanceHandle, RenderKey};
pub use instance::{AttachmentDesc, InstanceRuntime};
pub use output::{DispatchSink, FrameOutput, KeyframeEntry};
