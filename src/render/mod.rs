//! Instance Render Stores
//!
//! Per-renderer instance arrays handed to the external instance renderer.
//! Instances that share a [`RenderHandle`] (same mesh, materials and render
//! flags) live in one [`InstanceRenderStore`]; changes are tracked per field
//! with [`DirtyFields`] and pushed through a [`RenderSink`] once per frame.

pub mod flags;
pub mod handle;
pub mod sink;
pub mod store;

pub use flags::{DirtyFields, InstanceFlags};
pub use handle::{RenderHandle, RenderHandleDesc};
pub use sink::{RenderField, RenderSink};
pub use store::{InstanceRenderStore, RenderFlush};
