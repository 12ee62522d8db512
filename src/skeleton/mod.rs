//! Skeletons and crowd mesh assets.
//!
//! - [`ReferenceSkeleton`]: bone names, parents and rest pose
//! - [`MeshAsset`]: a baked crowd mesh with its CPU→GPU bone mapping and the
//!   rolling parent cache used by the GPU hierarchy walk

pub mod asset;
pub mod parent_cache;
pub mod reference;

pub use asset::{MeshAsset, MeshAssetDesc};
pub use parent_cache::{PARENT_CACHE_LINES, ParentCache, build_parent_cache};
pub use reference::{Bone, ReferenceSkeleton};
