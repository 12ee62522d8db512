//! Error Types
//!
//! This module defines the error types used throughout the crowd core.
//!
//! # Overview
//!
//! The main error type [`CrowdError`] covers the failure modes that abort an
//! operation instead of degrading gracefully:
//! - Malformed skeletons and mesh assets
//! - Bone texture exhaustion during spawn
//! - Stale instance / attachment handles
//!
//! Per-frame lookups (bone names, mask handles, pose keys) never return an
//! error; they answer with `Option`/`bool` so a bad input cannot abort a frame.
//!
//! # Usage
//!
//! Fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, CrowdError>`.
//!
//! ```rust,ignore
//! use crowd::errors::{CrowdError, Result};
//!
//! fn spawn_one(context: &CrowdContext) -> Result<()> {
//!     let _handle = context.spawn(asset, transform)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the crowd core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrowdError {
    // ========================================================================
    // Skeleton & Asset Errors
    // ========================================================================
    /// A skeleton must contain at least one bone.
    #[error("Skeleton '{0}' has no bones")]
    EmptySkeleton(String),

    /// A parent index points outside the bone list.
    #[error("Bone {bone} has an out of range parent index {parent}")]
    InvalidParent {
        /// Offending bone
        bone: usize,
        /// The invalid parent index
        parent: usize,
    },

    /// The parent chain of a bone never reaches a root.
    #[error("Bone {bone} is part of a parent cycle")]
    SkeletonCycle {
        /// First bone found on the cycle
        bone: usize,
    },

    /// A skinned bone index is outside the reference skeleton.
    #[error("Skinned bone index {index} is out of range (skeleton has {count} bones)")]
    BoneOutOfRange {
        /// The invalid index
        index: usize,
        /// Number of bones in the skeleton
        count: usize,
    },

    /// The asset sample interval must be positive.
    #[error("Invalid sample interval {0}")]
    InvalidSampleInterval(f32),

    /// The asset handle does not refer to a registered asset.
    #[error("Mesh asset not registered")]
    AssetNotFound,

    // ========================================================================
    // Allocation Errors
    // ========================================================================
    /// The shared bone texture has no free range large enough.
    #[error("Bone texture allocation failed: {requested} rows requested")]
    SlotAllocationFailed {
        /// Number of rows that could not be reserved
        requested: usize,
    },

    // ========================================================================
    // Instance Errors
    // ========================================================================
    /// The instance handle is stale or was never spawned.
    #[error("Instance not found")]
    InstanceNotFound,

    /// The attachment handle is stale or was never created.
    #[error("Attachment not found")]
    AttachmentNotFound,

    /// No bone with this name exists in the instance skeleton.
    #[error("Bone not found: {0}")]
    BoneNotFound(String),
}

/// Alias for `Result<T, CrowdError>`.
pub type Result<T> = std::result::Result<T, CrowdError>;
