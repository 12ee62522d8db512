//! Crowd Settings
//!
//! Global configuration for a [`CrowdContext`](crate::CrowdContext).
//!
//! ```rust,ignore
//! use crowd::CrowdSettings;
//!
//! // Defaults: 512×512 bone texture rows in blocks of 8, 4 custom floats
//! let settings = CrowdSettings::default();
//!
//! // A smaller texture for tools and tests
//! let settings = CrowdSettings {
//!     bone_texture_rows: 4096,
//!     frustum_culling: false,
//!     ..Default::default()
//! };
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Edge length of the square shared bone texture.
pub const DEFAULT_BONE_TEXTURE_SIZE: usize = 512;

/// Row granularity of bone texture reservations.
pub const DEFAULT_BONE_BLOCK_SIZE: usize = 8;

/// Float slots reserved per render instance for user data.
pub const DEFAULT_CUSTOM_DATA_WIDTH: usize = 4;

/// Default pose sampling interval in seconds (20 samples per second).
pub const DEFAULT_SAMPLE_INTERVAL: f32 = 0.05;

/// Configuration shared by every subsystem of a crowd context.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CrowdSettings {
    /// Total number of rows in the shared bone texture.
    pub bone_texture_rows: usize,
    /// Allocation granularity of the bone texture, in rows.
    pub bone_block_size: usize,
    /// Number of custom-data floats per render instance.
    pub custom_data_width: usize,
    /// Sample interval used by assets that do not specify their own.
    pub default_sample_interval: f32,
    /// Master switch for frustum culling. Assets can still opt out
    /// individually.
    pub frustum_culling: bool,
}

impl Default for CrowdSettings {
    fn default() -> Self {
        Self {
            bone_texture_rows: DEFAULT_BONE_TEXTURE_SIZE * DEFAULT_BONE_TEXTURE_SIZE,
            bone_block_size: DEFAULT_BONE_BLOCK_SIZE,
            custom_data_width: DEFAULT_CUSTOM_DATA_WIDTH,
            default_sample_interval: DEFAULT_SAMPLE_INTERVAL,
            frustum_culling: true,
        }
    }
}
