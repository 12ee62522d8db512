//! Settings Tests
//!
//! Tests for:
//! - Default configuration values
//! - Serde loading with partial documents (feature `serde`)

use crowd::CrowdSettings;
use crowd::settings::{DEFAULT_BONE_BLOCK_SIZE, DEFAULT_CUSTOM_DATA_WIDTH, DEFAULT_SAMPLE_INTERVAL};

#[test]
fn defaults() {
    let settings = CrowdSettings::default();
    assert_eq!(settings.bone_block_size, DEFAULT_BONE_BLOCK_SIZE);
    assert_eq!(settings.custom_data_width, DEFAULT_CUSTOM_DATA_WIDTH);
    assert!((settings.default_sample_interval - DEFAULT_SAMPLE_INTERVAL).abs() < f32::EPSILON);
    assert!(settings.frustum_culling);
    assert_eq!(settings.bone_texture_rows % settings.bone_block_size, 0);
}

#[cfg(feature = "serde")]
mod serde_support {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() -> anyhow::Result<()> {
        let settings: CrowdSettings =
            serde_json::from_str(r#"{ "bone_block_size": 16, "frustum_culling": false }"#)?;
        assert_eq!(settings.bone_block_size, 16);
        assert!(!settings.frustum_culling);
        assert_eq!(settings.custom_data_width, DEFAULT_CUSTOM_DATA_WIDTH);
        Ok(())
    }

    #[test]
    fn round_trip() -> anyhow::Result<()> {
        let settings = CrowdSettings {
            custom_data_width: 8,
            default_sample_interval: 0.1,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings)?;
        let loaded: CrowdSettings = serde_json::from_str(&json)?;
        assert_eq!(loaded, settings);
        Ok(())
    }
}
