//! Streamer configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use framecast_encoder::{DisplayMode, DEFAULT_H264_BITRATE_KBPS};

use crate::error::EngineError;
use crate::wait::WaitStrategy;
use crate::EngineResult;

/// Conventional name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "webstreamer_config.json";

/// Top-level configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// How idle pipeline and tick loops wait.
    pub scheduling: WaitStrategy,
    pub codecs: CodecsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecsConfig {
    pub h264: H264Config,
}

/// H.264 settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct H264Config {
    /// Offer H.264 when the crate is built with it.
    pub enabled: bool,

    /// Bitrate for requests that do not name one.
    pub bitrate_kbps: u32,

    /// Modes advertised to clients.
    pub display_modes: Vec<DisplayMode>,
}

impl Default for H264Config {
    fn default() -> Self {
        Self {
            enabled: true,
            bitrate_kbps: DEFAULT_H264_BITRATE_KBPS,
            display_modes: DisplayMode::standard_modes(),
        }
    }
}

impl StreamerConfig {
    /// Parse configuration JSON.
    pub fn from_json(text: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamerConfig::default();
        assert_eq!(config.scheduling, WaitStrategy::Spin);
        assert!(config.codecs.h264.enabled);
        assert_eq!(config.codecs.h264.bitrate_kbps, 6000);
        assert_eq!(config.codecs.h264.display_modes.len(), 5);
    }

    #[test]
    fn test_partial_json() {
        let config = StreamerConfig::from_json(
            r#"{
                "scheduling": {"strategy": "block", "timeout_ms": 5},
                "codecs": {"h264": {"display_modes": [
                    {"width": 640, "height": 360, "framerate": 30, "bitrate": 1500}
                ]}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.scheduling, WaitStrategy::Block { timeout_ms: 5 });
        assert!(config.codecs.h264.enabled);
        assert_eq!(
            config.codecs.h264.display_modes,
            vec![DisplayMode::new(640, 360, 30, 1500)]
        );
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(StreamerConfig::from_json("{}").unwrap(), StreamerConfig::default());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            StreamerConfig::from_json("{\"codecs\": 3}"),
            Err(EngineError::ConfigParse(_))
        ));
        assert!(matches!(
            StreamerConfig::from_file("/nonexistent/webstreamer_config.json"),
            Err(EngineError::ConfigIo { .. })
        ));
    }
}
