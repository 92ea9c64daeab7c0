//! The stream configuration advertised to clients.

use std::collections::BTreeMap;

use serde::Serialize;

use framecast_encoder::CodecCapabilities;
use framecast_events::Codec;

use crate::EngineResult;

/// What clients can request, keyed by codec name.
///
/// Serializes as `{"codecs":{"raw":{"supported":true},"h264":{...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamConfig {
    pub codecs: BTreeMap<String, CodecCapabilities>,
}

impl StreamConfig {
    pub fn set_codec(&mut self, codec: Codec, capabilities: CodecCapabilities) {
        self.codecs.insert(codec.name().to_string(), capabilities);
    }

    pub fn supports(&self, codec: Codec) -> bool {
        self.codecs
            .get(codec.name())
            .is_some_and(|caps| caps.supported)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_encoder::DisplayMode;

    #[test]
    fn test_json_layout() {
        let mut config = StreamConfig::default();
        config.set_codec(
            Codec::Raw,
            CodecCapabilities {
                supported: true,
                available_display_modes: Vec::new(),
            },
        );
        config.set_codec(
            Codec::H264,
            CodecCapabilities {
                supported: true,
                available_display_modes: vec![DisplayMode::new(1280, 720, 60, 6000)],
            },
        );

        assert!(config.supports(Codec::H264));
        let json: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(json["codecs"]["raw"]["supported"], true);
        assert_eq!(json["codecs"]["h264"]["availableDisplayModes"][0]["width"], 1280);
    }

    #[test]
    fn test_unregistered_codec_is_unsupported() {
        assert!(!StreamConfig::default().supports(Codec::Raw));
    }
}
