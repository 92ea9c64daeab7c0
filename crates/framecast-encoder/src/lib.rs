//! Frame buffers and per-codec frame encoders.
//!
//! An [`Encoder`] turns the pipeline's current [`FrameBuffer`] into an
//! [`EncodedFrame`] that is handed to every client registered with it.
//! Encoders are created through the [`EncoderFactory`] registered for their
//! codec. The raw pass-through codec is always available; H.264 needs the
//! `x264` feature.

mod convert;
mod error;
mod frame;
#[cfg(feature = "x264")]
mod h264;
mod raw;
mod settings;

pub use convert::{rgb24_to_nv12, Nv12Image};
pub use error::EncoderError;
pub use frame::{EncodedFrame, EncodedPacket, FrameBuffer, BYTES_PER_PIXEL};
#[cfg(feature = "x264")]
pub use h264::{H264Encoder, H264EncoderFactory};
pub use raw::{RawEncoder, RawEncoderFactory};
pub use settings::H264Settings;

use std::sync::Arc;

use framecast_events::{Codec, CodecOptions};
use serde::{Deserialize, Serialize};

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Default H.264 bitrate in kbps when a request does not name one.
pub const DEFAULT_H264_BITRATE_KBPS: u32 = 6000;

/// Detached form of [`Encoder::is_compatible`]. It does not borrow the encoder,
/// so it can be evaluated while the encoder is busy encoding.
pub type CompatibilityCheck = Arc<dyn Fn(&CodecOptions) -> bool + Send + Sync>;

/// A codec session bound to one set of negotiated options.
pub trait Encoder: Send {
    /// Codec produced by this encoder.
    fn codec(&self) -> Codec;

    /// Options the encoder was created with.
    fn options(&self) -> &CodecOptions;

    /// Whether a client requesting `options` can share this encoder.
    fn is_compatible(&self, options: &CodecOptions) -> bool {
        (self.compatibility())(options)
    }

    /// The compatibility rule for this encoder's negotiated options.
    ///
    /// Must agree with [`is_compatible`](Self::is_compatible) for the
    /// encoder's whole lifetime.
    fn compatibility(&self) -> CompatibilityCheck;

    /// Encode one frame.
    ///
    /// A degenerate (0-wide or 0-high) frame yields an empty output. With
    /// `force_keyframe` the output must be decodable on its own.
    fn encode_frame(
        &mut self,
        frame: &FrameBuffer,
        force_keyframe: bool,
    ) -> EncoderResult<EncodedFrame<'_>>;

    /// Short implementation name for logs.
    fn name(&self) -> &'static str;
}

/// Builds encoders for one codec.
pub trait EncoderFactory: Send + Sync {
    /// Codec this factory serves.
    fn codec(&self) -> Codec;

    /// Create an encoder for `options`, failing if they are invalid.
    fn create_encoder(&self, options: &CodecOptions) -> EncoderResult<Box<dyn Encoder>>;

    /// What this factory advertises to clients.
    fn capabilities(&self) -> CodecCapabilities;
}

/// A resolution and rate offered to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,

    /// Suggested bitrate in kbps.
    #[serde(rename = "bitrate")]
    pub bitrate_kbps: u32,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32, framerate: u32, bitrate_kbps: u32) -> Self {
        Self {
            width,
            height,
            framerate,
            bitrate_kbps,
        }
    }

    /// The modes offered when none are configured, 240p through 1080p at 60 fps.
    pub fn standard_modes() -> Vec<DisplayMode> {
        vec![
            DisplayMode::new(426, 240, 60, 1050),
            DisplayMode::new(640, 360, 60, 1500),
            DisplayMode::new(854, 480, 60, 3000),
            DisplayMode::new(1280, 720, 60, 6000),
            DisplayMode::new(1920, 1080, 60, 9000),
        ]
    }

    /// Options a client would send to request this mode.
    pub fn to_options(&self) -> CodecOptions {
        CodecOptions::new()
            .with("width", i64::from(self.width))
            .with("height", i64::from(self.height))
            .with("framerate", i64::from(self.framerate))
            .with("bitrate", i64::from(self.bitrate_kbps))
    }
}

/// Per-codec entry of the advertised stream configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecCapabilities {
    pub supported: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_display_modes: Vec<DisplayMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_modes() {
        let modes = DisplayMode::standard_modes();
        assert_eq!(modes.len(), 5);
        assert_eq!(modes[0], DisplayMode::new(426, 240, 60, 1050));
        assert_eq!(modes[4].width, 1920);
    }

    #[test]
    fn test_mode_to_options() {
        let options = DisplayMode::new(640, 360, 30, 1500).to_options();
        assert_eq!(options.get_int("width"), Some(640));
        assert_eq!(options.get_int("bitrate"), Some(1500));
    }

    #[test]
    fn test_capabilities_json() {
        let caps = CodecCapabilities {
            supported: true,
            available_display_modes: vec![DisplayMode::new(640, 360, 60, 1500)],
        };
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["supported"], true);
        assert_eq!(json["availableDisplayModes"][0]["height"], 360);
        assert_eq!(json["availableDisplayModes"][0]["bitrate"], 1500);

        let bare = serde_json::to_value(CodecCapabilities {
            supported: true,
            available_display_modes: Vec::new(),
        })
        .unwrap();
        assert!(bare.get("availableDisplayModes").is_none());
    }
}
