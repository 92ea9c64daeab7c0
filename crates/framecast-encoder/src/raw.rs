//! Uncompressed pass-through codec.

use std::sync::Arc;

use framecast_events::{Codec, CodecOptions};
use tracing::{debug, trace};

use crate::frame::{EncodedFrame, FrameBuffer};
use crate::{CodecCapabilities, CompatibilityCheck, Encoder, EncoderFactory, EncoderResult};

/// Emits the pushed RGB rows unchanged, stride padding included.
#[derive(Debug, Default)]
pub struct RawEncoder {
    options: CodecOptions,
    output: Vec<u8>,
}

impl RawEncoder {
    pub fn new(options: CodecOptions) -> Self {
        Self {
            options,
            output: Vec::new(),
        }
    }
}

impl Encoder for RawEncoder {
    fn codec(&self) -> Codec {
        Codec::Raw
    }

    fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Raw output has no tunables, so every raw request can share it.
    fn is_compatible(&self, _options: &CodecOptions) -> bool {
        true
    }

    fn compatibility(&self) -> CompatibilityCheck {
        Arc::new(|_: &CodecOptions| true)
    }

    fn encode_frame(
        &mut self,
        frame: &FrameBuffer,
        _force_keyframe: bool,
    ) -> EncoderResult<EncodedFrame<'_>> {
        if frame.is_empty() {
            return Ok(EncodedFrame::empty(frame.width(), frame.height()));
        }

        self.output.clear();
        self.output.extend_from_slice(frame.data());
        trace!(bytes = self.output.len(), "Raw frame");

        Ok(EncodedFrame::new(frame.width(), frame.height(), &self.output))
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

/// Factory for [`RawEncoder`]s.
#[derive(Debug, Default)]
pub struct RawEncoderFactory;

impl EncoderFactory for RawEncoderFactory {
    fn codec(&self) -> Codec {
        Codec::Raw
    }

    fn create_encoder(&self, options: &CodecOptions) -> EncoderResult<Box<dyn Encoder>> {
        debug!(%options, "Creating raw encoder");
        Ok(Box::new(RawEncoder::new(options.clone())))
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            supported: true,
            available_display_modes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_is_bit_exact() {
        let src: Vec<u8> = (0..48).map(|i| (i * 5) as u8).collect();
        let mut frame = FrameBuffer::new();
        frame.fill(4, 4, &src, false).unwrap();

        let mut encoder = RawEncoder::default();
        let encoded = encoder.encode_frame(&frame, false).unwrap();
        assert_eq!(encoded.width, 4);
        assert_eq!(encoded.height, 4);
        assert_eq!(encoded.data, &src[..]);
    }

    #[test]
    fn test_degenerate_frame() {
        let mut encoder = RawEncoder::default();
        let frame = FrameBuffer::with_size(0, 16).unwrap();
        assert!(encoder.encode_frame(&frame, true).unwrap().is_empty());
    }

    #[test]
    fn test_factory() {
        let factory = RawEncoderFactory;
        let encoder = factory.create_encoder(&CodecOptions::new()).unwrap();
        assert_eq!(encoder.codec(), Codec::Raw);
        assert!(encoder.is_compatible(&CodecOptions::new().with("width", 5)));
        assert!((encoder.compatibility())(&CodecOptions::new().with("width", 5)));
        assert!(factory.capabilities().supported);
    }
}
