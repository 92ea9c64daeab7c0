//! x264-backed H.264 encoder.

use std::sync::Arc;

use framecast_events::{Codec, CodecOptions};
use tracing::{debug, info, instrument, trace};

use crate::convert::{rgb24_to_nv12, Nv12Image};
use crate::error::EncoderError;
use crate::frame::{EncodedFrame, FrameBuffer};
use crate::settings::H264Settings;
use crate::{
    CodecCapabilities, CompatibilityCheck, DisplayMode, Encoder, EncoderFactory, EncoderResult,
};

/// Baseline-profile, zero-latency H.264 encoder.
///
/// Input frames of any size are scaled to the negotiated resolution. A new
/// input size or a forced keyframe restarts the codec session, so the next
/// output always begins with SPS/PPS and an IDR picture.
pub struct H264Encoder {
    settings: H264Settings,
    options: CodecOptions,
    session: Option<x264::Encoder>,
    input_size: (u32, u32),
    picture: Nv12Image,
    output: Vec<u8>,
    frame_index: i64,
}

impl H264Encoder {
    /// Create an encoder and open its first session.
    #[instrument(name = "h264_new", skip_all)]
    pub fn new(settings: H264Settings) -> EncoderResult<Self> {
        let session = open_session(&settings)?;

        Ok(Self {
            options: settings.to_options(),
            settings,
            session: Some(session),
            input_size: (0, 0),
            picture: Nv12Image::new(settings.width, settings.height),
            output: Vec::new(),
            frame_index: 0,
        })
    }

    pub fn settings(&self) -> &H264Settings {
        &self.settings
    }

    fn reset(&mut self, reason: &'static str) {
        debug!(reason, "Restarting x264 session");
        self.session = None;
        self.frame_index = 0;
    }
}

fn open_session(settings: &H264Settings) -> EncoderResult<x264::Encoder> {
    debug!(
        width = settings.width,
        height = settings.height,
        framerate = settings.framerate,
        bitrate_kbps = settings.bitrate_kbps,
        "Opening x264 session"
    );

    let setup = x264::Setup::preset(
        x264::Preset::Ultrafast,
        x264::Tune::None,
        false, // fast_decode
        true,  // zero_latency
    )
    .fps(settings.framerate, 1)
    .bitrate(settings.bitrate_kbps as i32)
    .max_keyframe_interval((settings.framerate * 2) as i32)
    .scenecut_threshold(0)
    .baseline();

    setup
        .build(
            x264::Colorspace::NV12,
            settings.width as i32,
            settings.height as i32,
        )
        .map_err(|e| EncoderError::Initialization {
            codec: Codec::H264,
            reason: format!("x264 setup failed: {:?}", e),
        })
}

impl Encoder for H264Encoder {
    fn codec(&self) -> Codec {
        Codec::H264
    }

    fn options(&self) -> &CodecOptions {
        &self.options
    }

    fn is_compatible(&self, options: &CodecOptions) -> bool {
        self.settings.is_compatible(options)
    }

    fn compatibility(&self) -> CompatibilityCheck {
        let settings = self.settings;
        Arc::new(move |options: &CodecOptions| settings.is_compatible(options))
    }

    #[instrument(name = "h264_encode", skip_all, fields(force_keyframe = force_keyframe))]
    fn encode_frame(
        &mut self,
        frame: &FrameBuffer,
        force_keyframe: bool,
    ) -> EncoderResult<EncodedFrame<'_>> {
        let (width, height) = (self.settings.width, self.settings.height);
        if frame.is_empty() {
            return Ok(EncodedFrame::empty(width, height));
        }

        let input_size = (frame.width(), frame.height());
        if input_size != self.input_size {
            if self.input_size != (0, 0) {
                self.reset("input size changed");
            }
            self.input_size = input_size;
        }
        if force_keyframe && self.frame_index > 0 {
            self.reset("keyframe requested");
        }

        let session = match self.session.take() {
            Some(session) => session,
            None => open_session(&self.settings)?,
        };
        let session = self.session.insert(session);

        rgb24_to_nv12(frame, width, height, &mut self.picture);
        let image = x264::Image::new(
            x264::Colorspace::NV12,
            width as i32,
            height as i32,
            &[
                x264::Plane {
                    data: self.picture.y_plane(),
                    stride: width as i32,
                },
                x264::Plane {
                    data: self.picture.uv_plane(),
                    stride: width as i32,
                },
            ],
        );

        let (data, picture) = session
            .encode(self.frame_index, image)
            .map_err(|e| EncoderError::Encoding(format!("x264 encode failed: {:?}", e)))?;

        self.output.clear();
        self.output.extend_from_slice(data.entirety());
        self.frame_index += 1;

        trace!(
            frame = self.frame_index,
            bytes = self.output.len(),
            keyframe = picture.keyframe(),
            "Encoded frame"
        );

        Ok(EncodedFrame::new(width, height, &self.output))
    }

    fn name(&self) -> &'static str {
        "x264"
    }
}

impl Drop for H264Encoder {
    fn drop(&mut self) {
        debug!("Closing x264 encoder");
    }
}

// SAFETY: x264::Encoder uses raw pointers internally but is designed for
// single-threaded use. The encoder is only accessed from one thread at a time.
unsafe impl Send for H264Encoder {}

/// Factory for [`H264Encoder`]s.
#[derive(Debug, Clone)]
pub struct H264EncoderFactory {
    default_bitrate_kbps: u32,
    display_modes: Vec<DisplayMode>,
}

impl H264EncoderFactory {
    pub fn new(default_bitrate_kbps: u32, display_modes: Vec<DisplayMode>) -> Self {
        Self {
            default_bitrate_kbps,
            display_modes,
        }
    }
}

impl Default for H264EncoderFactory {
    fn default() -> Self {
        Self::new(crate::DEFAULT_H264_BITRATE_KBPS, DisplayMode::standard_modes())
    }
}

impl EncoderFactory for H264EncoderFactory {
    fn codec(&self) -> Codec {
        Codec::H264
    }

    fn create_encoder(&self, options: &CodecOptions) -> EncoderResult<Box<dyn Encoder>> {
        let settings = H264Settings::from_options(options, self.default_bitrate_kbps)?;
        let encoder = H264Encoder::new(settings)?;
        info!(
            width = settings.width,
            height = settings.height,
            framerate = settings.framerate,
            bitrate_kbps = settings.bitrate_kbps,
            "Created H.264 encoder"
        );
        Ok(Box::new(encoder))
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            supported: true,
            available_display_modes: self.display_modes.clone(),
        }
    }
}
