//! H.264 option negotiation.

use framecast_events::{Codec, CodecOptions};

use crate::error::EncoderError;
use crate::EncoderResult;

const MAX_DIMENSION: i64 = 8192;
const MAX_FRAMERATE: i64 = 240;

/// Output geometry and rate of an H.264 session, read from codec options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct H264Settings {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub bitrate_kbps: u32,
}

impl H264Settings {
    /// Read settings from request options.
    ///
    /// `width`, `height` and `framerate` are required. `bitrate` falls back
    /// to `default_bitrate_kbps`.
    pub fn from_options(options: &CodecOptions, default_bitrate_kbps: u32) -> EncoderResult<Self> {
        let width = required(options, "width", 2, MAX_DIMENSION)?;
        let height = required(options, "height", 2, MAX_DIMENSION)?;
        let framerate = required(options, "framerate", 1, MAX_FRAMERATE)?;
        let bitrate_kbps = match options.get_int("bitrate") {
            Some(value) => checked(value, "bitrate", 1, i64::from(u32::MAX))?,
            None if options.contains("bitrate") => return Err(non_integer("bitrate")),
            None => default_bitrate_kbps,
        };

        // 4:2:0 chroma needs even dimensions.
        for (key, value) in [("width", width), ("height", height)] {
            if value % 2 != 0 {
                return Err(EncoderError::InvalidOption {
                    codec: Codec::H264,
                    key,
                    value: i64::from(value),
                });
            }
        }

        Ok(Self {
            width,
            height,
            framerate,
            bitrate_kbps,
        })
    }

    /// Whether a request for `options` can be served by these settings.
    ///
    /// Every key the request names must match exactly; keys it leaves out
    /// match anything.
    pub fn is_compatible(&self, options: &CodecOptions) -> bool {
        [
            ("width", self.width),
            ("height", self.height),
            ("framerate", self.framerate),
            ("bitrate", self.bitrate_kbps),
        ]
        .into_iter()
        .all(|(key, own)| match options.get_int(key) {
            Some(value) => value == i64::from(own),
            None => !options.contains(key),
        })
    }

    /// The fully-specified options these settings stand for.
    pub fn to_options(&self) -> CodecOptions {
        CodecOptions::new()
            .with("width", i64::from(self.width))
            .with("height", i64::from(self.height))
            .with("framerate", i64::from(self.framerate))
            .with("bitrate", i64::from(self.bitrate_kbps))
    }
}

fn required(options: &CodecOptions, key: &'static str, min: i64, max: i64) -> EncoderResult<u32> {
    match options.get_int(key) {
        Some(value) => checked(value, key, min, max),
        None if options.contains(key) => Err(non_integer(key)),
        None => Err(EncoderError::MissingOption {
            codec: Codec::H264,
            key,
        }),
    }
}

fn checked(value: i64, key: &'static str, min: i64, max: i64) -> EncoderResult<u32> {
    if (min..=max).contains(&value) {
        // In range, so it fits.
        Ok(value as u32)
    } else {
        Err(EncoderError::InvalidOption {
            codec: Codec::H264,
            key,
            value,
        })
    }
}

fn non_integer(key: &'static str) -> EncoderError {
    EncoderError::InvalidOption {
        codec: Codec::H264,
        key,
        value: -1,
    }
}
