//! Error types for the encoder crate.

use thiserror::Error;

use framecast_events::Codec;

/// Errors that can occur while creating or running an encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// A required codec option is absent.
    #[error("missing required {codec} option: {key}")]
    MissingOption { codec: Codec, key: &'static str },

    /// A codec option is present but out of range.
    #[error("invalid {codec} option {key}={value}")]
    InvalidOption {
        codec: Codec,
        key: &'static str,
        value: i64,
    },

    /// The codec library refused its configuration.
    #[error("{codec} initialization failed: {reason}")]
    Initialization { codec: Codec, reason: String },

    /// The codec library failed on a frame.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The frame buffer does not match its declared geometry.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
