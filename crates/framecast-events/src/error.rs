//! Error types for event decoding and encoding.

use thiserror::Error;

use crate::event::EventKind;

/// Errors raised while converting events to or from wire bytes.
///
/// An unrecognized kind tag is not an error: it decodes to
/// [`Event::Unknown`](crate::Event::Unknown). These variants describe
/// payloads that claim a known kind but cannot be read as one.
#[derive(Debug, Error)]
pub enum EventError {
    /// The message contained no bytes at all.
    #[error("empty event message")]
    Empty,

    /// The payload length does not match the layout of its kind.
    #[error("invalid {kind} payload length: expected {expected}, got {actual}")]
    InvalidLength {
        kind: EventKind,
        expected: usize,
        actual: usize,
    },

    /// The codec id of a codec change request is not known.
    #[error("unknown codec id: {0:#x}")]
    UnknownCodec(u8),

    /// The codec options blob is not a JSON object.
    #[error("invalid codec options: {0}")]
    InvalidOptions(String),

    /// A text field is not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// An action byte does not map to a known action.
    #[error("invalid {kind} action: {value}")]
    InvalidAction { kind: EventKind, value: u8 },

    /// A mouse button byte does not map to a known button.
    #[error("invalid mouse button: {0}")]
    InvalidButton(u8),

    /// A length-prefixed field does not fit its one-byte prefix.
    #[error("{field} too long: {len} bytes (max 255)")]
    FieldTooLong { field: &'static str, len: usize },
}
