//! Codec identifiers and negotiated codec options.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EventError;

/// Codecs a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Codec {
    /// Uncompressed RGB rows, passed through as pushed.
    Raw = 0,

    /// H.264 baseline, Annex B byte stream.
    H264 = 1,
}

impl Codec {
    /// All codecs known to the wire format.
    pub const ALL: [Codec; 2] = [Codec::Raw, Codec::H264];

    /// The wire id of this codec.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a codec by wire id.
    pub fn from_id(id: u8) -> Result<Self, EventError> {
        match id {
            0 => Ok(Self::Raw),
            1 => Ok(Self::H264),
            other => Err(EventError::UnknownCodec(other)),
        }
    }

    /// Lowercase name used in stream configuration documents.
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::H264 => "h264",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "Raw"),
            Self::H264 => write!(f, "H.264"),
        }
    }
}

/// Options attached to a codec request, e.g. `{"width":640,"height":360}`.
///
/// Keys referenced by the built-in codecs are `width`, `height`,
/// `framerate` and `bitrate`, all integers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecOptions(Map<String, Value>);

impl CodecOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style integer insert.
    pub fn with(mut self, key: &str, value: i64) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace an integer option.
    pub fn set(&mut self, key: &str, value: i64) {
        self.0.insert(key.to_string(), Value::from(value));
    }

    /// Parse options from the JSON text carried in a codec change event.
    ///
    /// Empty (or whitespace-only) text means "no options".
    pub fn from_json(text: &str) -> Result<Self, EventError> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(EventError::InvalidOptions(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(EventError::InvalidOptions(e.to_string())),
        }
    }

    /// Render as compact JSON text.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Integer value of `key`, if present and integral.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Whether `key` is present at all.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns true if no option is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CodecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}
