//! Control and input events exchanged between the streamer and its clients.
//!
//! The binary layout is shared with existing browser clients; see
//! [`Event::from_bytes`] and [`Event::to_bytes`].

mod error;
mod event;
mod input;
mod types;

pub use error::EventError;
pub use event::{Event, EventKind};
pub use input::{
    InputEvent, KeyboardAction, KeyboardInput, MouseAction, MouseButton, MouseButtons, MouseInput,
    COORDINATE_MAX,
};
pub use types::{Codec, CodecOptions};

/// Result type for event conversions.
pub type EventResult<T> = Result<T, EventError>;
