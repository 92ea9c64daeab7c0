//! The event vocabulary exchanged with clients and its binary layout.
//!
//! Every message starts with a one-byte kind tag. Multi-byte integers are
//! little-endian.
//!
//! | kind | layout |
//! |---|---|
//! | fixed kinds | `tag` |
//! | ChangeCodec | `tag, codec, options utf-8 json...` |
//! | MouseInput | `tag, action, x u16, y u16, button, buttons` |
//! | KeyboardInput | `tag, action, code_len, key_len, code..., key...` |

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::EventError;
use crate::input::{
    InputEvent, KeyboardAction, KeyboardInput, MouseAction, MouseButton, MouseButtons, MouseInput,
};
use crate::types::{Codec, CodecOptions};
use crate::EventResult;

const MOUSE_LEN: usize = 8;
const KEYBOARD_HEADER_LEN: usize = 4;

/// Wire tag of each event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Unknown = 0x00,
    StreamConfigChanged = 0x10,
    ChangeCodec = 0x11,
    Play = 0x30,
    Stop = 0x31,
    AcquireInput = 0x32,
    ReleaseInput = 0x33,
    MouseInput = 0x50,
    KeyboardInput = 0x51,
}

impl EventKind {
    /// Map a tag byte to a kind. Unrecognized tags map to `Unknown`.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0x10 => Self::StreamConfigChanged,
            0x11 => Self::ChangeCodec,
            0x30 => Self::Play,
            0x31 => Self::Stop,
            0x32 => Self::AcquireInput,
            0x33 => Self::ReleaseInput,
            0x50 => Self::MouseInput,
            0x51 => Self::KeyboardInput,
            _ => Self::Unknown,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::StreamConfigChanged => "StreamConfigChanged",
            Self::ChangeCodec => "ChangeCodec",
            Self::Play => "Play",
            Self::Stop => "Stop",
            Self::AcquireInput => "AcquireInput",
            Self::ReleaseInput => "ReleaseInput",
            Self::MouseInput => "MouseInput",
            Self::KeyboardInput => "KeyboardInput",
        };
        f.write_str(name)
    }
}

/// A control or input message.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Sent to clients when the advertised stream configuration changed.
    StreamConfigChanged,

    /// Request to receive frames encoded with another codec.
    ChangeCodec { codec: Codec, options: CodecOptions },

    Play,
    Stop,

    /// Request the exclusive input token.
    AcquireInput,

    /// Give the input token back.
    ReleaseInput,

    MouseInput(MouseInput),
    KeyboardInput(KeyboardInput),

    /// A message whose tag is not recognized.
    Unknown,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StreamConfigChanged => EventKind::StreamConfigChanged,
            Self::ChangeCodec { .. } => EventKind::ChangeCodec,
            Self::Play => EventKind::Play,
            Self::Stop => EventKind::Stop,
            Self::AcquireInput => EventKind::AcquireInput,
            Self::ReleaseInput => EventKind::ReleaseInput,
            Self::MouseInput(_) => EventKind::MouseInput,
            Self::KeyboardInput(_) => EventKind::KeyboardInput,
            Self::Unknown => EventKind::Unknown,
        }
    }

    /// Split off the input payload, if this is an input event.
    pub fn into_input(self) -> Option<InputEvent> {
        match self {
            Self::MouseInput(mouse) => Some(InputEvent::Mouse(mouse)),
            Self::KeyboardInput(keyboard) => Some(InputEvent::Keyboard(keyboard)),
            _ => None,
        }
    }

    /// Decode one message.
    pub fn from_bytes(data: &[u8]) -> EventResult<Self> {
        let Some((&tag, payload)) = data.split_first() else {
            return Err(EventError::Empty);
        };

        let kind = EventKind::from_tag(tag);
        match kind {
            EventKind::Unknown => Ok(Self::Unknown),
            EventKind::StreamConfigChanged
            | EventKind::Play
            | EventKind::Stop
            | EventKind::AcquireInput
            | EventKind::ReleaseInput => {
                expect_len(kind, 1, data.len())?;
                Ok(match kind {
                    EventKind::StreamConfigChanged => Self::StreamConfigChanged,
                    EventKind::Play => Self::Play,
                    EventKind::Stop => Self::Stop,
                    EventKind::AcquireInput => Self::AcquireInput,
                    _ => Self::ReleaseInput,
                })
            }
            EventKind::ChangeCodec => decode_change_codec(payload),
            EventKind::MouseInput => decode_mouse(data).map(Self::MouseInput),
            EventKind::KeyboardInput => decode_keyboard(data).map(Self::KeyboardInput),
        }
    }

    /// Encode into a new buffer.
    pub fn to_bytes(&self) -> EventResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len_hint());
        buf.put_u8(self.kind().tag());

        match self {
            Self::ChangeCodec { codec, options } => {
                buf.put_u8(codec.id());
                buf.put_slice(options.to_json().as_bytes());
            }
            Self::MouseInput(mouse) => {
                let (x, y) = mouse.raw_position();
                buf.put_u8(mouse.action as u8);
                buf.put_u16_le(x);
                buf.put_u16_le(y);
                buf.put_u8(mouse.button as u8);
                buf.put_u8(mouse.buttons.bits());
            }
            Self::KeyboardInput(keyboard) => {
                let code_len = field_len("code", &keyboard.code)?;
                let key_len = field_len("key", &keyboard.key)?;
                buf.put_u8(keyboard.action as u8);
                buf.put_u8(code_len);
                buf.put_u8(key_len);
                buf.put_slice(keyboard.code.as_bytes());
                buf.put_slice(keyboard.key.as_bytes());
            }
            _ => {}
        }

        Ok(buf.freeze())
    }

    fn encoded_len_hint(&self) -> usize {
        match self {
            Self::ChangeCodec { .. } => 64,
            Self::MouseInput(_) => MOUSE_LEN,
            Self::KeyboardInput(k) => KEYBOARD_HEADER_LEN + k.code.len() + k.key.len(),
            _ => 1,
        }
    }
}

fn expect_len(kind: EventKind, expected: usize, actual: usize) -> EventResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(EventError::InvalidLength {
            kind,
            expected,
            actual,
        })
    }
}

fn field_len(field: &'static str, value: &str) -> EventResult<u8> {
    u8::try_from(value.len()).map_err(|_| EventError::FieldTooLong {
        field,
        len: value.len(),
    })
}

fn decode_change_codec(payload: &[u8]) -> EventResult<Event> {
    let Some((&codec_id, options)) = payload.split_first() else {
        return Err(EventError::InvalidLength {
            kind: EventKind::ChangeCodec,
            expected: 2,
            actual: 1,
        });
    };

    let codec = Codec::from_id(codec_id)?;
    let text = std::str::from_utf8(options).map_err(|_| EventError::InvalidUtf8 { field: "options" })?;
    let options = CodecOptions::from_json(text)?;

    Ok(Event::ChangeCodec { codec, options })
}

fn decode_mouse(data: &[u8]) -> EventResult<MouseInput> {
    expect_len(EventKind::MouseInput, MOUSE_LEN, data.len())?;

    let mut buf = &data[1..];
    let action = MouseAction::try_from(buf.get_u8())?;
    let x = buf.get_u16_le();
    let y = buf.get_u16_le();
    let button = MouseButton::try_from(buf.get_u8())?;
    let buttons = MouseButtons::from_bits_truncate(buf.get_u8());

    Ok(MouseInput::from_raw(action, button, buttons, x, y))
}

fn decode_keyboard(data: &[u8]) -> EventResult<KeyboardInput> {
    if data.len() < KEYBOARD_HEADER_LEN {
        return Err(EventError::InvalidLength {
            kind: EventKind::KeyboardInput,
            expected: KEYBOARD_HEADER_LEN,
            actual: data.len(),
        });
    }

    let action = KeyboardAction::try_from(data[1])?;
    let code_len = usize::from(data[2]);
    let key_len = usize::from(data[3]);
    expect_len(
        EventKind::KeyboardInput,
        KEYBOARD_HEADER_LEN + code_len + key_len,
        data.len(),
    )?;

    let code_end = KEYBOARD_HEADER_LEN + code_len;
    let code = std::str::from_utf8(&data[KEYBOARD_HEADER_LEN..code_end])
        .map_err(|_| EventError::InvalidUtf8 { field: "code" })?;
    let key = std::str::from_utf8(&data[code_end..]).map_err(|_| EventError::InvalidUtf8 { field: "key" })?;

    Ok(KeyboardInput::new(action, code, key))
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChangeCodec { codec, options } => write!(f, "ChangeCodec({codec}, {options})"),
            Self::MouseInput(mouse) => write!(f, "MouseInput({mouse})"),
            Self::KeyboardInput(keyboard) => write!(f, "KeyboardInput({keyboard})"),
            other => write!(f, "{}", other.kind()),
        }
    }
}
