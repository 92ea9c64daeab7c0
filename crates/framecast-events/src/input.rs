//! Mouse and keyboard payloads carried by input events.

use std::fmt;

use bitflags::bitflags;

use crate::error::EventError;
use crate::event::EventKind;

/// Largest quantized coordinate value on the wire.
pub const COORDINATE_MAX: u16 = u16::MAX;

/// What happened to the mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseAction {
    Move = 0,
    ButtonDown = 1,
    ButtonUp = 2,
    DoubleClick = 3,
}

impl TryFrom<u8> for MouseAction {
    type Error = EventError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Move),
            1 => Ok(Self::ButtonDown),
            2 => Ok(Self::ButtonUp),
            3 => Ok(Self::DoubleClick),
            value => Err(EventError::InvalidAction {
                kind: EventKind::MouseInput,
                value,
            }),
        }
    }
}

/// The button whose state changed, numbered like DOM `MouseEvent.button`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    Primary = 0,
    Auxiliary = 1,
    Secondary = 2,
    Fourth = 3,
    Fifth = 4,
}

impl TryFrom<u8> for MouseButton {
    type Error = EventError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Primary),
            1 => Ok(Self::Auxiliary),
            2 => Ok(Self::Secondary),
            3 => Ok(Self::Fourth),
            4 => Ok(Self::Fifth),
            other => Err(EventError::InvalidButton(other)),
        }
    }
}

bitflags! {
    /// Buttons held down at the time of the event, like DOM `MouseEvent.buttons`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        const PRIMARY = 1;
        const SECONDARY = 1 << 1;
        const AUXILIARY = 1 << 2;
        const FOURTH = 1 << 3;
        const FIFTH = 1 << 4;
    }
}

/// A pointer event in normalized surface coordinates.
///
/// Coordinates are kept in their quantized wire form so that a decoded
/// event compares equal to the event it was serialized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseInput {
    pub action: MouseAction,
    pub button: MouseButton,
    pub buttons: MouseButtons,
    x: u16,
    y: u16,
}

impl MouseInput {
    /// Create a mouse event; `x` and `y` are clamped to `[0, 1]`.
    pub fn new(action: MouseAction, button: MouseButton, buttons: MouseButtons, x: f64, y: f64) -> Self {
        Self {
            action,
            button,
            buttons,
            x: quantize(x),
            y: quantize(y),
        }
    }

    /// Create a mouse event from raw wire coordinates.
    pub fn from_raw(action: MouseAction, button: MouseButton, buttons: MouseButtons, x: u16, y: u16) -> Self {
        Self {
            action,
            button,
            buttons,
            x,
            y,
        }
    }

    /// Horizontal position, 0.0 at the left edge.
    pub fn x(&self) -> f64 {
        f64::from(self.x) / f64::from(COORDINATE_MAX)
    }

    /// Vertical position, 0.0 at the top edge.
    pub fn y(&self) -> f64 {
        f64::from(self.y) / f64::from(COORDINATE_MAX)
    }

    /// Quantized `(x, y)` as carried on the wire.
    pub fn raw_position(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    /// Map onto a `width` x `height` pixel surface.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32) {
        let px = (self.x() * f64::from(width)) as u32;
        let py = (self.y() * f64::from(height)) as u32;
        (px.min(width.saturating_sub(1)), py.min(height.saturating_sub(1)))
    }
}

fn quantize(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * f64::from(COORDINATE_MAX)).round() as u16
}

/// What happened to the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyboardAction {
    KeyDown = 0,
    KeyPress = 1,
    KeyUp = 2,
}

impl TryFrom<u8> for KeyboardAction {
    type Error = EventError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::KeyDown),
            1 => Ok(Self::KeyPress),
            2 => Ok(Self::KeyUp),
            value => Err(EventError::InvalidAction {
                kind: EventKind::KeyboardInput,
                value,
            }),
        }
    }
}

/// A key event, with DOM-style physical `code` ("KeyA") and logical `key` ("a").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyboardInput {
    pub action: KeyboardAction,
    pub code: String,
    pub key: String,

    /// Auto-repeat flag. Not carried on the wire; decoded events report `false`.
    pub repeat: bool,
}

impl KeyboardInput {
    pub fn new(action: KeyboardAction, code: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            action,
            code: code.into(),
            key: key.into(),
            repeat: false,
        }
    }
}

/// Input that is forwarded to the input processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Mouse(MouseInput),
    Keyboard(KeyboardInput),
}

impl fmt::Display for MouseInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:?} buttons={:#04x} at ({:.4}, {:.4})",
            self.action,
            self.button,
            self.buttons.bits(),
            self.x(),
            self.y()
        )
    }
}

impl fmt::Display for KeyboardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} code={:?} key={:?}", self.action, self.code, self.key)?;
        if self.repeat {
            write!(f, " (repeat)")?;
        }
        Ok(())
    }
}
