//! Key and modifier transition events.
//!
//! A keyboard transition is either a [`ModifierEvent`] (Ctrl/Shift/Alt/Meta,
//! carried as a bit in the report) or a [`KeyEvent`] (any other key, carried in
//! one of the six key slots).  Building the wrong kind for a code is a caller
//! bug and fails with an [`EventError`] instead of being coerced.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keymap::{LogicalKey, UsbCode};

/// Contract violations raised when constructing keyboard events.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EventError {
    /// A normal key was used to build a [`ModifierEvent`].
    #[error("code 0x{code:02X} is not a modifier key")]
    NotAModifier { code: u8 },

    /// A modifier key was used to build a [`KeyEvent`].
    #[error("code 0x{code:02X} is a modifier key and cannot be a key event")]
    UnexpectedModifier { code: u8 },
}

/// Press or release of a modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierEvent {
    modifier: UsbCode,
    pressed: bool,
}

impl ModifierEvent {
    /// Builds a modifier transition.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotAModifier`] if `modifier` is a normal key.
    pub fn new(modifier: UsbCode, pressed: bool) -> Result<Self, EventError> {
        if !modifier.is_modifier {
            return Err(EventError::NotAModifier {
                code: modifier.code,
            });
        }
        Ok(Self { modifier, pressed })
    }

    pub fn modifier(&self) -> UsbCode {
        self.modifier
    }

    pub fn pressed(&self) -> bool {
        self.pressed
    }
}

/// Press or release of a normal (non-modifier) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    key: UsbCode,
    pressed: bool,
}

impl KeyEvent {
    /// Builds a key transition.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnexpectedModifier`] if `key` is a modifier.
    pub fn new(key: UsbCode, pressed: bool) -> Result<Self, EventError> {
        if key.is_modifier {
            return Err(EventError::UnexpectedModifier { code: key.code });
        }
        Ok(Self { key, pressed })
    }

    pub fn key(&self) -> UsbCode {
        self.key
    }

    pub fn pressed(&self) -> bool {
        self.pressed
    }
}

/// A classified keyboard transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    Modifier(ModifierEvent),
    Key(KeyEvent),
}

impl KeyboardEvent {
    /// Classifies a logical key transition.
    ///
    /// The classification follows the key's own modifier flag, so this never
    /// fails.
    pub fn from_key(key: LogicalKey, pressed: bool) -> Self {
        let usb = key.usb();
        if usb.is_modifier {
            KeyboardEvent::Modifier(ModifierEvent {
                modifier: usb,
                pressed,
            })
        } else {
            KeyboardEvent::Key(KeyEvent { key: usb, pressed })
        }
    }

    pub fn pressed(&self) -> bool {
        match self {
            KeyboardEvent::Modifier(e) => e.pressed,
            KeyboardEvent::Key(e) => e.pressed,
        }
    }
}

/// Raw mouse input as delivered by the transport.
///
/// In absolute mode `relative_x`/`relative_y` are the pointer position
/// normalized to `[0, 1]`; in relative mode they are movement deltas, scaled
/// by `sensitivity` before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseEvent {
    #[serde(default)]
    pub buttons: u8,
    #[serde(default)]
    pub relative_x: f64,
    #[serde(default)]
    pub relative_y: f64,
    #[serde(default)]
    pub vertical_wheel_delta: i32,
    #[serde(default)]
    pub horizontal_wheel_delta: i32,
    #[serde(default)]
    pub is_absolute_mode: bool,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
}

fn default_sensitivity() -> f64 {
    1.0
}

// ── Tests ─────────────────────────────────────────────────────────────────────
