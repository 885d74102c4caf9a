//! Logical key identifiers and their protocol-level codes.
//!
//! A [`LogicalKey`] is the name a browser reports in `KeyboardEvent.code`
//! (`"KeyA"`, `"ShiftLeft"`, `"ArrowUp"`, ...).  Every logical key resolves to
//! two numeric codes:
//!
//! - a [`UsbCode`]: the byte that goes into a HID boot-protocol keyboard
//!   report, plus a flag marking modifier keys;
//! - an [`McuCode`]: the internal numbering used by serial keyboard
//!   controllers.
//!
//! # Modifier keys are bits, not slots
//!
//! The boot-protocol report stores modifiers as an 8-bit mask in byte 0 and
//! normal keys as usage IDs in bytes 2–7.  The [`UsbCode`] of a modifier is
//! therefore its *bit value* (`ControlLeft` = `0x01` … `MetaRight` = `0x80`),
//! while the [`UsbCode`] of every other key is its Usage ID on page 0x07.
//!
//! | Key          | Usage ID | UsbCode | Modifier |
//! |--------------|----------|---------|----------|
//! | Letter A     | 0x04     | 0x04    | no       |
//! | Enter        | 0x28     | 0x28    | no       |
//! | Left Ctrl    | 0xE0     | 0x01    | yes      |
//! | Right Alt    | 0xE6     | 0x40    | yes      |
//!
//! Reference: USB HID Usage Tables 1.3, Section 10 (Keyboard/Keypad page 0x07).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Protocol-level code of a key as it appears in a keyboard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbCode {
    /// Usage ID for normal keys, bit value for modifiers.
    pub code: u8,
    /// `true` for the eight Ctrl/Shift/Alt/Meta keys.
    pub is_modifier: bool,
}

/// Internal numeric code used by serial keyboard controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct McuCode(pub u8);

/// Logical keyboard key, named after the DOM `KeyboardEvent.code` value.
///
/// The discriminant of each variant is its USB HID Usage ID (page 0x07).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogicalKey {
    // Letters (HID 0x04–0x1D)
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    // Digits (HID 0x1E–0x27)
    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    // Control keys (HID 0x28–0x38)
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    BracketLeft = 0x2F,
    BracketRight = 0x30,
    Backslash = 0x31,
    Semicolon = 0x33,
    Quote = 0x34,
    Backquote = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,

    CapsLock = 0x39,

    // Function keys (HID 0x3A–0x45)
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster (HID 0x46–0x52)
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    // Numpad (HID 0x53–0x63)
    NumLock = 0x53,
    NumpadDivide = 0x54,
    NumpadMultiply = 0x55,
    NumpadSubtract = 0x56,
    NumpadAdd = 0x57,
    NumpadEnter = 0x58,
    Numpad1 = 0x59,
    Numpad2 = 0x5A,
    Numpad3 = 0x5B,
    Numpad4 = 0x5C,
    Numpad5 = 0x5D,
    Numpad6 = 0x5E,
    Numpad7 = 0x5F,
    Numpad8 = 0x60,
    Numpad9 = 0x61,
    Numpad0 = 0x62,
    NumpadDecimal = 0x63,

    ContextMenu = 0x65,

    // Modifier keys (HID 0xE0–0xE7)
    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,
}

/// One row of the static keymap.
struct KeyEntry {
    key: LogicalKey,
    name: &'static str,
    mcu: u8,
}

const fn entry(key: LogicalKey, name: &'static str, mcu: u8) -> KeyEntry {
    KeyEntry { key, name, mcu }
}

/// The static keymap, in controller (MCU) numbering order.
static KEYMAP: &[KeyEntry] = &[
    entry(LogicalKey::KeyA, "KeyA", 1),
    entry(LogicalKey::KeyB, "KeyB", 2),
    entry(LogicalKey::KeyC, "KeyC", 3),
    entry(LogicalKey::KeyD, "KeyD", 4),
    entry(LogicalKey::KeyE, "KeyE", 5),
    entry(LogicalKey::KeyF, "KeyF", 6),
    entry(LogicalKey::KeyG, "KeyG", 7),
    entry(LogicalKey::KeyH, "KeyH", 8),
    entry(LogicalKey::KeyI, "KeyI", 9),
    entry(LogicalKey::KeyJ, "KeyJ", 10),
    entry(LogicalKey::KeyK, "KeyK", 11),
    entry(LogicalKey::KeyL, "KeyL", 12),
    entry(LogicalKey::KeyM, "KeyM", 13),
    entry(LogicalKey::KeyN, "KeyN", 14),
    entry(LogicalKey::KeyO, "KeyO", 15),
    entry(LogicalKey::KeyP, "KeyP", 16),
    entry(LogicalKey::KeyQ, "KeyQ", 17),
    entry(LogicalKey::KeyR, "KeyR", 18),
    entry(LogicalKey::KeyS, "KeyS", 19),
    entry(LogicalKey::KeyT, "KeyT", 20),
    entry(LogicalKey::KeyU, "KeyU", 21),
    entry(LogicalKey::KeyV, "KeyV", 22),
    entry(LogicalKey::KeyW, "KeyW", 23),
    entry(LogicalKey::KeyX, "KeyX", 24),
    entry(LogicalKey::KeyY, "KeyY", 25),
    entry(LogicalKey::KeyZ, "KeyZ", 26),
    entry(LogicalKey::Digit1, "Digit1", 27),
    entry(LogicalKey::Digit2, "Digit2", 28),
    entry(LogicalKey::Digit3, "Digit3", 29),
    entry(LogicalKey::Digit4, "Digit4", 30),
    entry(LogicalKey::Digit5, "Digit5", 31),
    entry(LogicalKey::Digit6, "Digit6", 32),
    entry(LogicalKey::Digit7, "Digit7", 33),
    entry(LogicalKey::Digit8, "Digit8", 34),
    entry(LogicalKey::Digit9, "Digit9", 35),
    entry(LogicalKey::Digit0, "Digit0", 36),
    entry(LogicalKey::Enter, "Enter", 37),
    entry(LogicalKey::Escape, "Escape", 38),
    entry(LogicalKey::Backspace, "Backspace", 39),
    entry(LogicalKey::Tab, "Tab", 40),
    entry(LogicalKey::Space, "Space", 41),
    entry(LogicalKey::Minus, "Minus", 42),
    entry(LogicalKey::Equal, "Equal", 43),
    entry(LogicalKey::BracketLeft, "BracketLeft", 44),
    entry(LogicalKey::BracketRight, "BracketRight", 45),
    entry(LogicalKey::Backslash, "Backslash", 46),
    entry(LogicalKey::Semicolon, "Semicolon", 47),
    entry(LogicalKey::Quote, "Quote", 48),
    entry(LogicalKey::Backquote, "Backquote", 49),
    entry(LogicalKey::Comma, "Comma", 50),
    entry(LogicalKey::Period, "Period", 51),
    entry(LogicalKey::Slash, "Slash", 52),
    entry(LogicalKey::CapsLock, "CapsLock", 53),
    entry(LogicalKey::F1, "F1", 54),
    entry(LogicalKey::F2, "F2", 55),
    entry(LogicalKey::F3, "F3", 56),
    entry(LogicalKey::F4, "F4", 57),
    entry(LogicalKey::F5, "F5", 58),
    entry(LogicalKey::F6, "F6", 59),
    entry(LogicalKey::F7, "F7", 60),
    entry(LogicalKey::F8, "F8", 61),
    entry(LogicalKey::F9, "F9", 62),
    entry(LogicalKey::F10, "F10", 63),
    entry(LogicalKey::F11, "F11", 64),
    entry(LogicalKey::F12, "F12", 65),
    entry(LogicalKey::PrintScreen, "PrintScreen", 66),
    entry(LogicalKey::Insert, "Insert", 67),
    entry(LogicalKey::Home, "Home", 68),
    entry(LogicalKey::PageUp, "PageUp", 69),
    entry(LogicalKey::Delete, "Delete", 70),
    entry(LogicalKey::End, "End", 71),
    entry(LogicalKey::PageDown, "PageDown", 72),
    entry(LogicalKey::ArrowRight, "ArrowRight", 73),
    entry(LogicalKey::ArrowLeft, "ArrowLeft", 74),
    entry(LogicalKey::ArrowDown, "ArrowDown", 75),
    entry(LogicalKey::ArrowUp, "ArrowUp", 76),
    entry(LogicalKey::ControlLeft, "ControlLeft", 77),
    entry(LogicalKey::ShiftLeft, "ShiftLeft", 78),
    entry(LogicalKey::AltLeft, "AltLeft", 79),
    entry(LogicalKey::MetaLeft, "MetaLeft", 80),
    entry(LogicalKey::ControlRight, "ControlRight", 81),
    entry(LogicalKey::ShiftRight, "ShiftRight", 82),
    entry(LogicalKey::AltRight, "AltRight", 83),
    entry(LogicalKey::MetaRight, "MetaRight", 84),
    entry(LogicalKey::Pause, "Pause", 85),
    entry(LogicalKey::ScrollLock, "ScrollLock", 86),
    entry(LogicalKey::Numpad0, "Numpad0", 87),
    entry(LogicalKey::Numpad1, "Numpad1", 88),
    entry(LogicalKey::Numpad2, "Numpad2", 89),
    entry(LogicalKey::Numpad3, "Numpad3", 90),
    entry(LogicalKey::Numpad4, "Numpad4", 91),
    entry(LogicalKey::Numpad5, "Numpad5", 92),
    entry(LogicalKey::Numpad6, "Numpad6", 93),
    entry(LogicalKey::Numpad7, "Numpad7", 94),
    entry(LogicalKey::Numpad8, "Numpad8", 95),
    entry(LogicalKey::Numpad9, "Numpad9", 96),
    entry(LogicalKey::NumpadAdd, "NumpadAdd", 97),
    entry(LogicalKey::NumpadSubtract, "NumpadSubtract", 98),
    entry(LogicalKey::NumpadMultiply, "NumpadMultiply", 99),
    entry(LogicalKey::NumpadDivide, "NumpadDivide", 100),
    entry(LogicalKey::NumLock, "NumLock", 101),
    entry(LogicalKey::NumpadEnter, "NumpadEnter", 102),
    entry(LogicalKey::NumpadDecimal, "NumpadDecimal", 103),
    entry(LogicalKey::ContextMenu, "ContextMenu", 104),
];

/// First Usage ID of the modifier block (`ControlLeft`).
const MODIFIER_USAGE_BASE: u8 = 0xE0;

impl LogicalKey {
    /// Resolves a DOM `KeyboardEvent.code` name to a logical key.
    ///
    /// Returns `None` for names that are not in the keymap.
    pub fn from_name(name: &str) -> Option<Self> {
        KEYMAP.iter().find(|e| e.name == name).map(|e| e.key)
    }

    /// Returns the DOM `KeyboardEvent.code` name of this key.
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Returns the raw USB HID Usage ID (page 0x07).
    pub fn usage_id(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the eight Ctrl/Shift/Alt/Meta keys.
    pub fn is_modifier(self) -> bool {
        self.usage_id() >= MODIFIER_USAGE_BASE
    }

    /// Returns the report-level code of this key.
    ///
    /// Modifiers yield their bit in the report's modifier byte; every other key
    /// yields its Usage ID.
    pub fn usb(self) -> UsbCode {
        if self.is_modifier() {
            UsbCode {
                code: 1 << (self.usage_id() - MODIFIER_USAGE_BASE),
                is_modifier: true,
            }
        } else {
            UsbCode {
                code: self.usage_id(),
                is_modifier: false,
            }
        }
    }

    /// Returns the serial-controller code of this key.
    pub fn mcu(self) -> McuCode {
        McuCode(self.entry().mcu)
    }

    /// Iterates over every key in the keymap, in controller numbering order.
    pub fn all() -> impl Iterator<Item = LogicalKey> {
        KEYMAP.iter().map(|e| e.key)
    }

    fn entry(self) -> &'static KeyEntry {
        // Every variant has exactly one row; the table test enforces it.
        KEYMAP
            .iter()
            .find(|e| e.key == self)
            .unwrap_or(&KEYMAP[0])
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned by [`LogicalKey::from_str`] for names outside the keymap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKeyName(pub String);

impl fmt::Display for UnknownKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key name {:?}", self.0)
    }
}

impl std::error::Error for UnknownKeyName {}

impl FromStr for LogicalKey {
    type Err = UnknownKeyName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalKey::from_name(s).ok_or_else(|| UnknownKeyName(s.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
