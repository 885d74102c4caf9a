//! HID boot-protocol report encoders.
//!
//! All functions here are pure: they turn state or a single mouse event into
//! the exact bytes the gadget driver expects, and do no I/O.
//!
//! # Keyboard report (8 bytes)
//!
//! ```text
//!  0          1         2..8
//! +----------+---------+---------------------------+
//! | modifiers| reserved|  key slot 0 .. key slot 5 |
//! +----------+---------+---------------------------+
//! ```
//!
//! # Mouse reports
//!
//! ```text
//! relative (5): buttons | dx | dy | vwheel | hwheel
//! absolute (7): buttons | x lo | x hi | y lo | y hi | vwheel | hwheel
//! ```

use crate::protocol::event::MouseEvent;

/// Size of a keyboard report in bytes.
pub const KEYBOARD_REPORT_LEN: usize = 8;

/// Size of a relative mouse report in bytes.
pub const RELATIVE_REPORT_LEN: usize = 5;

/// Size of an absolute mouse report in bytes.
pub const ABSOLUTE_REPORT_LEN: usize = 7;

/// Largest absolute coordinate (15-bit logical range).
pub const ABSOLUTE_MAX: u16 = 0x7FFF;

/// Largest magnitude of a relative movement delta.
pub const RELATIVE_LIMIT: i32 = 127;

/// An 8-byte boot-protocol keyboard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyboardReport([u8; KEYBOARD_REPORT_LEN]);

impl KeyboardReport {
    /// Builds a report from a modifier mask and six key slots (0 = empty).
    pub fn new(modifiers: u8, keys: [u8; 6]) -> Self {
        let mut bytes = [0u8; KEYBOARD_REPORT_LEN];
        bytes[0] = modifiers;
        bytes[2..].copy_from_slice(&keys);
        Self(bytes)
    }

    /// The all-released report.
    pub fn empty() -> Self {
        Self([0; KEYBOARD_REPORT_LEN])
    }

    pub fn modifiers(&self) -> u8 {
        self.0[0]
    }

    pub fn keys(&self) -> &[u8] {
        &self.0[2..]
    }

    pub fn as_bytes(&self) -> &[u8; KEYBOARD_REPORT_LEN] {
        &self.0
    }
}

impl From<KeyboardReport> for Vec<u8> {
    fn from(report: KeyboardReport) -> Self {
        report.0.to_vec()
    }
}

/// A mouse report in either encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseReport {
    Relative([u8; RELATIVE_REPORT_LEN]),
    Absolute([u8; ABSOLUTE_REPORT_LEN]),
}

impl MouseReport {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MouseReport::Relative(b) => b,
            MouseReport::Absolute(b) => b,
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, MouseReport::Absolute(_))
    }
}

impl From<MouseReport> for Vec<u8> {
    fn from(report: MouseReport) -> Self {
        report.as_bytes().to_vec()
    }
}

impl MouseEvent {
    /// Encodes this event in the mode it declares.
    pub fn encode(&self) -> MouseReport {
        if self.is_absolute_mode {
            MouseReport::Absolute(encode_absolute(
                self.buttons,
                self.relative_x,
                self.relative_y,
                self.vertical_wheel_delta,
                self.horizontal_wheel_delta,
            ))
        } else {
            MouseReport::Relative(encode_relative(
                self.buttons,
                self.relative_x,
                self.relative_y,
                self.vertical_wheel_delta,
                self.horizontal_wheel_delta,
                self.sensitivity,
            ))
        }
    }
}

/// Encodes an absolute-position mouse report.
///
/// `rel_x`/`rel_y` are clamped to `[0, 1]`, scaled by [`ABSOLUTE_MAX`] and
/// truncated toward zero, then stored little-endian.  The vertical wheel is
/// negated; both wheels wrap to a single byte.
pub fn encode_absolute(
    buttons: u8,
    rel_x: f64,
    rel_y: f64,
    v_wheel: i32,
    h_wheel: i32,
) -> [u8; ABSOLUTE_REPORT_LEN] {
    let [x_lo, x_hi] = scale_absolute(rel_x).to_le_bytes();
    let [y_lo, y_hi] = scale_absolute(rel_y).to_le_bytes();
    [
        buttons,
        x_lo,
        x_hi,
        y_lo,
        y_hi,
        wheel_byte(v_wheel.wrapping_neg()),
        wheel_byte(h_wheel),
    ]
}

/// Encodes a relative-movement mouse report.
///
/// Movement is `floor(delta * sensitivity)` clamped to ±[`RELATIVE_LIMIT`];
/// wheels wrap instead of clamping.
pub fn encode_relative(
    buttons: u8,
    dx: f64,
    dy: f64,
    v_wheel: i32,
    h_wheel: i32,
    sensitivity: f64,
) -> [u8; RELATIVE_REPORT_LEN] {
    [
        buttons,
        scale_relative(dx, sensitivity),
        scale_relative(dy, sensitivity),
        wheel_byte(v_wheel.wrapping_neg()),
        wheel_byte(h_wheel),
    ]
}

fn scale_absolute(rel: f64) -> u16 {
    // NaN saturates to 0 in the cast.
    (rel.clamp(0.0, 1.0) * f64::from(ABSOLUTE_MAX)) as u16
}

fn scale_relative(delta: f64, sensitivity: f64) -> u8 {
    let scaled = (delta * sensitivity).floor() as i32;
    scaled.clamp(-RELATIVE_LIMIT, RELATIVE_LIMIT) as i8 as u8
}

fn wheel_byte(value: i32) -> u8 {
    value as u8
}

// ── Tests ─────────────────────────────────────────────────────────────────────
