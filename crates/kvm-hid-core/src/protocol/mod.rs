//! Keyboard/mouse events and the HID reports they encode to.

pub mod event;
pub mod report;

pub use event::{EventError, KeyEvent, KeyboardEvent, ModifierEvent, MouseEvent};
pub use report::{encode_absolute, encode_relative, KeyboardReport, MouseReport};
