//! Domain logic: keyboard state and text typing.  No I/O, no OS dependencies.

pub mod keyboard;
pub mod text;

pub use keyboard::{KeyboardState, ModifierSet, PressedKeys, KEY_SLOTS};
pub use text::{translate, KeyStroke, TypeText};
