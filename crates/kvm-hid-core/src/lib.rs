//! # kvm-hid-core
//!
//! Shared library for KVM-HID containing the keyboard/mouse event model, the
//! USB HID boot-protocol report encoders, keymap tables and the
//! text-to-keystroke translator.
//!
//! It has zero dependencies on device files, async runtimes or network
//! sockets; the `kvm-hid-gadget` crate supplies those.
//!
//! # Architecture overview (for beginners)
//!
//! KVM-HID is the input half of a hardware KVM appliance.  A remote viewer
//! (usually a browser) sends key and mouse events; the appliance replays them
//! to the controlled computer by pretending to be a USB keyboard and mouse.
//! The controlled computer only ever sees small fixed-layout binary
//! "reports", for example 8 bytes describing which keys are down right now.
//!
//! This crate (`kvm-hid-core`) turns events into those bytes:
//!
//! - **`keymap`** – Which browser key name (`"KeyA"`, `"ShiftLeft"`) is which
//!   USB key code, plus per-language tables that say which key and modifiers
//!   produce a given character on a given keyboard layout.
//!
//! - **`protocol`** – The event types coming in and the report bytes going
//!   out.  The mouse encoders live here because they are stateless.
//!
//! - **`domain`** – The stateful parts: the keyboard state machine that
//!   remembers which keys are held, and the typer that turns a string into
//!   key presses.

pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `kvm_hid_core::KeyboardState` instead of the full module path.
pub use domain::keyboard::KeyboardState;
pub use domain::text::{translate, KeyStroke, TypeText};
pub use keymap::{KeyName, KeymapError, KeymapStore, LogicalKey, UnresolvedKeyPolicy, UsbCode};
pub use protocol::event::{EventError, KeyboardEvent, MouseEvent};
pub use protocol::report::{encode_absolute, encode_relative, KeyboardReport, MouseReport};
