//! kvm-hid-gadget library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does kvm-hid-gadget do? (for beginners)
//!
//! The appliance is a small Linux board plugged into the controlled
//! computer's USB port.  The board's USB controller runs in *gadget* mode: to
//! the controlled computer it looks like an ordinary keyboard and mouse.  The
//! kernel exposes each emulated function as a character device
//! (`/dev/hidg0` for the keyboard, `/dev/hidg1` for the mouse); every report
//! written to one of those files is sent to the host as if a real key had
//! been pressed or the mouse had moved.
//!
//! This service sits between the web transport and those device files:
//!
//! 1. Reads input requests (key snapshots, mouse events, pasted text,
//!    shortcuts) from the transport.
//! 2. Tracks which keys are held and builds the matching 8-byte keyboard or
//!    5/7-byte mouse reports with `kvm_hid_core`.
//! 3. Queues the reports per device and writes them one at a time.
//! 4. Nudges the mouse when the session has been idle for too long.
//!
//! ```text
//! transport ──▶ ingress ──▶ InputService ──▶ HidDevice (keyboard) ──▶ /dev/hidg0
//!                               │        └─▶ HidDevice (mouse)    ──▶ /dev/hidg1
//!                            Jiggler ─────────────┘
//! ```

/// Application layer: use cases for the service.
pub mod application;

/// Infrastructure layer: device files, configuration, ingress.
pub mod infrastructure;
