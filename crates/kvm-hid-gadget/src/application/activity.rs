//! Session activity shared between the input service and the jiggler.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use kvm_hid_core::MouseEvent;
use tokio::time::Instant;

/// Pointer state as last reported by the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub absolute_mode: bool,
    pub buttons: u8,
    /// Last absolute position, normalized to `[0, 1]`.
    pub x: f64,
    pub y: f64,
}

#[derive(Debug)]
struct Inner {
    last_interaction: Instant,
    pointer: PointerState,
}

/// Last genuine interaction and pointer state of the session.
#[derive(Debug)]
pub struct Activity {
    inner: Mutex<Inner>,
}

impl Activity {
    pub fn new(absolute_mode: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_interaction: Instant::now(),
                pointer: PointerState {
                    absolute_mode,
                    buttons: 0,
                    x: 0.5,
                    y: 0.5,
                },
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks "now" as the last interaction.
    pub fn touch(&self) {
        self.lock().last_interaction = Instant::now();
    }

    /// Records a genuine mouse event.
    pub fn record_mouse(&self, event: &MouseEvent) {
        let mut inner = self.lock();
        inner.last_interaction = Instant::now();
        inner.pointer.absolute_mode = event.is_absolute_mode;
        inner.pointer.buttons = event.buttons;
        if event.is_absolute_mode {
            inner.pointer.x = event.relative_x.clamp(0.0, 1.0);
            inner.pointer.y = event.relative_y.clamp(0.0, 1.0);
        }
    }

    /// Time since the last interaction.
    pub fn idle_for(&self) -> Duration {
        self.lock().last_interaction.elapsed()
    }

    pub fn pointer(&self) -> PointerState {
        self.lock().pointer
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
