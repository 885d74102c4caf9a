//! Keyboard state machine.
//!
//! Tracks which modifiers and which normal keys are currently held on the
//! emulated keyboard and produces a [`KeyboardReport`] every time that state
//! changes.
//!
//! # Slots and rollover
//!
//! The boot protocol has room for six simultaneously held normal keys.  Keys
//! occupy the first free slot in fixed order 0 → 5 and keep it until
//! released.  Pressing a seventh key does **not** ignore the new key: it
//! releases all six held keys and reports the all-clear state, which is the
//! simplest unambiguous "too many keys" signal a host understands.  Modifiers
//! live in their own bitmask and are not affected by rollover.

use crate::keymap::UsbCode;
use crate::protocol::event::{KeyEvent, KeyboardEvent, ModifierEvent};
use crate::protocol::report::KeyboardReport;

/// Number of normal-key slots in a boot-protocol report.
pub const KEY_SLOTS: usize = 6;

/// Set of held modifiers, stored as the report's modifier bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub fn contains(&self, modifier: UsbCode) -> bool {
        self.0 & modifier.code != 0
    }

    pub fn insert(&mut self, modifier: UsbCode) {
        self.0 |= modifier.code;
    }

    pub fn remove(&mut self, modifier: UsbCode) {
        self.0 &= !modifier.code;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The modifier byte of a report.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Six ordered key slots; `None` is an empty slot.
pub type PressedKeys = [Option<UsbCode>; KEY_SLOTS];

/// Held-key state of one emulated keyboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    modifiers: ModifierSet,
    keys: PressedKeys,
}

impl KeyboardState {
    /// Creates a state with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a classified event; returns a report if the state changed.
    pub fn apply(&mut self, event: KeyboardEvent) -> Option<KeyboardReport> {
        match event {
            KeyboardEvent::Modifier(e) => self.apply_modifier_event(e),
            KeyboardEvent::Key(e) => self.apply_key_event(e),
        }
    }

    /// Applies a modifier transition.
    ///
    /// A press always reports (re-pressing a held modifier is idempotent).  A
    /// release reports only if the modifier was held.
    pub fn apply_modifier_event(&mut self, event: ModifierEvent) -> Option<KeyboardReport> {
        let modifier = event.modifier();
        if event.pressed() {
            self.modifiers.insert(modifier);
            return Some(self.report());
        }
        if self.modifiers.contains(modifier) {
            self.modifiers.remove(modifier);
            return Some(self.report());
        }
        None
    }

    /// Applies a normal-key transition.
    pub fn apply_key_event(&mut self, event: KeyEvent) -> Option<KeyboardReport> {
        let key = event.key();

        // A held key is released whatever the event says.
        if let Some(held) = self.keys.iter().position(|slot| *slot == Some(key)) {
            self.keys[held] = None;
            return Some(self.report());
        }

        if !event.pressed() {
            return None;
        }

        match self.keys.iter().position(Option::is_none) {
            Some(free) => self.keys[free] = Some(key),
            None => self.keys = [None; KEY_SLOTS],
        }
        Some(self.report())
    }

    /// Releases everything; returns a report if anything was held.
    pub fn release_all(&mut self) -> Option<KeyboardReport> {
        if self.modifiers.is_empty() && self.keys.iter().all(Option::is_none) {
            return None;
        }
        *self = Self::default();
        Some(self.report())
    }

    /// Encodes the current state.
    pub fn report(&self) -> KeyboardReport {
        let mut keys = [0u8; KEY_SLOTS];
        for (byte, slot) in keys.iter_mut().zip(self.keys.iter()) {
            *byte = slot.map_or(0, |k| k.code);
        }
        KeyboardReport::new(self.modifiers.bits(), keys)
    }

    pub fn modifiers(&self) -> ModifierSet {
        self.modifiers
    }

    pub fn pressed_keys(&self) -> &PressedKeys {
        &self.keys
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
