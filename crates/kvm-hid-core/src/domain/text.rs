//! Text-to-keystroke translation ("paste as keystrokes").
//!
//! [`translate`] turns a Unicode string into the ordered key transitions that
//! type it on a given keyboard layout.  The result is a pull-based iterator:
//! each character is looked up only when the caller asks for its keys, and a
//! fresh call is needed to type the text again.
//!
//! Per character:
//!
//! 1. `\n`, `\t` and space map straight to `Enter`, `Tab` and `Space`.
//! 2. Typographic quotes and dashes become their ASCII forms.
//! 3. Characters outside the printable allow-list are skipped.
//! 4. The character becomes a KeySym, and the layout's symmap picks the first
//!    declared `(modifiers, key)` way of producing it.
//! 5. Shift and AltGr are pressed or released only when the required state
//!    differs from the held one, so runs of capitals share one Shift press.
//!
//! Anything still held at the end is released.

use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use tracing::{error, info};

use crate::keymap::{char_to_keysym, KeyName, KeymapStore, LogicalKey, SymModifiers, SymMap};

/// One key transition produced while typing: the key and whether it goes down.
pub type KeyStroke = (KeyName, bool);

/// Builds the keystroke sequence for `text` on layout `lang`.
///
/// If the layout cannot be loaded the error is logged and the sequence is
/// empty; no partial translation is attempted.
pub fn translate(text: &str, lang: &str, store: &KeymapStore) -> TypeText {
    match store.get(lang) {
        Ok(symmap) => TypeText::new(text, symmap),
        Err(e) => {
            error!("unsupported keyboard language {lang}: {e}");
            TypeText::empty()
        }
    }
}

/// Lazy keystroke sequence for a piece of text.  See the module docs.
#[derive(Debug)]
pub struct TypeText {
    symmap: Option<Arc<SymMap>>,
    chars: VecDeque<char>,
    pending: VecDeque<KeyStroke>,
    shift: bool,
    altgr: bool,
    finished: bool,
}

impl TypeText {
    /// Types `text` using `symmap`.
    pub fn new(text: &str, symmap: Arc<SymMap>) -> Self {
        Self {
            symmap: Some(symmap),
            chars: text.chars().flat_map(normalize).collect(),
            pending: VecDeque::with_capacity(6),
            shift: false,
            altgr: false,
            finished: false,
        }
    }

    /// A sequence that yields nothing.
    pub fn empty() -> Self {
        Self {
            symmap: None,
            chars: VecDeque::new(),
            pending: VecDeque::new(),
            shift: false,
            altgr: false,
            finished: true,
        }
    }

    /// Queues the strokes for the next typeable character.  Returns `false`
    /// once the text is exhausted.
    fn advance(&mut self) -> bool {
        let Some(symmap) = self.symmap.clone() else {
            return false;
        };

        while let Some(ch) = self.chars.pop_front() {
            let (modifiers, key) = match ch {
                '\n' => (SymModifiers::default(), KeyName::Known(LogicalKey::Enter)),
                '\t' => (SymModifiers::default(), KeyName::Known(LogicalKey::Tab)),
                ' ' => (SymModifiers::default(), KeyName::Known(LogicalKey::Space)),
                _ => {
                    if !is_printable(ch) {
                        info!("skipping non-printable character {:?}", ch);
                        continue;
                    }
                    let Some(entry) = char_to_keysym(ch).and_then(|sym| symmap.first(sym)) else {
                        info!("no key produces {:?} on this layout, skipping", ch);
                        continue;
                    };
                    (entry.modifiers, entry.key.clone())
                }
            };

            self.set_modifier(LogicalKey::ShiftLeft, modifiers.shift());
            self.set_modifier(LogicalKey::AltRight, modifiers.altgr());
            self.pending.push_back((key.clone(), true));
            self.pending.push_back((key, false));
            return true;
        }
        false
    }

    fn set_modifier(&mut self, key: LogicalKey, wanted: bool) {
        let held = match key {
            LogicalKey::ShiftLeft => &mut self.shift,
            _ => &mut self.altgr,
        };
        if *held != wanted {
            *held = wanted;
            self.pending.push_back((KeyName::Known(key), wanted));
        }
    }

    fn release_modifiers(&mut self) {
        self.set_modifier(LogicalKey::ShiftLeft, false);
        self.set_modifier(LogicalKey::AltRight, false);
    }
}

impl Iterator for TypeText {
    type Item = KeyStroke;

    fn next(&mut self) -> Option<KeyStroke> {
        loop {
            if let Some(stroke) = self.pending.pop_front() {
                return Some(stroke);
            }
            if self.finished {
                return None;
            }
            if !self.advance() {
                self.release_modifiers();
                self.finished = true;
            }
        }
    }
}

impl FusedIterator for TypeText {}

/// ASCII stand-ins for typographic punctuation.
fn normalize(ch: char) -> impl Iterator<Item = char> {
    let (first, second) = match ch {
        '\u{201A}' | '\u{2018}' | '\u{2019}' => ('\'', None),
        '\u{201E}' | '\u{201C}' | '\u{201D}' => ('"', None),
        '\u{2013}' => ('-', None),
        '\u{2014}' => ('-', Some('-')),
        other => (other, None),
    };
    std::iter::once(first).chain(second)
}

/// Printable allow-list: visible ASCII plus the Basic Multilingual Plane
/// outside C1 controls and surrogates.
fn is_printable(ch: char) -> bool {
    matches!(ch, '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFF}')
}

// ── Tests ─────────────────────────────────────────────────────────────────────
