//! Keymap tables: logical key names, KeySyms and per-language symmaps.
//!
//! The canonical key identifier is the DOM `KeyboardEvent.code` name carried
//! by [`LogicalKey`].  Names arriving from the transport, or from a symmap
//! file, are resolved here once; what happens to names that do not resolve is
//! decided by an [`UnresolvedKeyPolicy`].

pub mod keysym;
pub mod logical;
pub mod symmap;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use keysym::{char_to_keysym, keysym_to_char};
pub use logical::{LogicalKey, McuCode, UsbCode};
pub use symmap::{KeymapStore, SymEntry, SymMap, SymModifiers};

/// Errors raised while resolving key names or loading symmaps.
#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    #[error("invalid language tag {0:?}")]
    InvalidLanguage(String),

    #[error("keymap for language {lang:?} not found at {path}")]
    LanguageNotFound { lang: String, path: PathBuf },

    #[error("I/O error reading keymap {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keymap is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid keymap entry: {0}")]
    InvalidEntry(String),
}

/// A key name that may or may not exist in the static keymap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyName {
    Known(LogicalKey),
    /// The raw name, kept verbatim.
    Unresolved(String),
}

impl KeyName {
    /// Looks `name` up in the static keymap without applying any policy.
    pub fn parse(name: &str) -> Self {
        match LogicalKey::from_name(name) {
            Some(key) => KeyName::Known(key),
            None => KeyName::Unresolved(name.to_string()),
        }
    }

    /// Returns the logical key if the name resolved.
    pub fn known(&self) -> Option<LogicalKey> {
        match self {
            KeyName::Known(key) => Some(*key),
            KeyName::Unresolved(_) => None,
        }
    }
}

impl From<LogicalKey> for KeyName {
    fn from(key: LogicalKey) -> Self {
        KeyName::Known(key)
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Known(key) => f.write_str(key.name()),
            KeyName::Unresolved(name) => f.write_str(name),
        }
    }
}

/// What to do with a key name that is not in the static keymap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedKeyPolicy {
    /// Reject the name with [`KeymapError::UnknownKey`].
    Strict,
    /// Hand the name back unchanged as [`KeyName::Unresolved`]; the caller
    /// decides whether to drop or forward it.
    #[default]
    PassThrough,
}

impl UnresolvedKeyPolicy {
    /// Resolves `name` under this policy.
    ///
    /// # Errors
    ///
    /// Returns [`KeymapError::UnknownKey`] for unknown names when the policy
    /// is [`UnresolvedKeyPolicy::Strict`].
    pub fn resolve(self, name: &str) -> Result<KeyName, KeymapError> {
        self.apply(KeyName::parse(name))
    }

    /// Applies this policy to an already-parsed name.
    ///
    /// # Errors
    ///
    /// See [`UnresolvedKeyPolicy::resolve`].
    pub fn apply(self, name: KeyName) -> Result<KeyName, KeymapError> {
        match (self, name) {
            (UnresolvedKeyPolicy::Strict, KeyName::Unresolved(raw)) => {
                Err(KeymapError::UnknownKey(raw))
            }
            (_, name) => Ok(name),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
