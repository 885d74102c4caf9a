//! Per-language KeySym tables ("symmaps") and their process-wide cache.
//!
//! A symmap tells the text typer which physical key, and which modifiers,
//! produce a given KeySym on one keyboard layout.  Each language ships as a
//! JSON file named `<lang>.json` in the keymap directory:
//!
//! ```json
//! {
//!   "65":  { "1": "KeyA" },
//!   "97":  { "0": "KeyA" },
//!   "8364": { "2": "KeyE", "3": "Digit4" }
//! }
//! ```
//!
//! The outer key is the KeySym (decimal, or hexadecimal with a `0x` prefix);
//! the inner object maps a [`SymModifiers`] bitmask to a key name.  When a
//! KeySym is reachable in several ways, the alternatives keep the order in
//! which the file declares them and the typer uses the first one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, error, info};

use super::{KeyName, KeymapError};

/// Modifier bits used by symmap entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SymModifiers(pub u8);

impl SymModifiers {
    pub const SHIFT: u8 = 0x1;
    pub const ALTGR: u8 = 0x2;
    pub const CTRL: u8 = 0x4;

    /// Returns `true` if the entry needs Shift held.
    pub fn shift(&self) -> bool {
        self.0 & Self::SHIFT != 0
    }

    /// Returns `true` if the entry needs AltGr (right Alt) held.
    pub fn altgr(&self) -> bool {
        self.0 & Self::ALTGR != 0
    }

    /// Returns `true` if the entry needs Ctrl held.
    pub fn ctrl(&self) -> bool {
        self.0 & Self::CTRL != 0
    }
}

/// One way of producing a KeySym: a key pressed with some modifiers held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymEntry {
    pub modifiers: SymModifiers,
    pub key: KeyName,
}

/// KeySym table for a single keyboard language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymMap {
    entries: HashMap<u32, Vec<SymEntry>>,
}

impl SymMap {
    /// Parses a symmap from JSON text.
    ///
    /// Key names are resolved against the static keymap; names that do not
    /// resolve are kept as [`KeyName::Unresolved`] so the caller can apply its
    /// unresolved-key policy when the entry is used.
    ///
    /// # Errors
    ///
    /// Returns [`KeymapError::Parse`] for malformed JSON and
    /// [`KeymapError::InvalidEntry`] when the document does not have the
    /// `{keysym: {modifiers: name}}` shape.
    pub fn from_json(text: &str) -> Result<Self, KeymapError> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(root) = root else {
            return Err(KeymapError::InvalidEntry("top level must be an object".into()));
        };

        let mut entries = HashMap::with_capacity(root.len());
        for (sym, alternatives) in root {
            let keysym = parse_number(&sym)
                .ok_or_else(|| KeymapError::InvalidEntry(format!("keysym {sym:?} is not a number")))?;
            let Value::Object(alternatives) = alternatives else {
                return Err(KeymapError::InvalidEntry(format!(
                    "keysym {sym} must map to an object"
                )));
            };

            let mut list = Vec::with_capacity(alternatives.len());
            for (mods, name) in alternatives {
                let modifiers = parse_number(&mods)
                    .and_then(|m| u8::try_from(m).ok())
                    .ok_or_else(|| {
                        KeymapError::InvalidEntry(format!("keysym {sym}: bad modifier mask {mods:?}"))
                    })?;
                let Value::String(name) = name else {
                    return Err(KeymapError::InvalidEntry(format!(
                        "keysym {sym}: key name must be a string"
                    )));
                };
                list.push(SymEntry {
                    modifiers: SymModifiers(modifiers),
                    key: KeyName::parse(&name),
                });
            }
            entries.insert(keysym, list);
        }

        Ok(Self { entries })
    }

    /// Returns every alternative for `keysym`, in declaration order.
    pub fn lookup(&self, keysym: u32) -> Option<&[SymEntry]> {
        self.entries.get(&keysym).map(Vec::as_slice)
    }

    /// Returns the preferred (first declared) alternative for `keysym`.
    pub fn first(&self, keysym: u32) -> Option<&SymEntry> {
        self.lookup(keysym).and_then(<[SymEntry]>::first)
    }

    /// Number of KeySyms in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_number(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Loads symmaps lazily from a directory and caches them for the life of the
/// process.
///
/// Failed loads are not cached: a language file installed later is picked up
/// on the next request.
#[derive(Debug)]
pub struct KeymapStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<SymMap>>>,
    languages: Mutex<Option<Vec<String>>>,
}

impl KeymapStore {
    /// Creates a store reading `<dir>/<lang>.json` files.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
            languages: Mutex::new(None),
        }
    }

    /// Directory the store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the symmap for `lang`, loading it on first use.
    ///
    /// # Errors
    ///
    /// - [`KeymapError::InvalidLanguage`] if `lang` is not a plain file stem.
    /// - [`KeymapError::LanguageNotFound`] if no file exists for `lang`.
    /// - [`KeymapError::Io`], [`KeymapError::Parse`] or
    ///   [`KeymapError::InvalidEntry`] if the file cannot be read or parsed.
    pub fn get(&self, lang: &str) -> Result<Arc<SymMap>, KeymapError> {
        if let Some(map) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(lang)
        {
            return Ok(Arc::clone(map));
        }

        let map = Arc::new(self.load(lang)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let map = cache.entry(lang.to_string()).or_insert(map);
        Ok(Arc::clone(map))
    }

    fn load(&self, lang: &str) -> Result<SymMap, KeymapError> {
        let valid = !lang.is_empty()
            && lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(KeymapError::InvalidLanguage(lang.to_string()));
        }

        let path = self.dir.join(format!("{lang}.json"));
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeymapError::LanguageNotFound {
                    lang: lang.to_string(),
                    path,
                });
            }
            Err(source) => return Err(KeymapError::Io { path, source }),
        };

        let map = SymMap::from_json(&text)?;
        info!("loaded keymap {lang} ({} keysyms) from {}", map.len(), path.display());
        Ok(map)
    }

    /// Lists the languages with a `.json` file in the keymap directory.
    ///
    /// The listing is cached after the first successful read.  A directory
    /// that cannot be read yields an empty list (logged, not cached).
    pub fn supported_languages(&self) -> Vec<String> {
        let mut guard = self.languages.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(langs) = guard.as_ref() {
            return langs.clone();
        }

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("cannot read keymap directory {}: {e}", self.dir.display());
                return Vec::new();
            }
        };

        let mut langs: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        langs.sort();
        debug!("supported keymap languages: {langs:?}");

        *guard = Some(langs.clone());
        langs
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::LogicalKey;
    use uuid::Uuid;

    const EN_US: &str = r#"{
        "65": { "1": "KeyA" },
        "97": { "0": "KeyA" },
        "0x20AC": { "2": "KeyE", "3": "Digit4" },
        "1": { "0": "Fn" }
    }"#;

    fn temp_keymap_dir(files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kvm_hid_keymaps_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_from_json_parses_decimal_and_hex_keysyms() {
        // Arrange / Act
        let map = SymMap::from_json(EN_US).unwrap();

        // Assert
        assert_eq!(map.len(), 4);
        assert!(map.lookup(65).is_some());
        assert!(map.lookup(0x20AC).is_some());
        assert!(map.lookup(66).is_none());
    }

    #[test]
    fn test_alternatives_keep_declaration_order() {
        let map = SymMap::from_json(EN_US).unwrap();

        let alts = map.lookup(0x20AC).unwrap();

        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].modifiers, SymModifiers(2));
        assert_eq!(alts[0].key, KeyName::Known(LogicalKey::KeyE));
        assert_eq!(alts[1].key, KeyName::Known(LogicalKey::Digit4));
        assert_eq!(map.first(0x20AC), Some(&alts[0]));
    }

    #[test]
    fn test_declaration_order_is_not_numeric_order() {
        let map = SymMap::from_json(r#"{ "33": { "3": "Digit1", "1": "Digit1" } }"#).unwrap();
        assert_eq!(map.first(33).unwrap().modifiers, SymModifiers(3));
    }

    #[test]
    fn test_unknown_key_names_are_kept_unresolved() {
        let map = SymMap::from_json(EN_US).unwrap();
        assert_eq!(map.first(1).unwrap().key, KeyName::Unresolved("Fn".to_string()));
    }

    #[test]
    fn test_shift_entry_reports_shift_modifier() {
        let map = SymMap::from_json(EN_US).unwrap();
        let entry = map.first(65).unwrap();
        assert!(entry.modifiers.shift());
        assert!(!entry.modifiers.altgr());
        assert!(!entry.modifiers.ctrl());
    }

    #[test]
    fn test_from_json_rejects_malformed_documents() {
        assert!(matches!(SymMap::from_json("[1, 2]"), Err(KeymapError::InvalidEntry(_))));
        assert!(matches!(
            SymMap::from_json(r#"{ "abc": { "0": "KeyA" } }"#),
            Err(KeymapError::InvalidEntry(_))
        ));
        assert!(matches!(
            SymMap::from_json(r#"{ "65": { "999": "KeyA" } }"#),
            Err(KeymapError::InvalidEntry(_))
        ));
        assert!(matches!(
            SymMap::from_json(r#"{ "65": { "0": 4 } }"#),
            Err(KeymapError::InvalidEntry(_))
        ));
        assert!(matches!(SymMap::from_json("{ not json"), Err(KeymapError::Parse(_))));
    }

    #[test]
    fn test_store_loads_and_caches_language() {
        // Arrange
        let dir = temp_keymap_dir(&[("en-us.json", EN_US)]);
        let store = KeymapStore::new(&dir);

        // Act
        let first = store.get("en-us").unwrap();
        std::fs::remove_file(dir.join("en-us.json")).unwrap();
        let second = store.get("en-us").unwrap();

        // Assert – second call is served from the cache
        assert!(Arc::ptr_eq(&first, &second));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_missing_language_is_not_found() {
        let dir = temp_keymap_dir(&[]);
        let store = KeymapStore::new(&dir);

        let result = store.get("xx");

        assert!(matches!(result, Err(KeymapError::LanguageNotFound { ref lang, .. }) if lang == "xx"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_rejects_path_like_language_tags() {
        let store = KeymapStore::new(std::env::temp_dir());
        for lang in ["../etc/passwd", "a/b", "", "en us"] {
            assert!(
                matches!(store.get(lang), Err(KeymapError::InvalidLanguage(_))),
                "{lang:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_store_failed_load_is_retried() {
        // Arrange
        let dir = temp_keymap_dir(&[]);
        let store = KeymapStore::new(&dir);
        assert!(store.get("de").is_err());

        // Act – the file appears after the first failure
        std::fs::write(dir.join("de.json"), EN_US).unwrap();
        let result = store.get("de");

        // Assert
        assert!(result.is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_supported_languages_lists_json_stems_sorted() {
        let dir = temp_keymap_dir(&[
            ("fr.json", "{}"),
            ("de.json", "{}"),
            ("README.md", "docs"),
        ]);
        let store = KeymapStore::new(&dir);

        assert_eq!(store.supported_languages(), vec!["de", "fr"]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_supported_languages_missing_dir_is_empty() {
        let store = KeymapStore::new("/nonexistent/path/that/cannot/exist");
        assert!(store.supported_languages().is_empty());
    }
}
