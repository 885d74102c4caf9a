//! TOML-based configuration for the HID service.
//!
//! The file lives at `/etc/kvm-hid/config.toml` unless `--config` (or the
//! `KVM_HID_CONFIG` environment variable) says otherwise:
//!
//! ```toml
//! log_level = "info"
//!
//! [hid]
//! keyboard_device = "/dev/hidg0"
//! mouse_device = "/dev/hidg1"
//! keymaps_dir = "/usr/share/kvm-hid/keymaps"
//! absolute_mode = true
//! unresolved_keys = "pass-through"
//!
//! [jiggler]
//! enabled = false
//! interval_secs = 60
//!
//! [shortcuts]
//! "Ctrl+Alt+Del" = ["ControlLeft", "AltLeft", "Delete"]
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a missing file, a
//! missing section or a missing key all fall back to the values above.  This
//! keeps first boot and upgrades from older files working.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use kvm_hid_core::UnresolvedKeyPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::application::jiggler::{JigglerSettingsStore, SettingsError};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kvm-hid/config.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub hid: HidConfig,
    #[serde(default)]
    pub jiggler: JigglerConfig,
    /// Named key combinations, pressed in order and released in reverse.
    #[serde(default = "default_shortcuts")]
    pub shortcuts: BTreeMap<String, Vec<String>>,
}

/// Gadget device and input pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HidConfig {
    /// Keyboard function of the USB gadget.
    #[serde(default = "default_keyboard_device")]
    pub keyboard_device: PathBuf,
    /// Mouse function of the USB gadget.
    #[serde(default = "default_mouse_device")]
    pub mouse_device: PathBuf,
    /// Directory holding one `<lang>.json` symmap per keyboard language.
    #[serde(default = "default_keymaps_dir")]
    pub keymaps_dir: PathBuf,
    /// Whether the mouse gadget is configured as an absolute pointer.
    #[serde(default = "default_true")]
    pub absolute_mode: bool,
    /// What to do with key names missing from the keymap.
    #[serde(default)]
    pub unresolved_keys: UnresolvedKeyPolicy,
    /// Period of the drain loop feeding queued reports to the device.
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Upper bound on a single device write.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Reports held per device before the oldest is dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Anti-idle mouse jiggler settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JigglerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Idle time after which the pointer is nudged.
    #[serde(default = "default_jiggler_interval_secs")]
    pub interval_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_keyboard_device() -> PathBuf {
    PathBuf::from("/dev/hidg0")
}
fn default_mouse_device() -> PathBuf {
    PathBuf::from("/dev/hidg1")
}
fn default_keymaps_dir() -> PathBuf {
    PathBuf::from("/usr/share/kvm-hid/keymaps")
}
fn default_true() -> bool {
    true
}
fn default_drain_interval_ms() -> u64 {
    5
}
fn default_write_timeout_ms() -> u64 {
    500
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_jiggler_interval_secs() -> u64 {
    60
}

fn default_shortcuts() -> BTreeMap<String, Vec<String>> {
    let combos: [(&str, &[&str]); 7] = [
        ("Ctrl+Alt+Del", &["ControlLeft", "AltLeft", "Delete"]),
        ("Alt+Tab", &["AltLeft", "Tab"]),
        ("Alt+F4", &["AltLeft", "F4"]),
        ("Alt+Enter", &["AltLeft", "Enter"]),
        ("Ctrl+W", &["ControlLeft", "KeyW"]),
        ("Ctrl+C", &["ControlLeft", "KeyC"]),
        ("Ctrl+V", &["ControlLeft", "KeyV"]),
    ];
    combos
        .into_iter()
        .map(|(name, keys)| {
            (
                name.to_string(),
                keys.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            hid: HidConfig::default(),
            jiggler: JigglerConfig::default(),
            shortcuts: default_shortcuts(),
        }
    }
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            keyboard_device: default_keyboard_device(),
            mouse_device: default_mouse_device(),
            keymaps_dir: default_keymaps_dir(),
            absolute_mode: default_true(),
            unresolved_keys: UnresolvedKeyPolicy::default(),
            drain_interval_ms: default_drain_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for JigglerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_jiggler_interval_secs(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Persists jiggler settings into the `[jiggler]` section of a config file.
///
/// The file is re-read before each write so edits made to other sections
/// while the service runs are kept.  File I/O runs on the blocking pool.
pub struct FileJigglerSettings {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileJigglerSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Read-modify-write of the `[jiggler]` section, serialized by `lock`.
fn update_jiggler_section(
    path: &Path,
    lock: &Mutex<()>,
    jiggler: JigglerConfig,
) -> Result<(), ConfigError> {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut config = load_config(path)?;
    config.jiggler = jiggler;
    save_config(path, &config)
}

#[async_trait]
impl JigglerSettingsStore for FileJigglerSettings {
    async fn persist(&self, enabled: bool, interval_secs: u64) -> Result<(), SettingsError> {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        let jiggler = JigglerConfig {
            enabled,
            interval_secs,
        };
        tokio::task::spawn_blocking(move || update_jiggler_section(&path, &lock, jiggler))
            .await
            .map_err(|e| SettingsError::Save(Box::new(e)))?
            .map_err(|e| SettingsError::Save(Box::new(e)))?;
        info!(
            "saved jiggler settings (enabled={enabled}, interval={interval_secs}s) to {}",
            self.path.display()
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
