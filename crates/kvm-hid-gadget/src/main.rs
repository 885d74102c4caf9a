//! KVM HID gadget service entry point.
//!
//! Loads the configuration, opens the keyboard and mouse gadget devices,
//! starts their drain loops and the jiggler, then serves ingress requests on
//! stdin until the stream closes or Ctrl+C arrives.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                 -- TOML file, defaults if missing
//!  └─ HidDevice × 2                 -- keyboard + mouse, lazily opened
//!  │    └─ spawn_drain_loop()       -- one write attempt per tick
//!  └─ Jiggler                       -- idle pointer nudges
//!  └─ InputService                  -- reports from ingress requests
//!  └─ run_ingress(stdin, stdout)    -- until EOF or Ctrl+C
//!  └─ InputService::shutdown()      -- release keys, close devices
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kvm_hid_core::KeymapStore;
use kvm_hid_gadget::application::activity::Activity;
use kvm_hid_gadget::application::input_service::{InputService, InputSettings};
use kvm_hid_gadget::application::jiggler::Jiggler;
use kvm_hid_gadget::infrastructure::device::gadget::GadgetOpener;
use kvm_hid_gadget::infrastructure::device::{
    spawn_drain_loop, DeviceOpener, DeviceOptions, HidDevice,
};
use kvm_hid_gadget::infrastructure::ingress::run_ingress;
use kvm_hid_gadget::infrastructure::storage::config::{
    load_config, FileJigglerSettings, DEFAULT_CONFIG_PATH,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// KVM HID gadget service.
///
/// Turns keyboard, mouse and text input from the web transport into USB HID
/// reports for the gadget devices.
#[derive(Debug, Parser)]
#[command(
    name = "kvm-hid-gadget",
    about = "Delivers keyboard and mouse input to USB gadget HID devices",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.
    ///
    /// A missing file is not an error: built-in defaults are used, and the
    /// file is created the first time jiggler settings change.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "KVM_HID_CONFIG")]
    config: PathBuf,

    /// Overrides `hid.keyboard_device` from the configuration file.
    #[arg(long, env = "KVM_HID_KEYBOARD")]
    keyboard_device: Option<PathBuf>,

    /// Overrides `hid.mouse_device` from the configuration file.
    #[arg(long, env = "KVM_HID_MOUSE")]
    mouse_device: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("cannot load configuration {}", cli.config.display()))?;
    if let Some(path) = cli.keyboard_device {
        config.hid.keyboard_device = path;
    }
    if let Some(path) = cli.mouse_device {
        config.hid.mouse_device = path;
    }

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("KVM HID gadget service starting (config {})", cli.config.display());

    // ── Devices ───────────────────────────────────────────────────────────────
    let hid = &config.hid;
    let options = DeviceOptions {
        write_timeout: Some(Duration::from_millis(hid.write_timeout_ms))
            .filter(|timeout| !timeout.is_zero()),
        queue_capacity: hid.queue_capacity,
    };
    let opener: Arc<dyn DeviceOpener> = Arc::new(GadgetOpener);
    let keyboard = Arc::new(HidDevice::new(
        "keyboard",
        &hid.keyboard_device,
        Arc::clone(&opener),
        options,
    ));
    let mouse = Arc::new(HidDevice::new("mouse", &hid.mouse_device, opener, options));

    // A missing device is not fatal: the first report retries the open.
    for device in [&keyboard, &mouse] {
        if let Err(e) = device.open().await {
            warn!("{e}; will retry on first report");
        }
    }

    let drain_interval = Duration::from_millis(hid.drain_interval_ms.max(1));
    let keyboard_drain = spawn_drain_loop(Arc::clone(&keyboard), drain_interval);
    let mouse_drain = spawn_drain_loop(Arc::clone(&mouse), drain_interval);

    // ── Keymaps ───────────────────────────────────────────────────────────────
    let keymaps = Arc::new(KeymapStore::new(&hid.keymaps_dir));
    let languages = keymaps.supported_languages();
    if languages.is_empty() {
        warn!("no keymaps found in {}", hid.keymaps_dir.display());
    } else {
        info!("keyboard languages: {}", languages.join(", "));
    }

    // ── Jiggler ───────────────────────────────────────────────────────────────
    let activity = Arc::new(Activity::new(hid.absolute_mode));
    let jiggler = Arc::new(Jiggler::new(
        mouse.clone(),
        Arc::clone(&activity),
        Arc::new(FileJigglerSettings::new(&cli.config)),
        Duration::from_secs(config.jiggler.interval_secs),
    ));
    if config.jiggler.enabled {
        jiggler.start().await;
    }

    // ── Input service ─────────────────────────────────────────────────────────
    let service = Arc::new(InputService::new(
        keyboard.clone(),
        mouse.clone(),
        keymaps,
        activity,
        jiggler,
        InputSettings {
            unresolved_keys: hid.unresolved_keys,
            shortcuts: config.shortcuts.clone(),
            pace_interval: drain_interval,
            typing_queue_limit: (hid.queue_capacity / 2).max(1),
        },
    ));

    // ── Serve until EOF or Ctrl+C ─────────────────────────────────────────────
    info!("ready; reading requests from stdin");
    tokio::select! {
        result = run_ingress(&service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
            if let Err(e) = result {
                error!("ingress stream failed: {e}");
            }
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        },
    }

    // The drain loops keep running until the keyboard queue has emptied.
    service.shutdown().await;
    keyboard_drain.abort();
    mouse_drain.abort();

    info!("KVM HID gadget service stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_system_config_path() {
        // Arrange / Act
        let cli = Cli::parse_from(["kvm-hid-gadget"]);

        // Assert
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(cli.keyboard_device.is_none());
        assert!(cli.mouse_device.is_none());
    }

    #[test]
    fn test_cli_accepts_device_overrides() {
        let cli = Cli::parse_from([
            "kvm-hid-gadget",
            "--config",
            "/tmp/hid.toml",
            "--keyboard-device",
            "/dev/hidg4",
            "--mouse-device",
            "/dev/hidg5",
        ]);

        assert_eq!(cli.config, PathBuf::from("/tmp/hid.toml"));
        assert_eq!(cli.keyboard_device, Some(PathBuf::from("/dev/hidg4")));
        assert_eq!(cli.mouse_device, Some(PathBuf::from("/dev/hidg5")));
    }
}
