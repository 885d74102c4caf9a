//! End-to-end tests: ingress requests through the input service and the
//! device queues down to (mock) gadget files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kvm_hid_core::{KeyboardReport, KeymapStore};
use kvm_hid_gadget::application::activity::Activity;
use kvm_hid_gadget::application::input_service::{HidStatus, InputService, InputSettings};
use kvm_hid_gadget::application::jiggler::Jiggler;
use kvm_hid_gadget::infrastructure::device::mock::MockGadget;
use kvm_hid_gadget::infrastructure::device::{spawn_drain_loop, DeviceOptions, HidDevice};
use kvm_hid_gadget::infrastructure::ingress::{run_ingress, IngressReply};
use kvm_hid_gadget::infrastructure::storage::config::{load_config, FileJigglerSettings};
use tokio::task::JoinHandle;
use uuid::Uuid;

// ── Fixture ───────────────────────────────────────────────────────────────────

struct Rig {
    service: Arc<InputService>,
    keyboard: Arc<HidDevice>,
    keyboard_mock: MockGadget,
    mouse_mock: MockGadget,
    config_path: PathBuf,
    drains: Vec<JoinHandle<()>>,
}

impl Drop for Rig {
    fn drop(&mut self) {
        for drain in &self.drains {
            drain.abort();
        }
        if let Some(dir) = self.config_path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }
}

fn keymaps_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../keymaps")
}

fn rig(queue_capacity: usize) -> Rig {
    let options = DeviceOptions {
        write_timeout: Some(Duration::from_millis(500)),
        queue_capacity,
    };
    let keyboard_mock = MockGadget::new();
    let mouse_mock = MockGadget::new();
    let keyboard = Arc::new(HidDevice::new(
        "keyboard",
        "/dev/hidg0",
        Arc::new(keyboard_mock.clone()),
        options,
    ));
    let mouse = Arc::new(HidDevice::new(
        "mouse",
        "/dev/hidg1",
        Arc::new(mouse_mock.clone()),
        options,
    ));
    let drain = Duration::from_millis(5);
    let drains = vec![
        spawn_drain_loop(Arc::clone(&keyboard), drain),
        spawn_drain_loop(Arc::clone(&mouse), drain),
    ];

    let config_path = std::env::temp_dir()
        .join(format!("kvm_hid_pipeline_{}", Uuid::new_v4()))
        .join("config.toml");
    let activity = Arc::new(Activity::new(true));
    let jiggler = Arc::new(Jiggler::new(
        mouse.clone(),
        Arc::clone(&activity),
        Arc::new(FileJigglerSettings::new(&config_path)),
        Duration::from_secs(60),
    ));
    let service = Arc::new(InputService::new(
        keyboard.clone(),
        mouse,
        Arc::new(KeymapStore::new(keymaps_dir())),
        activity,
        jiggler,
        InputSettings {
            pace_interval: drain,
            typing_queue_limit: (queue_capacity / 2).max(1),
            ..InputSettings::default()
        },
    ));

    Rig {
        service,
        keyboard,
        keyboard_mock,
        mouse_mock,
        config_path,
        drains,
    }
}

fn kb(modifiers: u8, keys: [u8; 6]) -> Vec<u8> {
    KeyboardReport::new(modifiers, keys).into()
}

async fn serve(rig: &Rig, requests: &str) -> Vec<IngressReply> {
    let mut out = Vec::new();
    run_ingress(&rig.service, requests.as_bytes(), &mut out)
        .await
        .unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ── Typing ────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_pasted_text_reaches_the_keyboard_device_in_order() {
    // Arrange
    let rig = rig(1024);

    // Act
    rig.service.type_text("Hi", "en-us").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Assert
    assert_eq!(
        rig.keyboard_mock.writes(),
        vec![
            kb(0x02, [0; 6]),
            kb(0x02, [0x0B, 0, 0, 0, 0, 0]),
            kb(0x02, [0; 6]),
            kb(0, [0; 6]),
            kb(0, [0x0C, 0, 0, 0, 0, 0]),
            kb(0, [0; 6]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_long_paste_is_not_truncated_by_a_small_queue() {
    // Arrange – a queue far smaller than the 22 reports "hello world" needs
    let rig = rig(8);

    // Act
    let sent = rig.service.type_text("hello world", "en-us").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Assert
    assert_eq!(sent, 22);
    assert_eq!(rig.keyboard_mock.writes().len(), 22);
}

#[tokio::test(start_paused = true)]
async fn test_mouse_input_is_served_while_a_long_paste_types() {
    // Arrange
    let rig = rig(8);
    let text = "a".repeat(2000);
    let requests = format!(
        "{}\n{}\n",
        serde_json::json!({ "type": "Paste", "text": text, "lang": "en-us" }),
        r#"{"type":"Mouse","buttons":1,"relativeX":0.5,"relativeY":0.5,"isAbsoluteMode":true}"#,
    );

    // Act
    let replies = tokio::time::timeout(Duration::from_secs(5), serve(&rig, &requests))
        .await
        .expect("ingress stalled behind the paste");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Assert – the mouse report went out while typing was still under way
    assert_eq!(
        replies,
        vec![
            IngressReply::Typing { characters: 2000 },
            IngressReply::Ok { reports: 1 },
        ]
    );
    assert_eq!(rig.mouse_mock.writes().len(), 1);
    assert!(rig.keyboard_mock.writes().len() < 4000);
}

// ── Device status ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_status_follows_write_outcomes() {
    // Arrange
    let rig = rig(1024);
    rig.keyboard_mock.set_fail_writes(true);

    // Act – a failing write
    rig.service
        .handle_keyboard_snapshot(&["KeyA".to_string()])
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Assert
    assert!(!rig.service.status().keyboard_online);

    // Act – the next write succeeds
    rig.keyboard_mock.set_fail_writes(false);
    rig.service.handle_keyboard_snapshot(&[]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Assert
    assert!(rig.service.status().keyboard_online);
    assert_eq!(rig.keyboard_mock.writes(), vec![kb(0, [0; 6])]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_then_closes_and_next_report_reopens() {
    // Arrange
    let rig = rig(1024);
    rig.service
        .handle_keyboard_snapshot(&["KeyA".to_string()])
        .unwrap();

    // Act
    rig.service.shutdown().await;

    // Assert – the press and the release-all both reached the device
    assert_eq!(
        rig.keyboard_mock.writes(),
        vec![kb(0, [0x04, 0, 0, 0, 0, 0]), kb(0, [0; 6])]
    );
    assert!(!rig.keyboard.is_open().await);

    // Act – new input after shutdown
    rig.service
        .handle_keyboard_snapshot(&["KeyB".to_string()])
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Assert
    assert_eq!(rig.keyboard_mock.open_count(), 2);
    assert!(rig.keyboard.is_open().await);
}

// ── Ingress ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ingress_session_replies_line_by_line() {
    // Arrange
    let rig = rig(1024);
    let requests = concat!(
        r#"{"type":"Keyboard","keys":["KeyA"]}"#,
        "\n",
        "this is not json\n",
        "\n",
        r#"{"type":"Status"}"#,
        "\n",
        r#"{"type":"Languages"}"#,
        "\n",
        r#"{"type":"Shortcut","name":"Ctrl+Alt+Del"}"#,
        "\n",
    );

    // Act
    let replies = serve(&rig, requests).await;

    // Assert
    assert_eq!(replies.len(), 5);
    assert_eq!(replies[0], IngressReply::Ok { reports: 1 });
    assert!(matches!(replies[1], IngressReply::Error { .. }));
    assert_eq!(
        replies[2],
        IngressReply::Status(HidStatus {
            keyboard_online: true,
            mouse_online: true,
            absolute_mode: true,
            jiggler_running: false,
        })
    );
    assert_eq!(
        replies[3],
        IngressReply::Languages {
            languages: vec!["de".to_string(), "en-us".to_string()]
        }
    );
    // Shortcuts come from the configuration; none are configured here.
    assert!(matches!(replies[4], IngressReply::Error { .. }));
}

#[tokio::test]
async fn test_jiggler_requests_are_persisted_to_the_config_file() {
    // Arrange
    let rig = rig(1024);

    // Act
    let replies = serve(&rig, "{\"type\":\"Jiggler\",\"interval_secs\":30}\n").await;

    // Assert
    assert_eq!(
        replies,
        vec![IngressReply::Jiggler {
            running: true,
            interval_secs: 30
        }]
    );
    let saved = load_config(&rig.config_path).unwrap();
    assert!(saved.jiggler.enabled);
    assert_eq!(saved.jiggler.interval_secs, 30);

    // Act – stop keeps the interval
    let replies = serve(&rig, "{\"type\":\"Jiggler\",\"enabled\":false}\n").await;

    // Assert
    assert_eq!(
        replies,
        vec![IngressReply::Jiggler {
            running: false,
            interval_secs: 30
        }]
    );
    let saved = load_config(&rig.config_path).unwrap();
    assert!(!saved.jiggler.enabled);
    assert_eq!(saved.jiggler.interval_secs, 30);
}

#[tokio::test]
async fn test_paste_with_unknown_language_replies_with_error() {
    let rig = rig(1024);

    let replies = serve(
        &rig,
        "{\"type\":\"Paste\",\"text\":\"hi\",\"lang\":\"tlh\"}\n",
    )
    .await;

    assert!(matches!(replies[0], IngressReply::Error { .. }));
}
