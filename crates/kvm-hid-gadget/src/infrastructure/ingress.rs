//! Newline-delimited JSON ingress.
//!
//! The web transport that normally sits in front of this service is a
//! separate process.  It talks to us over a byte stream (stdin by default),
//! one JSON object per line, and reads one JSON reply per line back.
//!
//! # Messages
//!
//! Every message is an object with a `"type"` field; the other fields sit
//! next to it:
//!
//! ```json
//! {"type":"Keyboard","keys":["ShiftLeft","KeyA"]}
//! {"type":"Mouse","buttons":1,"relativeX":0.5,"relativeY":0.5,"isAbsoluteMode":true}
//! {"type":"Paste","text":"Hello","lang":"en-us"}
//! {"type":"Shortcut","name":"Ctrl+Alt+Del"}
//! {"type":"Jiggler","enabled":true,"interval_secs":120}
//! {"type":"Status"}
//! {"type":"Languages"}
//! ```
//!
//! A line that does not parse, or a request the service rejects, produces an
//! `{"type":"Error","message":...}` reply; the stream keeps going.
//!
//! `Paste` replies `{"type":"Typing","characters":N}` as soon as the layout
//! is loaded.  The text is typed in the background while later lines are
//! served.

use std::sync::Arc;

use kvm_hid_core::MouseEvent;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::application::input_service::{HidStatus, InputService};

// ── Messages ──────────────────────────────────────────────────────────────────

/// A request from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IngressMsg {
    /// Full set of key names currently held down.
    Keyboard { keys: Vec<String> },

    /// One mouse event; fields use the browser's camelCase names.
    Mouse(MouseEvent),

    /// Text to type on keyboard language `lang`.
    Paste { text: String, lang: String },

    /// A named key combination from the configuration.
    Shortcut { name: String },

    /// Jiggler control.  `interval_secs` wins over `enabled` when both are
    /// present; `0` stops the jiggler.
    Jiggler {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        interval_secs: Option<u64>,
    },

    Status,

    Languages,
}

/// A reply to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IngressReply {
    /// Number of HID reports the request produced.
    Ok { reports: usize },

    /// A paste was accepted and is being typed.
    Typing { characters: usize },

    Status(HidStatus),

    Languages { languages: Vec<String> },

    Jiggler { running: bool, interval_secs: u64 },

    Error { message: String },
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Executes one request against `service`.
pub async fn dispatch(service: &Arc<InputService>, msg: IngressMsg) -> IngressReply {
    let result = match msg {
        IngressMsg::Keyboard { keys } => service.handle_keyboard_snapshot(&keys),
        IngressMsg::Mouse(event) => {
            service.handle_mouse(event);
            Ok(1)
        }
        IngressMsg::Paste { text, lang } => match service.spawn_typing(&text, &lang) {
            Ok(characters) => return IngressReply::Typing { characters },
            Err(e) => Err(e),
        },
        IngressMsg::Shortcut { name } => service.press_shortcut(&name),
        IngressMsg::Jiggler {
            enabled,
            interval_secs,
        } => {
            let jiggler = service.jiggler();
            match (interval_secs, enabled) {
                (Some(secs), _) => jiggler.set_interval(secs).await,
                (None, Some(true)) => jiggler.start().await,
                (None, Some(false)) => jiggler.stop().await,
                (None, None) => {}
            }
            return IngressReply::Jiggler {
                running: jiggler.is_running(),
                interval_secs: jiggler.interval().as_secs(),
            };
        }
        IngressMsg::Status => return IngressReply::Status(service.status()),
        IngressMsg::Languages => {
            return IngressReply::Languages {
                languages: service.supported_languages(),
            }
        }
    };

    match result {
        Ok(reports) => IngressReply::Ok { reports },
        Err(e) => {
            warn!("request rejected: {e}");
            IngressReply::Error {
                message: e.to_string(),
            }
        }
    }
}

/// Parses one line and dispatches it.  Blank lines yield `None`.
pub async fn handle_line(service: &Arc<InputService>, line: &str) -> Option<IngressReply> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let reply = match serde_json::from_str::<IngressMsg>(line) {
        Ok(msg) => dispatch(service, msg).await,
        Err(e) => {
            warn!("invalid ingress message: {e}");
            IngressReply::Error {
                message: format!("invalid message: {e}"),
            }
        }
    };
    Some(reply)
}

/// Serves requests from `reader` until end of stream, writing one reply line
/// per request to `writer`.
///
/// # Errors
///
/// Returns an I/O error if reading or writing the stream fails.
pub async fn run_ingress<R, W>(
    service: &Arc<InputService>,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(reply) = handle_line(service, &line).await else {
            continue;
        };
        let mut out = serde_json::to_string(&reply).map_err(std::io::Error::other)?;
        debug!("ingress reply {out}");
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }
    info!("ingress stream closed");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_message_parses() {
        let msg: IngressMsg =
            serde_json::from_str(r#"{"type":"Keyboard","keys":["KeyA","ShiftLeft"]}"#).unwrap();

        assert_eq!(
            msg,
            IngressMsg::Keyboard {
                keys: vec!["KeyA".into(), "ShiftLeft".into()]
            }
        );
    }

    #[test]
    fn test_mouse_message_uses_camel_case_and_defaults() {
        // Arrange
        let json = r#"{"type":"Mouse","buttons":1,"relativeX":0.25,"isAbsoluteMode":true}"#;

        // Act
        let msg: IngressMsg = serde_json::from_str(json).unwrap();

        // Assert
        let IngressMsg::Mouse(event) = msg else {
            panic!("expected a Mouse message");
        };
        assert_eq!(event.buttons, 1);
        assert_eq!(event.relative_x, 0.25);
        assert_eq!(event.relative_y, 0.0);
        assert!(event.is_absolute_mode);
        assert_eq!(event.sensitivity, 1.0);
    }

    #[test]
    fn test_jiggler_fields_are_optional() {
        let msg: IngressMsg = serde_json::from_str(r#"{"type":"Jiggler"}"#).unwrap();

        assert_eq!(
            msg,
            IngressMsg::Jiggler {
                enabled: None,
                interval_secs: None
            }
        );
    }

    #[test]
    fn test_unit_messages_parse() {
        assert_eq!(
            serde_json::from_str::<IngressMsg>(r#"{"type":"Status"}"#).unwrap(),
            IngressMsg::Status
        );
        assert_eq!(
            serde_json::from_str::<IngressMsg>(r#"{"type":"Languages"}"#).unwrap(),
            IngressMsg::Languages
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<IngressMsg>(r#"{"type":"Reboot"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_reply_serializes_flat() {
        let reply = IngressReply::Status(HidStatus {
            keyboard_online: true,
            mouse_online: false,
            absolute_mode: true,
            jiggler_running: false,
        });

        let json = serde_json::to_string(&reply).unwrap();

        assert_eq!(
            json,
            r#"{"type":"Status","keyboard_online":true,"mouse_online":false,"absolute_mode":true,"jiggler_running":false}"#
        );
    }

    #[test]
    fn test_typing_reply_serializes_character_count() {
        let json = serde_json::to_string(&IngressReply::Typing { characters: 12 }).unwrap();

        assert_eq!(json, r#"{"type":"Typing","characters":12}"#);
    }

    #[test]
    fn test_error_reply_serializes_with_message() {
        let reply = IngressReply::Error {
            message: "unknown shortcut \"X\"".into(),
        };

        let json = serde_json::to_string(&reply).unwrap();

        assert_eq!(json, r#"{"type":"Error","message":"unknown shortcut \"X\""}"#);
    }
}
