//! Input service use case: turns viewer input into HID reports.
//!
//! # What does this use case do?
//!
//! The transport in front of the appliance delivers four kinds of input:
//!
//! 1. **Keyboard snapshots** – the full set of key names currently held down
//!    in the browser.  The service diffs each snapshot against the previous
//!    one and replays the difference through the keyboard state machine,
//!    releases first, then presses in snapshot order.
//! 2. **Mouse events** – encoded directly in the mode the event declares.
//! 3. **Pasted text** – typed on a chosen keyboard language, one key
//!    transition at a time, pacing itself on the keyboard queue so that long
//!    pastes are not cut short by the queue's drop-oldest policy.  Pastes
//!    started with [`InputService::spawn_typing`] run as background tasks,
//!    one at a time, so other input keeps flowing while they type.
//! 4. **Named shortcuts** – key combinations from the configuration, pressed
//!    in order and released in reverse.
//!
//! Every state change produces exactly one report, enqueued on the keyboard
//! or mouse [`ReportSink`].  Enqueuing never blocks; the drain loops deliver
//! the reports to the gadget.
//!
//! # Concurrency
//!
//! Several transport connections and the typing task may feed the service
//! at once, so the keyboard state lives behind a mutex.  Reports are
//! enqueued while the lock is held, which keeps queue order identical to
//! state-change order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kvm_hid_core::{
    KeyName, KeyboardEvent, KeyboardReport, KeyboardState, KeymapError, KeymapStore, LogicalKey,
    MouseEvent, TypeText, UnresolvedKeyPolicy,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::application::activity::Activity;
use crate::application::jiggler::Jiggler;
use crate::application::ReportSink;

/// Longest `shutdown` waits for the keyboard queue to drain.
const SHUTDOWN_DRAIN_LIMIT: Duration = Duration::from_millis(500);

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors returned to the transport.
#[derive(Debug, Error)]
pub enum InputError {
    #[error(transparent)]
    Keymap(#[from] KeymapError),

    #[error("unknown shortcut {0:?}")]
    UnknownShortcut(String),
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Health snapshot for callers outside the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidStatus {
    pub keyboard_online: bool,
    pub mouse_online: bool,
    pub absolute_mode: bool,
    pub jiggler_running: bool,
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Behavioural settings taken from the configuration file.
#[derive(Debug, Clone)]
pub struct InputSettings {
    pub unresolved_keys: UnresolvedKeyPolicy,
    pub shortcuts: BTreeMap<String, Vec<String>>,
    /// How long typing sleeps when the keyboard queue is full enough.
    pub pace_interval: Duration,
    /// Queue depth at which typing waits for the drain loop.
    pub typing_queue_limit: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            unresolved_keys: UnresolvedKeyPolicy::default(),
            shortcuts: BTreeMap::new(),
            pace_interval: Duration::from_millis(5),
            typing_queue_limit: 64,
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Session {
    state: KeyboardState,
    /// Known keys of the last snapshot, in snapshot order.
    held: Vec<LogicalKey>,
}

/// The input use case.  See the module docs.
pub struct InputService {
    keyboard: Arc<dyn ReportSink>,
    mouse: Arc<dyn ReportSink>,
    keymaps: Arc<KeymapStore>,
    activity: Arc<Activity>,
    jiggler: Arc<Jiggler>,
    settings: InputSettings,
    session: Mutex<Session>,
    /// Held for the whole of one paste.
    typing: tokio::sync::Mutex<()>,
    typing_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl InputService {
    pub fn new(
        keyboard: Arc<dyn ReportSink>,
        mouse: Arc<dyn ReportSink>,
        keymaps: Arc<KeymapStore>,
        activity: Arc<Activity>,
        jiggler: Arc<Jiggler>,
        settings: InputSettings,
    ) -> Self {
        Self {
            keyboard,
            mouse,
            keymaps,
            activity,
            jiggler,
            settings,
            session: Mutex::new(Session::default()),
            typing: tokio::sync::Mutex::new(()),
            typing_tasks: Mutex::new(Vec::new()),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_keyboard(&self, report: KeyboardReport) {
        trace!("keyboard report {:02x?}", report.as_bytes());
        self.keyboard.enqueue_report(report.into());
    }

    /// Applies a full keyboard snapshot.  Returns the number of reports
    /// enqueued.
    ///
    /// # Errors
    ///
    /// Under [`UnresolvedKeyPolicy::Strict`], an unknown key name rejects the
    /// whole snapshot with [`KeymapError::UnknownKey`] before any state
    /// changes.
    pub fn handle_keyboard_snapshot(&self, names: &[String]) -> Result<usize, InputError> {
        let mut snapshot = Vec::with_capacity(names.len());
        for name in names {
            match self.settings.unresolved_keys.resolve(name)? {
                KeyName::Known(key) => {
                    if !snapshot.contains(&key) {
                        snapshot.push(key);
                    }
                }
                KeyName::Unresolved(raw) => debug!("ignoring unknown key {raw:?}"),
            }
        }

        let mut session = self.session();
        let mut sent = 0;
        let released: Vec<LogicalKey> = session
            .held
            .iter()
            .copied()
            .filter(|key| !snapshot.contains(key))
            .collect();
        let pressed: Vec<LogicalKey> = snapshot
            .iter()
            .copied()
            .filter(|key| !session.held.contains(key))
            .collect();

        let transitions = released
            .into_iter()
            .map(|key| (key, false))
            .chain(pressed.into_iter().map(|key| (key, true)));
        for (key, down) in transitions {
            if let Some(report) = session.state.apply(KeyboardEvent::from_key(key, down)) {
                self.send_keyboard(report);
                sent += 1;
            }
        }
        session.held = snapshot;
        drop(session);

        self.activity.touch();
        Ok(sent)
    }

    /// Encodes and enqueues one mouse event.
    pub fn handle_mouse(&self, event: MouseEvent) {
        self.activity.record_mouse(&event);
        let report = event.encode();
        trace!("mouse report {:02x?}", report.as_bytes());
        self.mouse.enqueue_report(report.into());
    }

    /// Types `text` on layout `lang`.  Returns the number of reports
    /// enqueued.
    ///
    /// Characters the layout cannot produce are skipped.  Between key
    /// transitions the call waits while the keyboard queue holds
    /// `typing_queue_limit` reports or more.
    ///
    /// # Errors
    ///
    /// - [`KeymapError::InvalidLanguage`] / [`KeymapError::LanguageNotFound`]
    ///   if the layout cannot be loaded; nothing is typed.
    /// - [`KeymapError::UnknownKey`] under the strict policy when the layout
    ///   names a key the keymap does not know.  Everything held is released
    ///   before returning.
    pub async fn type_text(&self, text: &str, lang: &str) -> Result<usize, InputError> {
        let strokes = self.strokes_for(text, lang)?;
        self.type_strokes(strokes, lang).await
    }

    /// Starts typing `text` on layout `lang` in a background task and
    /// returns the number of characters accepted.
    ///
    /// Pastes type one after another, never interleaved.  A paste that fails
    /// part-way logs the error; [`InputService::shutdown`] cancels pastes
    /// still running.
    ///
    /// # Errors
    ///
    /// [`KeymapError::InvalidLanguage`] / [`KeymapError::LanguageNotFound`]
    /// if the layout cannot be loaded; no task is started.
    pub fn spawn_typing(self: &Arc<Self>, text: &str, lang: &str) -> Result<usize, InputError> {
        let strokes = self.strokes_for(text, lang)?;
        let characters = text.chars().count();
        let service = Arc::clone(self);
        let lang = lang.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = service.type_strokes(strokes, &lang).await {
                warn!("paste on layout {lang} stopped: {e}");
            }
        });

        let mut tasks = self
            .typing_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
        debug!("queued paste of {characters} characters ({} pending)", tasks.len());
        Ok(characters)
    }

    fn strokes_for(&self, text: &str, lang: &str) -> Result<TypeText, InputError> {
        let symmap = self.keymaps.get(lang).map_err(|e| {
            error!("unsupported keyboard language {lang}: {e}");
            e
        })?;
        Ok(TypeText::new(text, symmap))
    }

    async fn type_strokes(&self, strokes: TypeText, lang: &str) -> Result<usize, InputError> {
        let _typing = self.typing.lock().await;
        let mut sent = 0;
        for (name, down) in strokes {
            self.wait_for_keyboard_queue().await;

            let key = match self.settings.unresolved_keys.apply(name) {
                Ok(KeyName::Known(key)) => key,
                Ok(KeyName::Unresolved(raw)) => {
                    info!("layout {lang} names unknown key {raw:?}, skipping");
                    continue;
                }
                Err(e) => {
                    warn!("aborting typing on layout {lang}: {e}");
                    if let Some(report) = self.session().state.release_all() {
                        self.send_keyboard(report);
                    }
                    return Err(e.into());
                }
            };

            let report = self.session().state.apply(KeyboardEvent::from_key(key, down));
            if let Some(report) = report {
                self.send_keyboard(report);
                sent += 1;
            }
            self.activity.touch();
        }

        debug!("typed {sent} reports on layout {lang}");
        Ok(sent)
    }

    async fn wait_for_keyboard_queue(&self) {
        while self.keyboard.pending_reports() >= self.settings.typing_queue_limit {
            tokio::time::sleep(self.settings.pace_interval).await;
        }
    }

    /// Presses a configured shortcut and releases it in reverse order.
    /// Returns the number of reports enqueued.
    ///
    /// # Errors
    ///
    /// - [`InputError::UnknownShortcut`] if no shortcut has that name.
    /// - [`KeymapError::UnknownKey`] if the shortcut names an unknown key;
    ///   nothing is pressed.
    pub fn press_shortcut(&self, name: &str) -> Result<usize, InputError> {
        let names = self
            .settings
            .shortcuts
            .get(name)
            .ok_or_else(|| InputError::UnknownShortcut(name.to_string()))?;
        let keys = names
            .iter()
            .map(|n| LogicalKey::from_name(n).ok_or_else(|| KeymapError::UnknownKey(n.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut session = self.session();
        let mut sent = 0;
        let transitions = keys
            .iter()
            .map(|&key| (key, true))
            .chain(keys.iter().rev().map(|&key| (key, false)));
        for (key, down) in transitions {
            if let Some(report) = session.state.apply(KeyboardEvent::from_key(key, down)) {
                self.send_keyboard(report);
                sent += 1;
            }
        }
        drop(session);

        info!("pressed shortcut {name}");
        self.activity.touch();
        Ok(sent)
    }

    pub fn status(&self) -> HidStatus {
        HidStatus {
            keyboard_online: self.keyboard.is_online(),
            mouse_online: self.mouse.is_online(),
            absolute_mode: self.activity.pointer().absolute_mode,
            jiggler_running: self.jiggler.is_running(),
        }
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.keymaps.supported_languages()
    }

    pub fn jiggler(&self) -> &Jiggler {
        &self.jiggler
    }

    /// Cancels running pastes, releases every key, gives the keyboard queue
    /// a moment to drain, then closes both devices.  A later report reopens
    /// them.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(
            &mut *self
                .typing_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.abort();
            // Resolves once the task has actually stopped.
            let _ = task.await;
        }

        {
            let mut session = self.session();
            if let Some(report) = session.state.release_all() {
                self.send_keyboard(report);
            }
            session.held.clear();
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_DRAIN_LIMIT;
        while self.keyboard.pending_reports() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(self.settings.pace_interval).await;
        }

        self.keyboard.close().await;
        self.mouse.close().await;
        info!("HID devices closed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
