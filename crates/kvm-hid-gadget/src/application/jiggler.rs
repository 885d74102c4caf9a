//! Idle mouse jiggler.
//!
//! While enabled, a background task wakes once per interval.  If nobody has
//! touched the keyboard or mouse for at least that long, it sends two small
//! opposing pointer movements through the mouse sink, encoded in the mode the
//! session is currently using, and counts that as an interaction so it does
//! not fire again on the very next tick.
//!
//! Every start, stop or interval change is persisted through a
//! [`JigglerSettingsStore`] so the setting survives a restart.  The control
//! methods are async: they return once the store has finished writing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kvm_hid_core::{encode_absolute, encode_relative};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::activity::{Activity, PointerState};
use crate::application::ReportSink;

/// Relative movement of one jiggle step, in HID counts.
const RELATIVE_STEP: f64 = 10.0;

/// Absolute movement of one jiggle step, as a fraction of the screen.
const ABSOLUTE_STEP: f64 = 0.005;

/// Failure to persist jiggler settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not save jiggler settings: {0}")]
    Save(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Persists the jiggler's enabled flag and interval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JigglerSettingsStore: Send + Sync {
    async fn persist(&self, enabled: bool, interval_secs: u64) -> Result<(), SettingsError>;
}

struct State {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

/// The jiggler use case.  See the module docs.
pub struct Jiggler {
    mouse: Arc<dyn ReportSink>,
    activity: Arc<Activity>,
    settings: Arc<dyn JigglerSettingsStore>,
    state: Mutex<State>,
}

impl Jiggler {
    /// Creates a stopped jiggler.
    pub fn new(
        mouse: Arc<dyn ReportSink>,
        activity: Arc<Activity>,
        settings: Arc<dyn JigglerSettingsStore>,
        interval: Duration,
    ) -> Self {
        Self {
            mouse,
            activity,
            settings,
            state: Mutex::new(State {
                interval: interval.max(Duration::from_secs(1)),
                task: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the jiggler (no-op if running) and persists `enabled = true`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) {
        let interval = {
            let mut state = self.lock();
            if !is_running(&state) {
                state.task = Some(self.spawn(state.interval));
                info!("mouse jiggler started (interval {:?})", state.interval);
            }
            state.interval
        };
        self.persist(true, interval).await;
    }

    /// Stops the jiggler and persists `enabled = false`.
    pub async fn stop(&self) {
        let interval = {
            let mut state = self.lock();
            if let Some(task) = state.task.take() {
                task.abort();
                info!("mouse jiggler stopped");
            }
            state.interval
        };
        self.persist(false, interval).await;
    }

    /// Changes the idle interval.
    ///
    /// `0` stops the jiggler.  Any other value takes effect immediately and
    /// starts the jiggler if it was stopped.
    pub async fn set_interval(&self, secs: u64) {
        if secs == 0 {
            self.stop().await;
            return;
        }
        let interval = Duration::from_secs(secs);
        {
            let mut state = self.lock();
            state.interval = interval;
            if let Some(task) = state.task.take() {
                task.abort();
            }
            state.task = Some(self.spawn(interval));
            info!("mouse jiggler interval set to {secs}s");
        }
        self.persist(true, interval).await;
    }

    pub fn is_running(&self) -> bool {
        is_running(&self.lock())
    }

    pub fn interval(&self) -> Duration {
        self.lock().interval
    }

    async fn persist(&self, enabled: bool, interval: Duration) {
        if let Err(e) = self.settings.persist(enabled, interval.as_secs()).await {
            warn!("{e}");
        }
    }

    fn spawn(&self, period: Duration) -> JoinHandle<()> {
        let mouse = Arc::clone(&self.mouse);
        let activity = Arc::clone(&self.activity);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                if activity.idle_for() < period {
                    continue;
                }
                let pointer = activity.pointer();
                debug!("idle for {:?}, jiggling pointer", activity.idle_for());
                for report in jiggle_reports(&pointer) {
                    mouse.enqueue_report(report);
                }
                activity.touch();
            }
        })
    }
}

impl Drop for Jiggler {
    fn drop(&mut self) {
        if let Some(task) = self.lock().task.take() {
            task.abort();
        }
    }
}

fn is_running(state: &State) -> bool {
    state.task.as_ref().is_some_and(|t| !t.is_finished())
}

/// Two opposing pointer movements that leave the pointer where it was.
fn jiggle_reports(pointer: &PointerState) -> [Vec<u8>; 2] {
    let buttons = pointer.buttons;
    if pointer.absolute_mode {
        let dx = if pointer.x + ABSOLUTE_STEP > 1.0 {
            -ABSOLUTE_STEP
        } else {
            ABSOLUTE_STEP
        };
        [
            encode_absolute(buttons, pointer.x + dx, pointer.y, 0, 0).to_vec(),
            encode_absolute(buttons, pointer.x, pointer.y, 0, 0).to_vec(),
        ]
    } else {
        [
            encode_relative(buttons, RELATIVE_STEP, RELATIVE_STEP, 0, 0, 1.0).to_vec(),
            encode_relative(buttons, -RELATIVE_STEP, -RELATIVE_STEP, 0, 0, 1.0).to_vec(),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
