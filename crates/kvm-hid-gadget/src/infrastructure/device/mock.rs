//! In-memory gadget device for tests.
//!
//! # Why a mock device?
//!
//! The real `/dev/hidgN` files only exist on a board with the USB gadget
//! configured and a host attached.  `MockGadget` implements the same
//! [`DeviceOpener`] seam but records every open and every written report in
//! memory, so tests can assert exactly what the host would have received.
//!
//! # Usage in tests
//!
//! ```ignore
//! let mock = Arc::new(MockGadget::new());
//! let device = HidDevice::new("keyboard", "/dev/hidg0", mock.clone(), DeviceOptions::default());
//!
//! device.enqueue(vec![0x02, 0, 0x04, 0, 0, 0, 0, 0]);
//! device.drain_one_if_idle().await;
//!
//! assert_eq!(mock.writes().len(), 1);
//! ```
//!
//! # Failure switches
//!
//! `set_fail_open(true)` / `set_fail_writes(true)` make the next opens or
//! writes fail; `set_write_delay` makes writes take a while so in-flight
//! behaviour can be observed with paused tokio time.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{DeviceOpener, DeviceWriter, RawDescriptor};

#[derive(Default)]
struct MockState {
    opens: Mutex<Vec<PathBuf>>,
    writes: Mutex<Vec<Vec<u8>>>,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    next_fd: AtomicUsize,
}

/// A recording [`DeviceOpener`].  Cheap to clone; clones share records.
#[derive(Clone, Default)]
pub struct MockGadget {
    state: Arc<MockState>,
}

impl MockGadget {
    /// Creates a mock with empty records and every failure switch off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state.opens.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Paths opened so far, in order.
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.state.opens.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every report written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes each subsequent write sleep for `delay` before completing.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.state.write_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }
}

#[async_trait]
impl DeviceOpener for MockGadget {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn DeviceWriter>> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "mock open failure"));
        }
        self.state.opens.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_path_buf());
        let fd = 100 + self.state.next_fd.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockWriter {
            state: Arc::clone(&self.state),
            fd: fd as RawDescriptor,
        }))
    }
}

struct MockWriter {
    state: Arc<MockState>,
    fd: RawDescriptor,
}

#[async_trait]
impl DeviceWriter for MockWriter {
    async fn write_report(&mut self, report: &[u8]) -> io::Result<()> {
        let delay = *self.state.write_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "mock write failure"));
        }
        self.state.writes.lock().unwrap_or_else(PoisonError::into_inner).push(report.to_vec());
        Ok(())
    }

    fn descriptor(&self) -> RawDescriptor {
        self.fd
    }
}
