//! Linux USB gadget HID character devices (`/dev/hidgN`).
//!
//! Devices are opened write-only and non-blocking: when the host is not
//! reading reports, a write fails with `EAGAIN` instead of stalling the drain
//! loop, and the device is reported offline.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{DeviceOpener, DeviceWriter, RawDescriptor};

/// Opens gadget device files.
#[derive(Debug, Default, Clone, Copy)]
pub struct GadgetOpener;

#[async_trait]
impl DeviceOpener for GadgetOpener {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn DeviceWriter>> {
        let mut options = OpenOptions::new();
        options.write(true);
        #[cfg(unix)]
        options.custom_flags(libc::O_NONBLOCK);

        let file = options.open(path).await?;
        Ok(Box::new(GadgetWriter { file }))
    }
}

struct GadgetWriter {
    file: File,
}

#[async_trait]
impl DeviceWriter for GadgetWriter {
    async fn write_report(&mut self, report: &[u8]) -> io::Result<()> {
        self.file.write_all(report).await?;
        // tokio buffers the write; flush surfaces the OS result.
        self.file.flush().await
    }

    fn descriptor(&self) -> RawDescriptor {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            self.file.as_raw_fd()
        }
        #[cfg(not(unix))]
        {
            -1
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
