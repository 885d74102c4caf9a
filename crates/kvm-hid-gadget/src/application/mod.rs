//! Application layer use cases for the HID service.
//!
//! # What use cases does the service have?
//!
//! - **`input_service`** – Turns transport input (key snapshots, mouse events,
//!   pasted text, named shortcuts) into HID reports and hands them to the
//!   keyboard and mouse [`ReportSink`]s.
//!
//! - **`jiggler`** – Nudges the pointer when nobody has touched the keyboard
//!   or mouse for a while, so the controlled machine does not lock its screen.
//!
//! - **`activity`** – Session state shared by both: the time of the last
//!   genuine interaction and the last known pointer state.
//!
//! The layer depends only on the [`ReportSink`] trait; the gadget devices in
//! the infrastructure layer implement it, and tests substitute recorders.

pub mod activity;
pub mod input_service;
pub mod jiggler;

use async_trait::async_trait;

/// Destination for encoded HID reports (one per gadget function).
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Queues a report without blocking.
    fn enqueue_report(&self, report: Vec<u8>);

    /// Reports queued but not yet written.
    fn pending_reports(&self) -> usize;

    /// `true` if the last delivery succeeded.
    fn is_online(&self) -> bool;

    /// Stops delivery after any in-flight report; later reports reopen it.
    async fn close(&self);
}
