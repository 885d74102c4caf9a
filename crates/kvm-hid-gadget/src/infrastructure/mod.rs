//! Infrastructure layer for the HID service.
//!
//! Contains the OS-facing adapters: gadget device files, the configuration
//! file, and the line-based ingress used by the web transport.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `kvm_hid_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`device`** – [`device::HidDevice`], the queued single-flight writer for
//!   one gadget function, plus the real `/dev/hidgN` opener and a recording
//!   mock for tests.
//!
//! - **`storage`** – TOML configuration: loading at startup and persisting
//!   jiggler settings at runtime.
//!
//! - **`ingress`** – newline-delimited JSON requests in, JSON replies out.

pub mod device;
pub mod ingress;
pub mod storage;
