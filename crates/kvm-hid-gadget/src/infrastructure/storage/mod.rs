//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module handles:
//!
//! - Reading the TOML configuration file from the path given on the command
//!   line.
//! - Writing the jiggler settings back when they change at runtime.
//! - Providing defaults when the file does not exist yet (first boot).

pub mod config;
