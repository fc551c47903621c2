//! Configuration and shared error types for codestream.
//!
//! This crate provides the foundational pieces used across the workspace:
//!
//! - [`Config`] and its per-component sections
//! - [`ConfigError`] for configuration loading and validation
//!
//! # Crate Dependencies
//!
//! ```text
//! cs-cli ──► cs-server ──► cs-watcher ──► cs-core
//!                     └─────────────────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    Config, DEFAULT_PORT, MonitorConfig, ScaffoldConfig, ServerConfig, WatchConfig, home_dir,
};
pub use error::ConfigError;
