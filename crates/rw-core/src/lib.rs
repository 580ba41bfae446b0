//! Core configuration types and errors for the rwatch workspace.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`WatchConfig`] - recursive watcher settings (buffering, walk exclusions)
//! - [`Config`] - root configuration, loadable from a JSON file
//! - [`ConfigError`] - configuration loading and validation failures

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{Config, WatchConfig};
pub use error::ConfigError;
