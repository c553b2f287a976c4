//! Configuration module for the Falcon client.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per concern,
//! `AppPaths` for the platform config directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, Engine, MetadataDefaults, PollingConfig, ServiceConfig};
