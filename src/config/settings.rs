//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to tasks.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Which model family the remote service uses for transcription and scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Engine {
    /// Wire name sent in the job-creation request.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Gemini => "gemini",
            Engine::OpenAi => "openai",
        }
    }
}


// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote processing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the service, without the `/api` suffix
    /// (e.g. `http://localhost:8000`).
    pub base_url: String,
    /// Maximum seconds to wait for any single HTTP request.
    pub timeout_secs: u64,
    /// Engine requested for new jobs.
    pub engine: Engine,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 30,
            engine: Engine::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PollingConfig
// ---------------------------------------------------------------------------

/// Status polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Milliseconds between two status requests for the active job.
    pub interval_ms: u64,
}

impl PollingConfig {
    /// The poll interval as a [`Duration`], never zero.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 2_000 }
    }
}

// ---------------------------------------------------------------------------
// MetadataDefaults
// ---------------------------------------------------------------------------

/// Values used to pre-fill the session metadata when the CLI does not
/// receive them explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataDefaults {
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub agent_name: Option<String>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use falcon_client::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let mut config = AppConfig::load().unwrap();
///
/// config.polling.interval_ms = 500;
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote service connection settings.
    pub service: ServiceConfig,
    /// Status polling settings.
    pub polling: PollingConfig,
    /// Metadata pre-fill values.
    #[serde(default)]
    pub defaults: MetadataDefaults,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Save to the platform-appropriate `settings.toml`.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
    }

    /// Returns `true` when no per-user `settings.toml` exists yet.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
