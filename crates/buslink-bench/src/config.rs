//! TOML configuration for the bench application.
//!
//! The bench looks for `buslink.toml` in the working directory.  A missing
//! file is not an error — every field has a default — but a malformed one
//! is, so a typo never silently reverts the bench to defaults.
//!
//! ```toml
//! [bench]
//! log_level = "debug"
//!
//! [bus]
//! tick_budget = 40
//!
//! [motor]
//! dt = 0.0005
//! ```

use std::path::{Path, PathBuf};

use buslink_core::bus::DEFAULT_TICK_BUDGET;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "buslink.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level bench configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub bench: BenchConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub motor: MotorConfig,
}

/// General bench behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` in the environment takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Clocked-bus settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusConfig {
    /// Clock ticks a Wishbone handshake phase may take before it times out.
    #[serde(default = "default_tick_budget")]
    pub tick_budget: u32,
}

/// DC motor model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorConfig {
    /// Integration step of the motor model in seconds.
    #[serde(default = "default_dt")]
    pub dt: f32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_budget() -> u32 {
    DEFAULT_TICK_BUDGET
}
fn default_dt() -> f32 {
    0.001
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            tick_budget: default_tick_budget(),
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self { dt: default_dt() }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads [`AppConfig`] from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
