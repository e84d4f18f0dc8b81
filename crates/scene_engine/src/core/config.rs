//! # Engine Configuration
//!
//! Settings for the scene engine and for scene render loops. Both types are
//! serde-serializable and implement [`Config`], so they can live in TOML or
//! RON files next to the application.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Frame rate used by render loops that do not ask for one
pub const DEFAULT_FPS: f64 = 10.0;

/// # Engine Configuration
///
/// Core engine behavior: logging, loop defaults and process bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level for the engine
    pub log_level: String,
    /// Frame rate used by `start` when the caller gives none
    pub default_fps: f64,
    /// Processes older than this are killed at the start of the next pass
    pub process_timeout_ms: Option<u64>,
    /// Whether error events are also written to the log
    pub log_errors: bool,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            default_fps: DEFAULT_FPS,
            process_timeout_ms: None,
            log_errors: true,
        }
    }

    /// Set log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the default render loop frame rate
    #[must_use]
    pub const fn with_default_fps(mut self, fps: f64) -> Self {
        self.default_fps = fps;
        self
    }

    /// Kill processes that outlive the given timeout
    #[must_use]
    pub const fn with_process_timeout(mut self, timeout_ms: u64) -> Self {
        self.process_timeout_ms = Some(timeout_ms);
        self
    }

    /// Enable or disable logging of error events
    #[must_use]
    pub const fn with_error_logging(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!("Unknown log level: {}", self.log_level)));
        }
        RenderLoopConfig::new(self.default_fps).validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}

/// # Render Loop Configuration
///
/// Timing for a scene started with `Scene::start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLoopConfig {
    /// Target frames per second
    pub fps: f64,
}

impl RenderLoopConfig {
    /// Create a loop configuration for the given frame rate
    pub const fn new(fps: f64) -> Self {
        Self { fps }
    }

    /// Time between ticks, `1000 / fps` milliseconds
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::Invalid(format!("fps must be positive, got {}", self.fps)));
        }
        Ok(())
    }
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

impl Config for RenderLoopConfig {}
