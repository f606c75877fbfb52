//! Defines all configuration structures for the Taskflow scheduler and its drivers.
//!
//! These structs are deserialized with `serde` through the `config` crate, so the tick
//! cadence, the event channel size and the set of resources can be declared in a TOML
//! file and overridden from `TASKFLOW_*` environment variables.

use crate::error::TaskflowError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `TASKFLOW_EVENT_CAPACITY=128`.
pub const ENV_PREFIX: &str = "TASKFLOW";

/// The top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskflowConfig {
    /// How often a real-time driver ticks the scheduler.
    #[serde(default = "default_resolution")]
    pub resolution: ClockResolution,

    /// Capacity of the scheduler's broadcast event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Resources to create up front, in order.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// Defines the operational speed of the tick driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// ~60 ticks per second.
    High,
    /// 50 ticks per second, the usual period of a robot control loop.
    Control,
    /// ~30 ticks per second.
    Medium,
    /// 1 tick per second. Handy for watching a schedule unfold by eye.
    Low,
    /// A user-defined speed in ticks per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    /// The time between two ticks at this resolution.
    pub fn tick_period(&self) -> Duration {
        match self {
            ClockResolution::High => Duration::from_micros(16_667),
            ClockResolution::Control => Duration::from_millis(20),
            ClockResolution::Medium => Duration::from_micros(33_333),
            ClockResolution::Low => Duration::from_secs(1),
            ClockResolution::Custom { ticks_per_second } => {
                Duration::from_secs(1) / (*ticks_per_second).clamp(1, u32::MAX as u64) as u32
            }
        }
    }
}

/// A resource declared in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Human-readable name, used in logs and by the shell.
    pub name: String,
}

impl TaskflowConfig {
    /// Loads the configuration from an optional TOML file layered with environment
    /// overrides. A missing file is not an error; the defaults apply.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaskflowError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parses a configuration from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, TaskflowError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

// --- Default value functions for serde ---

fn default_resolution() -> ClockResolution {
    ClockResolution::Control
}

fn default_event_capacity() -> usize {
    64
}

impl Default for TaskflowConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            event_capacity: default_event_capacity(),
            resources: Vec::new(),
        }
    }
}
