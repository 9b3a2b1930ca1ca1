//! Configuration loading and typed config structures for Craftzone.
//!
//! The canonical configuration lives in `craftzone-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, a loader,
//! and [`TrackerConfig::validated`], which clamps out-of-range values with a
//! warning instead of rejecting them.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Smallest scan distance the tracker will accept, in meters.
pub const MIN_BASE_DISTANCE_METERS: f32 = 3.0;

/// Highest host tick rate the tracker will accept.
pub const MAX_TARGET_FRAME_RATE: u32 = 1000;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `craftzone-config.yaml`. Every field has a
/// default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CraftzoneConfig {
    /// Membership tracking and pass scheduling.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulated host parameters (engine binary only).
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl CraftzoneConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// Tracker options: scan cadence, scan distance, and notices.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerConfig {
    /// Seconds between the starts of two scan passes. Must be positive.
    #[serde(default = "default_update_interval_seconds")]
    pub update_interval_seconds: f64,

    /// How far from a zone's structures an agent still counts as inside it.
    #[serde(default = "default_base_distance_meters")]
    pub base_distance_meters: f32,

    /// Tell a fixture's owner, once per session, that its range now covers
    /// the whole zone.
    #[serde(default = "default_true")]
    pub notify_on_build: bool,

    /// Tell an agent when its queued crafts are cancelled by a level drop.
    #[serde(default = "default_true")]
    pub notify_on_craft_cancel: bool,

    /// Host ticks per second; used to pace passes.
    #[serde(default = "default_target_frame_rate")]
    pub target_frame_rate: u32,

    /// Headroom multiplier applied to per-tick pass capacity, in `(0, 1]`.
    #[serde(default = "default_pass_safety_factor")]
    pub pass_safety_factor: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            update_interval_seconds: default_update_interval_seconds(),
            base_distance_meters: default_base_distance_meters(),
            notify_on_build: true,
            notify_on_craft_cancel: true,
            target_frame_rate: default_target_frame_rate(),
            pass_safety_factor: default_pass_safety_factor(),
        }
    }
}

impl TrackerConfig {
    /// Clamp every option into its sane range, logging a warning for each
    /// value that had to change. Never fails.
    #[must_use]
    pub fn validated(mut self) -> Self {
        if !(self.update_interval_seconds.is_finite() && self.update_interval_seconds > 0.0) {
            warn!(
                supplied = self.update_interval_seconds,
                using = default_update_interval_seconds(),
                "update_interval_seconds must be positive, using default"
            );
            self.update_interval_seconds = default_update_interval_seconds();
        }

        if self.base_distance_meters.is_nan() || self.base_distance_meters < MIN_BASE_DISTANCE_METERS
        {
            warn!(
                supplied = self.base_distance_meters,
                minimum = MIN_BASE_DISTANCE_METERS,
                "base_distance_meters below minimum, clamping"
            );
            self.base_distance_meters = MIN_BASE_DISTANCE_METERS;
        }

        if self.target_frame_rate == 0 {
            warn!(
                using = default_target_frame_rate(),
                "target_frame_rate must be at least 1, using default"
            );
            self.target_frame_rate = default_target_frame_rate();
        }

        if self.target_frame_rate > MAX_TARGET_FRAME_RATE {
            warn!(
                supplied = self.target_frame_rate,
                maximum = MAX_TARGET_FRAME_RATE,
                "target_frame_rate above maximum, clamping"
            );
            self.target_frame_rate = MAX_TARGET_FRAME_RATE;
        }

        if !(self.pass_safety_factor > 0.0 && self.pass_safety_factor <= 1.0) {
            warn!(
                supplied = self.pass_safety_factor,
                using = default_pass_safety_factor(),
                "pass_safety_factor must be in (0, 1], using default"
            );
            self.pass_safety_factor = default_pass_safety_factor();
        }

        self
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Parameters for the simulated host run by the engine binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Stop after this many host ticks (0 = run until interrupted).
    #[serde(default)]
    pub max_ticks: u64,

    /// Random seed for agent placement and movement.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of agents to connect at startup.
    #[serde(default = "default_agent_count")]
    pub agent_count: u32,

    /// Maximum distance an agent wanders per host tick.
    #[serde(default = "default_wander_step_meters")]
    pub wander_step_meters: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_ticks: 0,
            seed: default_seed(),
            agent_count: default_agent_count(),
            wander_step_meters: default_wander_step_meters(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_update_interval_seconds() -> f64 {
    3.0
}

const fn default_base_distance_meters() -> f32 {
    MIN_BASE_DISTANCE_METERS
}

const fn default_target_frame_rate() -> u32 {
    60
}

const fn default_pass_safety_factor() -> f64 {
    0.9
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_agent_count() -> u32 {
    24
}

const fn default_wander_step_meters() -> f32 {
    0.5
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CraftzoneConfig::default();
        assert_eq!(config.tracker.update_interval_seconds, 3.0);
        assert_eq!(config.tracker.base_distance_meters, MIN_BASE_DISTANCE_METERS);
        assert!(config.tracker.notify_on_build);
        assert!(config.tracker.notify_on_craft_cancel);
        assert_eq!(config.tracker.target_frame_rate, 60);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.tracker.clone().validated(), config.tracker);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
tracker:
  update_interval_seconds: 1.5
  base_distance_meters: 8.0
  notify_on_build: false
  notify_on_craft_cancel: true
  target_frame_rate: 30
  pass_safety_factor: 0.75

logging:
  level: "debug"

simulation:
  max_ticks: 600
  seed: 7
  agent_count: 5
  wander_step_meters: 1.0
"#;
        let config = CraftzoneConfig::parse(yaml).unwrap();
        assert_eq!(config.tracker.update_interval_seconds, 1.5);
        assert_eq!(config.tracker.base_distance_meters, 8.0);
        assert!(!config.tracker.notify_on_build);
        assert_eq!(config.tracker.target_frame_rate, 30);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.simulation.max_ticks, 600);
        assert_eq!(config.simulation.agent_count, 5);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = CraftzoneConfig::parse("tracker:\n  notify_on_build: false\n").unwrap();
        assert!(!config.tracker.notify_on_build);
        assert_eq!(config.tracker.update_interval_seconds, 3.0);
        assert_eq!(config.simulation.seed, 42);
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(CraftzoneConfig::parse("").unwrap(), CraftzoneConfig::default());
    }

    #[test]
    fn short_distance_is_clamped_to_floor() {
        let cfg = TrackerConfig {
            base_distance_meters: 1.0,
            ..TrackerConfig::default()
        }
        .validated();
        assert_eq!(cfg.base_distance_meters, MIN_BASE_DISTANCE_METERS);

        let cfg = TrackerConfig {
            base_distance_meters: 12.0,
            ..TrackerConfig::default()
        }
        .validated();
        assert_eq!(cfg.base_distance_meters, 12.0);
    }

    #[test]
    fn nonsense_values_fall_back_to_defaults() {
        let cfg = TrackerConfig {
            update_interval_seconds: -2.0,
            target_frame_rate: 0,
            pass_safety_factor: 1.7,
            ..TrackerConfig::default()
        }
        .validated();
        assert_eq!(cfg.update_interval_seconds, 3.0);
        assert_eq!(cfg.target_frame_rate, 60);
        assert_eq!(cfg.pass_safety_factor, 0.9);
    }

    #[test]
    fn huge_frame_rate_is_clamped_to_maximum() {
        let cfg = TrackerConfig {
            target_frame_rate: u32::MAX,
            ..TrackerConfig::default()
        }
        .validated();
        assert_eq!(cfg.target_frame_rate, MAX_TARGET_FRAME_RATE);

        let at_limit = TrackerConfig {
            target_frame_rate: MAX_TARGET_FRAME_RATE,
            ..TrackerConfig::default()
        };
        assert_eq!(at_limit.clone().validated(), at_limit);
    }
}
