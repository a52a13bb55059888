//! Tunable thresholds for the pass-through analysis.
//!
//! Every threshold has a default. A JSON file may override any subset of
//! them:
//! ```json
//! {
//!   "stability": { "baseToleranceSecs": 4.0 },
//!   "stops": { "passFraction": 0.25 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming a JSON config file.
pub const CONFIG_PATH_ENV: &str = "GLOSA_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub stability: StabilityConfig,
    pub prediction: PredictionConfig,
    pub stops: StopConfig,
    pub speed_patterns: SpeedPatternConfig,
    pub simulation: SimulationConfig,
}

/// Green-interval change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilityConfig {
    /// Added to the elapsed seconds between samples to form the change threshold.
    pub base_tolerance_secs: f64,
    /// Largest movement-event end-time drift still treated as the same timing.
    pub movement_timing_tolerance_secs: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            base_tolerance_secs: 3.0,
            movement_timing_tolerance_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictionConfig {
    /// How many trailing events are inspected for a green phase.
    pub recent_event_window: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            recent_event_window: 3,
        }
    }
}

/// Stop-location detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopConfig {
    /// Samples below this speed (km/h) count as stopped.
    pub speed_threshold_kph: f64,
    pub bucket_m: f64,
    pub min_passes: usize,
    /// Share of all pass-throughs that must stop in a bucket.
    pub pass_fraction: f64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            speed_threshold_kph: 2.0,
            bucket_m: 5.0,
            min_passes: 2,
            pass_fraction: 0.3,
        }
    }
}

impl StopConfig {
    /// Distinct pass-throughs a bucket needs before it is reported.
    pub fn required_passes(&self, total_pass_throughs: usize) -> f64 {
        (self.min_passes as f64).max(self.pass_fraction * total_pass_throughs as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeedPatternConfig {
    pub bucket_m: f64,
    pub min_samples: usize,
}

impl Default for SpeedPatternConfig {
    fn default() -> Self {
        Self {
            bucket_m: 10.0,
            min_samples: 2,
        }
    }
}

/// Advice-following travel simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// m/s²
    pub acceleration: f64,
    pub min_speed_kph: f64,
    pub max_speed_kph: f64,
    pub interval_m: f64,
    pub tolerance_secs: f64,
    /// Seconds after the simulated arrival inspected for a vehicle still waiting.
    pub waiting_window_secs: f64,
    /// Below this speed (km/h) the vehicle has not cleared the stop line yet.
    pub waiting_speed_kph: f64,
    /// Below this speed (km/h) the vehicle is standing despite a green.
    pub stopped_speed_kph: f64,
    /// Distance bounds of the missed-opportunity intervals.
    pub min_distance_m: f64,
    pub max_distance_m: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            acceleration: 1.3,
            min_speed_kph: 8.0,
            max_speed_kph: 50.0,
            interval_m: 10.0,
            tolerance_secs: 2.0,
            waiting_window_secs: 5.0,
            waiting_speed_kph: 10.0,
            stopped_speed_kph: 5.0,
            min_distance_m: 20.0,
            max_distance_m: 300.0,
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Uses `explicit` if given, else the file named by `GLOSA_CONFIG_PATH`,
    /// else the built-in defaults.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        match explicit.map(str::to_string).or(from_env) {
            Some(path) => {
                info!(path = %path, "Loading analysis config");
                Self::load(&path)
            }
            None => {
                debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }
}
