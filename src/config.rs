//! Planner configuration
//!
//! Parameters are read once at startup from a TOML file and may be
//! overridden with numeric parameters coming from the transport layer.

use crate::common::kmh_to_mps;
use crate::error::PlannerError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::{env, fs};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "WAYPOINT_UPDATER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./waypoint_updater.toml";

/// Waypoint updater configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Number of waypoints published per tick
    pub lookahead_wps: usize,
    /// Publish rate (Hz)
    pub rate_hz: f64,
    /// Speed limit in km/h, as provided by the route loader
    pub velocity_kmh: f64,
    /// Comfortable deceleration used when braking for a stop line (m/s^2)
    pub decel_limit_mps2: f64,
    /// How far past the window end a stop line still triggers braking (m)
    pub braking_horizon_m: f64,
    /// Points scanned on each side of the previous localization result
    pub search_window: usize,
    /// Local matches farther than this force a full route scan (m)
    pub relocalization_distance_m: f64,
    /// Wrap windows around the end of the route
    pub circular_route: bool,
    pub frame_id: String,
    pub pose_topic: String,
    pub route_topic: String,
    pub traffic_topic: String,
    pub output_topic: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            lookahead_wps: 50,
            rate_hz: 5.0,
            velocity_kmh: 40.0,
            decel_limit_mps2: 1.0,
            braking_horizon_m: 50.0,
            search_window: 25,
            relocalization_distance_m: 5.0,
            circular_route: false,
            frame_id: "/world".to_string(),
            pose_topic: "/current_pose".to_string(),
            route_topic: "/base_waypoints".to_string(),
            traffic_topic: "/traffic_waypoint".to_string(),
            output_topic: "final_waypoints".to_string(),
        }
    }
}

impl PlannerConfig {
    /// Load the configuration file named by `WAYPOINT_UPDATER_CONFIG`,
    /// falling back to defaults if it does not exist
    pub fn load() -> Result<Self, PlannerError> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_or_default(path)
    }

    /// Read `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(PlannerConfig::default());
        }
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PlannerError> {
        let config: PlannerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Speed limit normalized to m/s
    pub fn speed_limit_mps(&self) -> f64 {
        kmh_to_mps(self.velocity_kmh)
    }

    /// Apply numeric parameter overrides.
    ///
    /// Either every override is applied and the result validates, or the
    /// configuration is left untouched.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), PlannerError> {
        let mut updated = self.clone();

        if let Some(&lookahead) = params.get("lookahead_wps") {
            if !(lookahead >= 1.0) {
                return Err(invalid("Lookahead must be at least one waypoint"));
            }
            updated.lookahead_wps = lookahead as usize;
        }

        if let Some(&rate) = params.get("rate_hz") {
            if !(rate > 0.0) {
                return Err(invalid("Rate must be positive"));
            }
            updated.rate_hz = rate;
        }

        if let Some(&velocity) = params.get("velocity_kmh") {
            if !(velocity >= 0.0) {
                return Err(invalid("Velocity must be non-negative"));
            }
            updated.velocity_kmh = velocity;
        }

        if let Some(&decel) = params.get("decel_limit_mps2") {
            if !(decel > 0.0) {
                return Err(invalid("Deceleration limit must be positive"));
            }
            updated.decel_limit_mps2 = decel;
        }

        if let Some(&horizon) = params.get("braking_horizon_m") {
            if !(horizon >= 0.0) {
                return Err(invalid("Braking horizon must be non-negative"));
            }
            updated.braking_horizon_m = horizon;
        }

        if let Some(&window) = params.get("search_window") {
            if !(window >= 1.0) {
                return Err(invalid("Search window must be at least one point"));
            }
            updated.search_window = window as usize;
        }

        if let Some(&distance) = params.get("relocalization_distance_m") {
            if !(distance > 0.0) {
                return Err(invalid("Relocalization distance must be positive"));
            }
            updated.relocalization_distance_m = distance;
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check that every parameter is usable
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.lookahead_wps == 0 {
            return Err(invalid("lookahead_wps must be at least 1"));
        }
        if !(self.rate_hz > 0.0) {
            return Err(invalid("rate_hz must be positive"));
        }
        if !(self.velocity_kmh >= 0.0) {
            return Err(invalid("velocity_kmh must be non-negative"));
        }
        if !(self.decel_limit_mps2 > 0.0) {
            return Err(invalid("decel_limit_mps2 must be positive"));
        }
        if !(self.braking_horizon_m >= 0.0) {
            return Err(invalid("braking_horizon_m must be non-negative"));
        }
        if self.search_window == 0 {
            return Err(invalid("search_window must be at least 1"));
        }
        if !(self.relocalization_distance_m > 0.0) {
            return Err(invalid("relocalization_distance_m must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> PlannerError {
    PlannerError::InvalidConfig(msg.to_string())
}
