use serde::{Deserialize, Serialize};

use crate::error::{SnapError, SnapResult};

/// Environment variable that overrides `SnapConfig::base_url`
pub const BASE_URL_ENV: &str = "VALHALLA_URL";

/// Valhalla endpoint and map-matching parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Valhalla costing model (`pedestrian`, `bicycle`, `auto`, ...)
    pub costing: String,
    pub shape_match: String,
    /// Expected GPS accuracy of the input, meters
    pub gps_accuracy: f64,
    pub break_distance: f64,
    pub interpolation_distance: f64,
    pub turn_penalty_factor: f64,
    pub sigma_z: f64,
    pub beta: f64,
    pub max_route_distance_factor: f64,
    pub max_route_time_factor: f64,
    pub units: String,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapConfig {
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_secs: 30,
            costing: "pedestrian".to_string(),
            shape_match: "map_snap".to_string(),
            gps_accuracy: 10.0,
            break_distance: 100.0,
            interpolation_distance: 1.0,
            turn_penalty_factor: 500.0,
            sigma_z: 4.07,
            beta: 3.0,
            max_route_distance_factor: 3.0,
            max_route_time_factor: 3.0,
            units: "kilometers".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Replace the base URL with `value` when it is set and non-blank
    pub fn apply_base_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
    }

    /// Apply `VALHALLA_URL` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_base_url_override(std::env::var(BASE_URL_ENV).ok());
    }

    pub fn validate(&self) -> SnapResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SnapError::InvalidConfig(format!(
                "base_url {:?} must start with http:// or https://",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SnapError::InvalidConfig("timeout_secs must be positive".to_string()));
        }
        if self.costing.trim().is_empty() {
            return Err(SnapError::InvalidConfig("costing must not be empty".to_string()));
        }
        let positive = [
            ("gps_accuracy", self.gps_accuracy),
            ("break_distance", self.break_distance),
            ("interpolation_distance", self.interpolation_distance),
            ("sigma_z", self.sigma_z),
            ("beta", self.beta),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SnapError::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "SnapConfig: {} costing={} timeout={}s gps_accuracy={}m",
            self.base_url, self.costing, self.timeout_secs, self.gps_accuracy
        )
    }
}
