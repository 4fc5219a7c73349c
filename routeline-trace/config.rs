use crate::builder::TracerBuilder;
use crate::error::{TraceError, TraceResult};
use crate::types::{ColorMetric, ReferenceColor};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete tracer configuration with all tunable parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TraceConfig {
    /// Color comparison
    pub metric: ColorMetric,
    pub tolerance: f32,
    pub reference_color: ReferenceColor,
    /// Neighborhood ring radius; 1 is the 8-connected neighborhood
    pub radius: u32,
    /// Walk guards
    pub max_steps: usize,
    pub history_window: usize,
    /// Cost weights
    pub turn_penalty: f32,
    pub gap_penalty: f32,
    /// Number of past steps averaged into the heading
    pub heading_span: usize,
    /// Seed tangent estimation
    pub tangent_radius: u32,
    pub min_elongation: f64,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceConfig {
    /// Create new configuration with default settings
    pub fn new() -> Self {
        Self {
            metric: ColorMetric::Euclidean,
            tolerance: 48.0,
            reference_color: ReferenceColor::Seed,
            radius: 1,
            max_steps: 50_000,
            history_window: 12,
            turn_penalty: 24.0,
            gap_penalty: 12.0,
            heading_span: 4,
            tangent_radius: 8,
            min_elongation: 1.5,
            name: None,
            description: None,
        }
    }

    /// Crisp, single-color lines such as screenshots of digital maps
    pub fn thin_line_preset() -> Self {
        Self {
            metric: ColorMetric::MaxChannel,
            tolerance: 20.0,
            reference_color: ReferenceColor::Seed,
            radius: 1,
            history_window: 8,
            turn_penalty: 16.0,
            gap_penalty: 12.0,
            heading_span: 3,
            tangent_radius: 6,
            name: Some("Thin line".to_string()),
            description: Some("Exact-color lines from screenshots, no gaps".to_string()),
            ..Self::new()
        }
    }

    /// Scanned or photographed sketches: drifting color, small gaps
    pub fn sketch_preset() -> Self {
        Self {
            metric: ColorMetric::Euclidean,
            tolerance: 70.0,
            reference_color: ReferenceColor::RunningAverage { window: 16 },
            radius: 2,
            history_window: 16,
            turn_penalty: 30.0,
            gap_penalty: 20.0,
            heading_span: 6,
            tangent_radius: 12,
            name: Some("Sketch".to_string()),
            description: Some("Anti-aliased or scanned strokes with color drift and gaps".to_string()),
            ..Self::new()
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Convert to TracerBuilder for further customization
    pub fn to_builder(self) -> TracerBuilder {
        TracerBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "TraceConfig: metric={:?}, tolerance={:.1}, reference={:?}, radius={}, max_steps={}, window={}, penalties=[turn:{:.1}, gap:{:.1}]",
            self.metric, self.tolerance, self.reference_color, self.radius, self.max_steps,
            self.history_window, self.turn_penalty, self.gap_penalty
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> TraceResult<()> {
        let max_distance = match self.metric {
            ColorMetric::Euclidean => 441.7,
            ColorMetric::MaxChannel => 255.0,
        };
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0 && self.tolerance <= max_distance) {
            return Err(TraceError::InvalidConfig(format!(
                "tolerance {} outside 0..={} for {:?}",
                self.tolerance, max_distance, self.metric
            )));
        }
        if self.radius == 0 || self.radius > 8 {
            return Err(TraceError::InvalidConfig(format!("radius {} outside 1..=8", self.radius)));
        }
        if self.max_steps == 0 {
            return Err(TraceError::InvalidConfig("max_steps must be positive".to_string()));
        }
        if self.history_window < 2 {
            return Err(TraceError::InvalidConfig(format!(
                "history_window {} too small (minimum 2)",
                self.history_window
            )));
        }
        if self.heading_span == 0 {
            return Err(TraceError::InvalidConfig("heading_span must be positive".to_string()));
        }
        if self.tangent_radius < 2 {
            return Err(TraceError::InvalidConfig(format!(
                "tangent_radius {} too small (minimum 2)",
                self.tangent_radius
            )));
        }
        if !(self.turn_penalty >= 0.0 && self.gap_penalty >= 0.0) {
            return Err(TraceError::InvalidConfig("penalties must be non-negative".to_string()));
        }
        if !(self.min_elongation >= 1.0) {
            return Err(TraceError::InvalidConfig(format!(
                "min_elongation {} must be at least 1.0",
                self.min_elongation
            )));
        }
        if let ReferenceColor::RunningAverage { window: 0 } = self.reference_color {
            return Err(TraceError::InvalidConfig("running average window must be positive".to_string()));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(TraceConfig::new().validate().is_ok());
        assert!(TraceConfig::thin_line_preset().validate().is_ok());
        assert!(TraceConfig::sketch_preset().validate().is_ok());
    }

    #[test]
    fn test_invalid_tolerance() {
        let mut cfg = TraceConfig::new();
        cfg.tolerance = -1.0;
        assert!(matches!(cfg.validate(), Err(TraceError::InvalidConfig(_))));

        cfg.metric = ColorMetric::MaxChannel;
        cfg.tolerance = 300.0;
        assert!(matches!(cfg.validate(), Err(TraceError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_radius_and_window() {
        let mut cfg = TraceConfig::new();
        cfg.radius = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TraceConfig::new();
        cfg.history_window = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = TraceConfig::new();
        cfg.reference_color = ReferenceColor::RunningAverage { window: 0 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_metric() {
        let summary = TraceConfig::thin_line_preset().summary();
        assert!(summary.contains("MaxChannel"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_round_trip() {
        let cfg = TraceConfig::sketch_preset();
        let text = cfg.to_toml().unwrap();
        let back = TraceConfig::from_toml(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg = TraceConfig::from_toml("tolerance = 30.0\nmetric = \"max_channel\"\n").unwrap();
        assert_eq!(cfg.tolerance, 30.0);
        assert_eq!(cfg.metric, ColorMetric::MaxChannel);
        assert_eq!(cfg.radius, TraceConfig::new().radius);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_invalid_json_rejected() {
        assert!(TraceConfig::from_json("{\"radius\": 0}").is_err());
    }
    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_files() {
        let dir = std::env::temp_dir().join(format!("routeline-trace-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let cfg = TraceConfig::thin_line_preset();
        cfg.save_toml(dir.join("trace.toml")).unwrap();
        cfg.save_json(dir.join("trace.json")).unwrap();
        assert_eq!(TraceConfig::load_toml(dir.join("trace.toml")).unwrap(), cfg);
        assert_eq!(TraceConfig::load_json(dir.join("trace.json")).unwrap(), cfg);

        std::fs::write(dir.join("bad.toml"), "radius = 0\n").unwrap();
        assert!(TraceConfig::load_toml(dir.join("bad.toml")).is_err());
        assert!(TraceConfig::load_toml(dir.join("missing.toml")).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
