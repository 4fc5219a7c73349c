use routeline_core::default_threads;
use routeline_georef::SimilarityMode;
use routeline_snap::SnapConfig;
use routeline_trace::TraceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{RouteError, RouteResult};

/// HTTP API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest accepted request body (image uploads), bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:5131".to_string(), max_upload_bytes: 32 * 1024 * 1024 }
    }
}

/// Steps between tracing and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference points a session collects before solving (2 = similarity, 3 = affine, more = least squares)
    pub reference_points: usize,
    pub similarity_mode: SimilarityMode,
    /// Douglas-Peucker tolerance in pixels, 0 disables
    pub simplify_epsilon: f64,
    pub snap_radius_m: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_points: 3,
            similarity_mode: SimilarityMode::Uniform,
            simplify_epsilon: 0.0,
            snap_radius_m: 100.0,
        }
    }
}

/// Application configuration, read from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub threads: usize,
    pub trace: TraceConfig,
    pub snap: SnapConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            threads: default_threads(),
            trace: TraceConfig::new(),
            snap: SnapConfig::new(),
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Defaults or the TOML file at `path`, then `VALHALLA_URL`, then validation
    pub fn load(path: Option<&Path>) -> RouteResult<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)?;
                Self::parse_toml(&text)?
            }
            None => Self::new(),
        };
        config.snap.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> RouteResult<Self> {
        let config = Self::parse_toml(text)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_toml(text: &str) -> RouteResult<Self> {
        toml::from_str(text).map_err(|e| RouteError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> RouteResult<String> {
        toml::to_string_pretty(self).map_err(|e| RouteError::Config(e.to_string()))
    }

    pub fn validate(&self) -> RouteResult<()> {
        self.trace.validate()?;
        self.snap.validate().map_err(RouteError::SnapConfig)?;
        if self.threads == 0 {
            return Err(RouteError::Config("threads must be positive".to_string()));
        }
        if self.pipeline.reference_points < 2 {
            return Err(RouteError::Config(format!(
                "reference_points {} too small (minimum 2)",
                self.pipeline.reference_points
            )));
        }
        if !(self.pipeline.simplify_epsilon.is_finite() && self.pipeline.simplify_epsilon >= 0.0) {
            return Err(RouteError::Config("simplify_epsilon must be non-negative".to_string()));
        }
        if !(self.pipeline.snap_radius_m.is_finite() && self.pipeline.snap_radius_m > 0.0) {
            return Err(RouteError::Config("snap_radius_m must be positive".to_string()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(RouteError::Config("max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "threads={} references={} ({:?}) simplify={} snap_radius={}m\n{}\n{}",
            self.threads,
            self.pipeline.reference_points,
            self.pipeline.similarity_mode,
            self.pipeline.simplify_epsilon,
            self.pipeline.snap_radius_m,
            self.trace.summary(),
            self.snap.summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routeline_snap::SnapError;
    use routeline_trace::ColorMetric;

    #[test]
    fn test_default_round_trip() {
        let config = AppConfig::new();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[pipeline]"));
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let text = r#"
            threads = 2

            [trace]
            metric = "max_channel"
            tolerance = 25.0

            [pipeline]
            reference_points = 2
            similarity_mode = "axis_aligned"

            [snap]
            costing = "bicycle"
        "#;
        let config = AppConfig::from_toml(text).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.trace.metric, ColorMetric::MaxChannel);
        assert_eq!(config.trace.radius, TraceConfig::new().radius);
        assert_eq!(config.pipeline.similarity_mode, SimilarityMode::AxisAligned);
        assert_eq!(config.snap.costing, "bicycle");
        assert_eq!(config.server.bind, "127.0.0.1:5131");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AppConfig::from_toml("[pipeline]\nreference_points = 1\n"),
            Err(RouteError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[trace]\nradius = 0\n"),
            Err(RouteError::Trace(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[snap]\nbase_url = \"ftp://x\"\n"),
            Err(RouteError::SnapConfig(SnapError::InvalidConfig(_)))
        ));
        assert!(matches!(AppConfig::from_toml("threads = \"many\""), Err(RouteError::Config(_))));
    }

    #[test]
    fn test_snap_config_error_keeps_source() {
        let err = AppConfig::from_toml("[snap]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, RouteError::SnapConfig(SnapError::InvalidConfig(_))));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("timeout_secs"));
        assert!(!err.is_input_error());
    }
}
