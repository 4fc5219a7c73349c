use crate::config::TraceConfig;
use crate::error::TraceResult;
use crate::tracer::PathTracer;
use crate::types::{ColorMetric, ReferenceColor};

/// Fluent builder for a `PathTracer`
#[derive(Debug, Clone)]
pub struct TracerBuilder {
    config: TraceConfig,
}

impl Default for TracerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TracerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self { config: TraceConfig::new() }
    }

    /// Set the color metric
    pub fn metric(mut self, metric: ColorMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the maximum color distance a neighbor may have
    pub fn tolerance(mut self, tolerance: f32) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    /// Compare against the seed color
    pub fn seed_color(mut self) -> Self {
        self.config.reference_color = ReferenceColor::Seed;
        self
    }

    /// Compare against a running average of the last `window` visited pixels
    pub fn running_average(mut self, window: usize) -> Self {
        self.config.reference_color = ReferenceColor::RunningAverage { window };
        self
    }

    /// Set the neighborhood radius (1 = 8-connected)
    pub fn radius(mut self, radius: u32) -> Self {
        self.config.radius = radius;
        self
    }

    /// Set the step limit per direction
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    /// Set the trailing window used against oscillation
    pub fn history_window(mut self, window: usize) -> Self {
        self.config.history_window = window;
        self
    }

    /// Set the cost of turning away from the current heading
    pub fn turn_penalty(mut self, penalty: f32) -> Self {
        self.config.turn_penalty = penalty;
        self
    }

    /// Set the cost per extra pixel when jumping a gap
    pub fn gap_penalty(mut self, penalty: f32) -> Self {
        self.config.gap_penalty = penalty;
        self
    }

    /// Set how many past steps are averaged into the heading
    pub fn heading_span(mut self, span: usize) -> Self {
        self.config.heading_span = span;
        self
    }

    /// Set the window radius used to estimate the line direction at the seed
    pub fn tangent_radius(mut self, radius: u32) -> Self {
        self.config.tangent_radius = radius;
        self
    }

    /// Apply the thin line preset
    pub fn preset_thin_line(mut self) -> Self {
        self.config = TraceConfig::thin_line_preset();
        self
    }

    /// Apply the sketch preset
    pub fn preset_sketch(mut self) -> Self {
        self.config = TraceConfig::sketch_preset();
        self
    }

    /// Build the `PathTracer`
    pub fn build(self) -> TraceResult<PathTracer> {
        PathTracer::new(self.config)
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Create a builder from an existing `TraceConfig`
    pub fn from_config(config: TraceConfig) -> Self {
        Self { config }
    }

    /// Convert the builder into a `TraceConfig`
    pub fn to_config(self) -> TraceConfig {
        self.config
    }
}
