use routeline_core::PixelPoint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RGB color with float channels (0-255), so running averages stay exact
pub type Color = [f32; 3];

/// How two colors are compared against the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ColorMetric {
    /// Euclidean distance in RGB space (0..=441)
    Euclidean,
    /// Largest per-channel difference, i.e. an RGB range mask (0..=255)
    MaxChannel,
}

impl ColorMetric {
    pub fn distance(&self, a: Color, b: Color) -> f32 {
        let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
        match self {
            ColorMetric::Euclidean => (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt(),
            ColorMetric::MaxChannel => d[0].abs().max(d[1].abs()).max(d[2].abs()),
        }
    }
}

/// Which color the walk compares neighbors against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReferenceColor {
    /// Color sampled at the seed, fixed for the whole trace
    Seed,
    /// Mean of the last `window` visited pixels; the seed color until the first step
    RunningAverage { window: usize },
}

/// Neighbor that passed the filters, with its walk cost
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub point: PixelPoint,
    pub offset: (i64, i64),
    pub cost: f32,
}

/// Local line direction at the seed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tangent {
    /// Unit vector along the principal axis of the matching pixels
    pub axis: (f64, f64),
    /// Estimated stroke width across the axis, in pixels
    pub width: f64,
    /// Number of connected matching pixels the estimate used
    pub support: usize,
}
