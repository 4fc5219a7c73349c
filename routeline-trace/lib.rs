//! Seed-driven line tracing over raster images.
//!
//! Given an RGB image and a pixel on a drawn route, [`PathTracer`] follows the
//! line of similar color in both directions and returns it as an ordered
//! [`PixelPath`](routeline_core::PixelPath).

pub mod builder;
pub mod config;
pub mod error;
pub mod sampler;
pub mod simplify;
pub mod tracer;
pub mod types;

pub use builder::TracerBuilder;
pub use config::TraceConfig;
pub use error::{TraceError, TraceResult};
pub use sampler::{decode_image, RasterSampler};
pub use simplify::simplify;
pub use tracer::PathTracer;
pub use types::{Color, ColorMetric, ReferenceColor, Tangent};
