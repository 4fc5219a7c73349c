use image::RgbImage;
use log::{info, warn};
use routeline_core::{GeoPath, PixelPath, PixelPoint, ReferencePoint};
use routeline_georef::{CorrespondenceSolver, GeorefError, Georeferencer, Transform};
use routeline_snap::{RoadSnapper, SnapError};
use routeline_trace::{PathTracer, TraceError};

pub mod config;
pub mod gpx_export;
pub mod overlay;
pub mod server;
pub mod session;

pub use config::{AppConfig, PipelineConfig, ServerConfig};
pub use routeline_core::{self, GeoPoint};
pub use routeline_georef::{self, SimilarityMode};
pub use routeline_snap::{self, SnapConfig, ValhallaClient};
pub use routeline_trace::{self, TraceConfig};
pub use session::{SessionState, TrackSession};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Georef(#[from] GeorefError),
    #[error("Road snapping failed: {0}")]
    SnapFailed(#[from] SnapError),
    #[error("No line found at the seed pixel")]
    NoLineFound,
    #[error("No image loaded")]
    NoImage,
    #[error("No path traced yet")]
    NoPath,
    #[error("No transform solved yet")]
    NoTransform,
    #[error("No pending reference pixel to pair with a position")]
    NoPendingReference,
    #[error("All {0} reference points are placed")]
    ReferencesComplete(usize),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid routing configuration: {0}")]
    SnapConfig(#[source] SnapError),
    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouteError {
    /// Errors caused by the caller's input rather than by the system
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RouteError::Trace(_)
                | RouteError::Georef(GeorefError::InsufficientPoints { .. } | GeorefError::InvalidGeoPoint(_))
                | RouteError::SnapFailed(SnapError::InsufficientPoints(_) | SnapError::InvalidRadius(_))
                | RouteError::NoImage
                | RouteError::NoPath
                | RouteError::NoTransform
                | RouteError::NoPendingReference
                | RouteError::ReferencesComplete(_)
                | RouteError::InvalidInput(_)
        )
    }
}

pub type RouteResult<T> = Result<T, RouteError>;

/// Stateless pipeline: trace, georeference, snap
#[derive(Debug, Clone)]
pub struct RouteLine {
    tracer: PathTracer,
    solver: CorrespondenceSolver,
    simplify_epsilon: f64,
}

impl RouteLine {
    pub fn new(config: &AppConfig) -> RouteResult<Self> {
        Ok(Self {
            tracer: PathTracer::new(config.trace.clone())?,
            solver: CorrespondenceSolver::new(config.pipeline.similarity_mode),
            simplify_epsilon: config.pipeline.simplify_epsilon,
        })
    }

    pub fn tracer(&self) -> &PathTracer {
        &self.tracer
    }

    pub fn solver(&self) -> &CorrespondenceSolver {
        &self.solver
    }

    /// Raw trace; a single-point result means no line at `seed`
    pub fn trace(&self, img: &RgbImage, seed: PixelPoint) -> RouteResult<PixelPath> {
        Ok(self.tracer.trace(img, seed)?)
    }

    /// Trace and simplify, failing with `NoLineFound` when nothing was followed
    pub fn trace_line(&self, img: &RgbImage, seed: PixelPoint) -> RouteResult<PixelPath> {
        let path = self.trace(img, seed)?;
        if path.is_single() {
            return Err(RouteError::NoLineFound);
        }
        Ok(self.simplify(&path))
    }

    pub fn simplify(&self, path: &PixelPath) -> PixelPath {
        if self.simplify_epsilon > 0.0 {
            let simple = routeline_trace::simplify(path, self.simplify_epsilon);
            info!("simplified {} points to {}", path.len(), simple.len());
            simple
        } else {
            path.clone()
        }
    }

    pub fn solve(&self, references: &[ReferencePoint]) -> RouteResult<Transform> {
        Ok(self.solver.solve(references)?)
    }

    pub fn georeference(&self, path: &PixelPath, references: &[ReferencePoint]) -> RouteResult<GeoPath> {
        let transform = self.solve(references)?;
        Ok(Georeferencer::new(transform).project(path))
    }
}

/// Snap `path`, returning it unchanged when the routing service fails
pub fn snap_or_fallback(snapper: &dyn RoadSnapper, path: GeoPath, search_radius_m: f64) -> GeoPath {
    match snapper.snap(&path, search_radius_m) {
        Ok(snapped) => snapped,
        Err(e) => {
            warn!("road snapping failed, keeping unsnapped track: {}", e);
            path
        }
    }
}
