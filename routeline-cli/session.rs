use image::RgbImage;
use log::{debug, info, warn};
use routeline_core::{GeoPath, GeoPoint, PixelPath, PixelPoint, ReferencePoint};
use routeline_georef::{CorrespondenceSolver, GeorefError, Georeferencer, Transform};
use routeline_snap::RoadSnapper;
use routeline_trace::{decode_image, simplify, PathTracer, RasterSampler};

use crate::config::AppConfig;
use crate::{RouteError, RouteResult};

/// Where a session is in the trace, georeference, snap sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No image loaded
    Empty,
    /// Image loaded, no reference points yet
    Traced0,
    /// Some reference points placed, fewer than required
    Collecting,
    /// Transform solved
    Georeferenced,
    /// Road-snapped track available
    Snapped,
}

#[derive(Debug, Clone)]
enum References {
    Collecting { placed: Vec<ReferencePoint>, pending: Option<PixelPoint> },
    Solved { placed: Vec<ReferencePoint>, transform: Transform, geo: Option<GeoPath>, snapped: Option<GeoPath> },
}

impl References {
    fn empty() -> Self {
        References::Collecting { placed: Vec::new(), pending: None }
    }
}

#[derive(Debug, Clone)]
struct Workspace {
    image: RgbImage,
    path: Option<PixelPath>,
    references: References,
}

/// One user's image-to-track session.
///
/// Every transition is caused by exactly one call. A new image resets
/// everything; retracing keeps a solved transform but drops the tracks
/// derived from the previous path.
#[derive(Debug, Clone)]
pub struct TrackSession {
    tracer: PathTracer,
    solver: CorrespondenceSolver,
    required: usize,
    simplify_epsilon: f64,
    workspace: Option<Workspace>,
}

impl TrackSession {
    pub fn new(tracer: PathTracer, solver: CorrespondenceSolver, required: usize) -> RouteResult<Self> {
        if required < 2 {
            return Err(RouteError::InvalidInput(format!(
                "a session needs at least 2 reference points, got {}",
                required
            )));
        }
        Ok(Self { tracer, solver, required, simplify_epsilon: 0.0, workspace: None })
    }

    pub fn from_config(config: &AppConfig) -> RouteResult<Self> {
        let session = Self::new(
            PathTracer::new(config.trace.clone())?,
            CorrespondenceSolver::new(config.pipeline.similarity_mode),
            config.pipeline.reference_points,
        )?;
        Ok(session.with_simplify(config.pipeline.simplify_epsilon))
    }

    /// Simplify traced paths with this tolerance in pixels, 0 keeps them as traced
    pub fn with_simplify(mut self, epsilon: f64) -> Self {
        self.simplify_epsilon = epsilon;
        self
    }

    pub fn state(&self) -> SessionState {
        match &self.workspace {
            None => SessionState::Empty,
            Some(ws) => match &ws.references {
                References::Collecting { placed, pending } if placed.is_empty() && pending.is_none() => {
                    SessionState::Traced0
                }
                References::Collecting { .. } => SessionState::Collecting,
                References::Solved { snapped: Some(_), .. } => SessionState::Snapped,
                References::Solved { .. } => SessionState::Georeferenced,
            },
        }
    }

    pub fn required_references(&self) -> usize {
        self.required
    }

    /// Decode and load an image. Bytes that fail to decode leave the session untouched.
    pub fn load_image(&mut self, bytes: &[u8]) -> RouteResult<(u32, u32)> {
        let image = decode_image(bytes)?;
        Ok(self.load_decoded(image))
    }

    pub fn load_decoded(&mut self, image: RgbImage) -> (u32, u32) {
        let dimensions = image.dimensions();
        if self.workspace.is_some() {
            info!("new image replaces the session, references and tracks cleared");
        }
        self.workspace = Some(Workspace { image, path: None, references: References::empty() });
        dimensions
    }

    pub fn image(&self) -> Option<&RgbImage> {
        self.workspace.as_ref().map(|ws| &ws.image)
    }

    fn workspace_mut(&mut self) -> RouteResult<&mut Workspace> {
        self.workspace.as_mut().ok_or(RouteError::NoImage)
    }

    fn workspace(&self) -> RouteResult<&Workspace> {
        self.workspace.as_ref().ok_or(RouteError::NoImage)
    }

    /// Trace from `seed`, replacing the current path
    pub fn trace(&mut self, seed: PixelPoint) -> RouteResult<PixelPath> {
        let tracer = &self.tracer;
        let epsilon = self.simplify_epsilon;
        let ws = self.workspace.as_mut().ok_or(RouteError::NoImage)?;
        let mut path = tracer.trace(&ws.image, seed)?;
        if epsilon > 0.0 && !path.is_single() {
            path = simplify(&path, epsilon);
        }

        if let References::Solved { transform, geo, snapped, .. } = &mut ws.references {
            *snapped = None;
            *geo = if path.is_single() { None } else { Some(Georeferencer::new(*transform).project(&path)) };
        }
        ws.path = Some(path.clone());
        Ok(path)
    }

    pub fn path(&self) -> Option<&PixelPath> {
        self.workspace.as_ref().and_then(|ws| ws.path.as_ref())
    }

    /// Place the pixel half of the next reference point; replaces a pixel still waiting for its position
    pub fn place_pixel(&mut self, pixel: PixelPoint) -> RouteResult<()> {
        let required = self.required;
        let ws = self.workspace_mut()?;
        RasterSampler::new(&ws.image).check(pixel)?;

        match &mut ws.references {
            References::Collecting { pending, .. } => {
                if let Some(old) = pending.replace(pixel) {
                    debug!("reference pixel ({}, {}) replaced by ({}, {})", old.x, old.y, pixel.x, pixel.y);
                }
                Ok(())
            }
            References::Solved { .. } => Err(RouteError::ReferencesComplete(required)),
        }
    }

    /// Pair the pending pixel with `geo`. Solves the transform once all references are placed.
    pub fn place_geo(&mut self, geo: GeoPoint) -> RouteResult<SessionState> {
        let geo = GeoPoint::validated(geo.lat, geo.lon).map_err(GeorefError::from)?;
        let required = self.required;
        let solver = self.solver;
        let ws = self.workspace_mut()?;

        let References::Collecting { placed, pending } = &mut ws.references else {
            return Err(RouteError::ReferencesComplete(required));
        };
        let pixel = pending.take().ok_or(RouteError::NoPendingReference)?;
        placed.push(ReferencePoint::new(pixel, geo));
        if placed.len() < required {
            return Ok(self.state());
        }

        let placed = std::mem::take(placed);
        match solver.solve(&placed) {
            Ok(transform) => {
                let geo = ws
                    .path
                    .as_ref()
                    .filter(|p| !p.is_single())
                    .map(|p| Georeferencer::new(transform).project(p));
                ws.references = References::Solved { placed, transform, geo, snapped: None };
                Ok(self.state())
            }
            Err(e) => {
                warn!("reference points rejected, collect them again: {}", e);
                ws.references = References::empty();
                Err(e.into())
            }
        }
    }

    /// Forget all reference points and the transform
    pub fn reset_references(&mut self) -> RouteResult<()> {
        self.workspace_mut()?.references = References::empty();
        Ok(())
    }

    pub fn references(&self) -> &[ReferencePoint] {
        match self.workspace.as_ref().map(|ws| &ws.references) {
            Some(References::Collecting { placed, .. } | References::Solved { placed, .. }) => placed.as_slice(),
            None => &[],
        }
    }

    pub fn pending_pixel(&self) -> Option<PixelPoint> {
        match self.workspace.as_ref().map(|ws| &ws.references) {
            Some(References::Collecting { pending, .. }) => *pending,
            _ => None,
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        match self.workspace.as_ref().map(|ws| &ws.references) {
            Some(References::Solved { transform, .. }) => Some(transform),
            _ => None,
        }
    }

    /// Geographic track of the current path
    pub fn geo_path(&self) -> RouteResult<&GeoPath> {
        let ws = self.workspace()?;
        match &ws.references {
            References::Collecting { .. } => Err(RouteError::NoTransform),
            References::Solved { geo: Some(geo), .. } => Ok(geo),
            References::Solved { .. } => match &ws.path {
                Some(p) if p.is_single() => Err(RouteError::NoLineFound),
                _ => Err(RouteError::NoPath),
            },
        }
    }

    pub fn snapped_path(&self) -> Option<&GeoPath> {
        match self.workspace.as_ref().map(|ws| &ws.references) {
            Some(References::Solved { snapped, .. }) => snapped.as_ref(),
            _ => None,
        }
    }

    /// Snap the geographic track. On failure the session stays where it was.
    pub fn snap(&mut self, snapper: &dyn RoadSnapper, search_radius_m: f64) -> RouteResult<GeoPath> {
        let geo = self.geo_path()?.clone();
        let snapped = snapper.snap(&geo, search_radius_m)?;
        info!("snapped track has {} points ({} before)", snapped.len(), geo.len());

        if let Some(Workspace { references: References::Solved { snapped: slot, .. }, .. }) = self.workspace.as_mut() {
            *slot = Some(snapped.clone());
        }
        Ok(snapped)
    }

    /// Snap, or keep the unsnapped track when the routing service fails
    pub fn snap_or_fallback(&mut self, snapper: &dyn RoadSnapper, search_radius_m: f64) -> RouteResult<GeoPath> {
        match self.snap(snapper, search_radius_m) {
            Ok(snapped) => Ok(snapped),
            Err(RouteError::SnapFailed(e)) => {
                warn!("road snapping failed, keeping unsnapped track: {}", e);
                Ok(self.geo_path()?.clone())
            }
            Err(e) => Err(e),
        }
    }

    /// Snapped track if there is one, otherwise the projected track; at least two points
    pub fn best_track(&self) -> RouteResult<&GeoPath> {
        let track = match self.snapped_path() {
            Some(snapped) => snapped,
            None => self.geo_path()?,
        };
        if track.len() < 2 {
            return Err(RouteError::NoLineFound);
        }
        Ok(track)
    }
}
