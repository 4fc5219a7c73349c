#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for ground distances (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Integer pixel coordinate. Signed so that requests outside an image stay
/// representable until they are checked against its extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

impl PixelPoint {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Whether the point lies inside a `width`×`height` raster
    pub fn within(&self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < width as i64 && self.y < height as i64
    }

    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (chessboard) distance, the ring index of an 8-connected neighborhood
    pub fn chebyshev(&self, other: &PixelPoint) -> i64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Axis-aligned extent of a pixel path, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl Bounds {
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }
}

/// Ordered pixel polyline. Never empty and never repeats a point twice in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelPath(Vec<PixelPoint>);

impl PixelPath {
    /// Build a path, collapsing immediate repeats. Returns `None` for no points.
    pub fn new(mut points: Vec<PixelPoint>) -> Option<Self> {
        points.dedup();
        if points.is_empty() {
            None
        } else {
            Some(Self(points))
        }
    }

    /// The one-point path a tracer returns when it finds no line at `seed`
    pub fn single(seed: PixelPoint) -> Self {
        Self(vec![seed])
    }

    pub fn points(&self) -> &[PixelPoint] {
        &self.0
    }

    pub fn into_points(self) -> Vec<PixelPoint> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for the `[seed]` result, i.e. no line was followed
    pub fn is_single(&self) -> bool {
        self.0.len() == 1
    }

    pub fn first(&self) -> PixelPoint {
        self.0[0]
    }

    pub fn last(&self) -> PixelPoint {
        self.0[self.0.len() - 1]
    }

    pub fn bounds(&self) -> Bounds {
        let first = self.first();
        self.0.iter().fold(
            Bounds {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x,
                max_y: first.y,
            },
            |b, p| Bounds {
                min_x: b.min_x.min(p.x),
                min_y: b.min_y.min(p.y),
                max_x: b.max_x.max(p.x),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    /// Same path translated so that its bounding box starts at (0, 0)
    pub fn normalized(&self) -> PixelPath {
        let b = self.bounds();
        PixelPath(
            self.0
                .iter()
                .map(|p| PixelPoint::new(p.x - b.min_x, p.y - b.min_y))
                .collect(),
        )
    }

    /// Euclidean length along the polyline in pixels
    pub fn length_px(&self) -> f64 {
        self.0
            .windows(2)
            .map(|w| {
                let dx = (w[1].x - w[0].x) as f64;
                let dy = (w[1].y - w[0].y) as f64;
                dx.hypot(dy)
            })
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Unchecked constructor, used for computed positions
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Constructor for user-supplied positions; rejects out-of-range or non-finite degrees
    pub fn validated(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    pub fn is_valid(&self) -> bool {
        Self::validated(self.lat, self.lon).is_ok()
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let (phi1, phi2) = (self.lat.to_radians(), other.lat.to_radians());
        let dphi = phi2 - phi1;
        let dlambda = (other.lon - self.lon).to_radians();
        let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

/// Ordered geographic polyline
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPath(Vec<GeoPoint>);

impl GeoPath {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ground length along the polyline in meters
    pub fn length_m(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance_m(&w[1])).sum()
    }
}

impl From<Vec<GeoPoint>> for GeoPath {
    fn from(points: Vec<GeoPoint>) -> Self {
        Self(points)
    }
}

/// One image pixel tied to the position it depicts
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReferencePoint {
    pub pixel: PixelPoint,
    pub geo: GeoPoint,
}

impl ReferencePoint {
    pub const fn new(pixel: PixelPoint, geo: GeoPoint) -> Self {
        Self { pixel, geo }
    }
}

/// Number of worker threads used when nothing is configured
pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
