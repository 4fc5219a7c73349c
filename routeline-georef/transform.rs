use routeline_core::{GeoPoint, PixelPoint, ReferencePoint};

use crate::error::{GeorefError, GeorefResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a two-point similarity distributes scale over the axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SimilarityMode {
    /// One ground scale, rotation and translation (conformal)
    #[default]
    Uniform,
    /// Independent degrees-per-pixel along each axis, no rotation
    AxisAligned,
}

/// Two-point transform anchored at the first reference point.
///
/// Pixel offsets from the anchor are taken with y pointing up, scaled,
/// rotated into east/north and added to the anchor position. In `Uniform`
/// mode east offsets are measured in a local equirectangular frame, so the
/// longitude delta is stretched by `1 / cos(anchor latitude)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimilarityTransform {
    pub mode: SimilarityMode,
    pub anchor: ReferencePoint,
    /// Degrees per pixel along x and y (equal in `Uniform` mode)
    pub scale: (f64, f64),
    /// Radians, counterclockwise from the pixel x axis to east
    pub rotation: f64,
    lon_stretch: f64,
}

impl SimilarityTransform {
    pub(crate) fn new(mode: SimilarityMode, anchor: ReferencePoint, scale: (f64, f64), rotation: f64, lon_stretch: f64) -> Self {
        Self { mode, anchor, scale, rotation, lon_stretch }
    }

    pub fn apply_xy(&self, x: f64, y: f64) -> GeoPoint {
        let u = self.scale.0 * (x - self.anchor.pixel.x as f64);
        let v = self.scale.1 * (self.anchor.pixel.y as f64 - y);
        let (sin, cos) = self.rotation.sin_cos();
        let east = u * cos - v * sin;
        let north = u * sin + v * cos;
        GeoPoint::new(self.anchor.geo.lat + north, self.anchor.geo.lon + east * self.lon_stretch)
    }

    /// Equivalent six-parameter form
    pub fn to_affine(&self) -> AffineTransform {
        let (sin, cos) = self.rotation.sin_cos();
        let (sx, sy) = self.scale;
        let (ax, ay) = (self.anchor.pixel.x as f64, self.anchor.pixel.y as f64);
        let k = self.lon_stretch;

        let a = k * sx * cos;
        let b = k * sy * sin;
        let d = sx * sin;
        let e = -sy * cos;
        AffineTransform {
            a,
            b,
            c: self.anchor.geo.lon - a * ax - b * ay,
            d,
            e,
            f: self.anchor.geo.lat - d * ax - e * ay,
        }
    }
}

/// `lon = a·x + b·y + c`, `lat = d·x + e·y + f` over raw pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub fn apply_xy(&self, x: f64, y: f64) -> GeoPoint {
        GeoPoint::new(self.d * x + self.e * y + self.f, self.a * x + self.b * y + self.c)
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Geographic position back to (sub)pixel coordinates
    pub fn invert(&self, geo: GeoPoint) -> GeorefResult<(f64, f64)> {
        let det = self.determinant();
        let norm = (self.a.abs() + self.b.abs()) * (self.d.abs() + self.e.abs());
        if det == 0.0 || det.abs() <= norm * 1e-12 {
            return Err(GeorefError::NotInvertible);
        }
        let (dl, dp) = (geo.lon - self.c, geo.lat - self.f);
        Ok(((self.e * dl - self.b * dp) / det, (self.a * dp - self.d * dl) / det))
    }
}

/// Solved pixel to geographic mapping
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Transform {
    Similarity(SimilarityTransform),
    Affine(AffineTransform),
}

impl Transform {
    pub fn apply(&self, p: PixelPoint) -> GeoPoint {
        self.apply_xy(p.x as f64, p.y as f64)
    }

    pub fn apply_xy(&self, x: f64, y: f64) -> GeoPoint {
        match self {
            Transform::Similarity(t) => t.apply_xy(x, y),
            Transform::Affine(t) => t.apply_xy(x, y),
        }
    }

    pub fn to_affine(&self) -> AffineTransform {
        match self {
            Transform::Similarity(t) => t.to_affine(),
            Transform::Affine(t) => *t,
        }
    }

    /// Inverse mapping, used to draw geographic paths over the source image
    pub fn invert(&self, geo: GeoPoint) -> GeorefResult<(f64, f64)> {
        self.to_affine().invert(geo)
    }

    /// Ground distance in meters between each reference and its mapped pixel
    pub fn residuals(&self, references: &[ReferencePoint]) -> Vec<f64> {
        references
            .iter()
            .map(|r| self.apply(r.pixel).distance_m(&r.geo))
            .collect()
    }

    /// Root mean square of `residuals`, 0 for no references
    pub fn rms_error(&self, references: &[ReferencePoint]) -> f64 {
        let residuals = self.residuals(references);
        if residuals.is_empty() {
            return 0.0;
        }
        (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
    }

    pub fn summary(&self) -> String {
        match self {
            Transform::Similarity(t) => format!(
                "Similarity ({:?}): scale=({:.3e}, {:.3e}) deg/px, rotation={:.2} deg, anchor=({}, {})",
                t.mode,
                t.scale.0,
                t.scale.1,
                t.rotation.to_degrees(),
                t.anchor.pixel.x,
                t.anchor.pixel.y
            ),
            Transform::Affine(t) => format!(
                "Affine: lon = {:.3e}x + {:.3e}y + {:.6}, lat = {:.3e}x + {:.3e}y + {:.6}",
                t.a, t.b, t.c, t.d, t.e, t.f
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn create_test_similarity() -> SimilarityTransform {
        let anchor = ReferencePoint::new(PixelPoint::new(100, 200), GeoPoint::new(60.17, 24.94));
        SimilarityTransform::new(SimilarityMode::Uniform, anchor, (2e-5, 2e-5), 0.3, 1.0 / 60.17f64.to_radians().cos())
    }

    #[test]
    fn test_similarity_matches_affine_form() {
        let sim = create_test_similarity();
        let affine = sim.to_affine();
        for &(x, y) in &[(100.0, 200.0), (0.0, 0.0), (640.5, 17.25), (-30.0, 900.0)] {
            let p = sim.apply_xy(x, y);
            let q = affine.apply_xy(x, y);
            assert_abs_diff_eq!(p.lat, q.lat, epsilon = 1e-12);
            assert_abs_diff_eq!(p.lon, q.lon, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_affine_invert_round_trip() {
        let t = AffineTransform { a: 1e-5, b: 2e-6, c: 24.9, d: -3e-6, e: -1.1e-5, f: 60.2 };
        let geo = t.apply_xy(321.0, 654.0);
        let (x, y) = t.invert(geo).unwrap();
        assert_abs_diff_eq!(x, 321.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 654.0, epsilon = 1e-6);
    }

    #[test]
    fn test_singular_affine_not_invertible() {
        let t = AffineTransform { a: 1e-5, b: 2e-5, c: 0.0, d: 2e-5, e: 4e-5, f: 0.0 };
        assert_eq!(t.invert(GeoPoint::new(0.0, 0.0)), Err(GeorefError::NotInvertible));
    }

    #[test]
    fn test_residuals_zero_at_anchor() {
        let sim = create_test_similarity();
        let transform = Transform::Similarity(sim);
        let residuals = transform.residuals(&[sim.anchor]);
        assert_eq!(residuals.len(), 1);
        assert_abs_diff_eq!(residuals[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(transform.rms_error(&[]), 0.0);
    }

    #[test]
    fn test_summary_names_kind() {
        assert!(Transform::Similarity(create_test_similarity()).summary().starts_with("Similarity"));
        let affine = Transform::Affine(create_test_similarity().to_affine());
        assert!(affine.summary().starts_with("Affine"));
    }
}
