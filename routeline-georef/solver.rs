use log::{debug, info};
use nalgebra::{Matrix6, Vector6};
use routeline_core::{GeoPoint, ReferencePoint};

use crate::error::{GeorefError, GeorefResult};
use crate::transform::{AffineTransform, SimilarityMode, SimilarityTransform, Transform};

/// Solves a pixel to geographic transform from reference point pairs.
///
/// Two points give a similarity, three an exact affine and four or more a
/// least-squares affine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrespondenceSolver {
    mode: SimilarityMode,
}

impl CorrespondenceSolver {
    pub fn new(mode: SimilarityMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SimilarityMode {
        self.mode
    }

    pub fn solve(&self, points: &[ReferencePoint]) -> GeorefResult<Transform> {
        if points.len() < 2 {
            return Err(GeorefError::InsufficientPoints { required: 2, got: points.len() });
        }
        for r in points {
            GeoPoint::validated(r.geo.lat, r.geo.lon)?;
        }

        let transform = match points.len() {
            2 => Transform::Similarity(solve_similarity(points[0], points[1], self.mode)?),
            3 => Transform::Affine(solve_affine(points)?),
            _ => Transform::Affine(fit_affine_least_squares(points)?),
        };
        info!(
            "solved transform from {} reference points, rms error {:.2} m",
            points.len(),
            transform.rms_error(points)
        );
        debug!("{}", transform.summary());
        Ok(transform)
    }
}

/// Two-point similarity anchored at `p0`
pub fn solve_similarity(p0: ReferencePoint, p1: ReferencePoint, mode: SimilarityMode) -> GeorefResult<SimilarityTransform> {
    if p0.pixel == p1.pixel {
        return Err(GeorefError::DegenerateConfiguration(format!(
            "reference pixels coincide at ({}, {})",
            p0.pixel.x, p0.pixel.y
        )));
    }
    let dx = p1.pixel.x as f64 - p0.pixel.x as f64;
    // Pixel rows grow downward, latitude grows northward
    let dy = p0.pixel.y as f64 - p1.pixel.y as f64;
    let dlon = p1.geo.lon - p0.geo.lon;
    let dlat = p1.geo.lat - p0.geo.lat;

    match mode {
        SimilarityMode::AxisAligned => {
            if dx == 0.0 || dy == 0.0 {
                return Err(GeorefError::DegenerateConfiguration(
                    "axis-aligned fit needs reference pixels differing in both x and y".to_string(),
                ));
            }
            Ok(SimilarityTransform::new(mode, p0, (dlon / dx, dlat / dy), 0.0, 1.0))
        }
        SimilarityMode::Uniform => {
            let cos_lat = p0.geo.lat.to_radians().cos();
            if cos_lat < 1e-12 {
                return Err(GeorefError::DegenerateConfiguration("anchor lies on a pole".to_string()));
            }
            let (east, north) = (dlon * cos_lat, dlat);
            let ground = east.hypot(north);
            if ground == 0.0 {
                return Err(GeorefError::DegenerateConfiguration(
                    "reference points share one geographic position".to_string(),
                ));
            }
            let scale = ground / dx.hypot(dy);
            let rotation = north.atan2(east) - dy.atan2(dx);
            Ok(SimilarityTransform::new(mode, p0, (scale, scale), rotation, 1.0 / cos_lat))
        }
    }
}

/// Pixel centroid; both affine fits work in coordinates relative to it
fn centroid(points: &[ReferencePoint]) -> (f64, f64) {
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|r| r.pixel.x as f64).sum();
    let sy: f64 = points.iter().map(|r| r.pixel.y as f64).sum();
    (sx / n, sy / n)
}

/// Move the constant terms from centered back to raw pixel coordinates
fn uncenter(params: [f64; 6], (mx, my): (f64, f64)) -> AffineTransform {
    let [a, b, c, d, e, f] = params;
    AffineTransform { a, b, c: c - a * mx - b * my, d, e, f: f - d * mx - e * my }
}

fn collinear() -> GeorefError {
    GeorefError::DegenerateConfiguration("reference pixels are collinear".to_string())
}

/// Pivots smaller than this fraction of the largest matrix entry count as zero
const RELATIVE_PIVOT_EPS: f64 = 1e-10;

/// LU solve with partial pivoting; `None` when the system is singular or close to it
fn solve_system(a: Matrix6<f64>, rhs: Vector6<f64>) -> Option<[f64; 6]> {
    let scale = a.amax();
    if !(scale > 0.0 && scale.is_finite()) {
        return None;
    }
    let lu = a.lu();
    if lu.u().diagonal().amin() <= scale * RELATIVE_PIVOT_EPS {
        return None;
    }
    let x = lu.solve(&rhs)?;
    Some([x[0], x[1], x[2], x[3], x[4], x[5]])
}

/// Exact affine through three non-collinear references (6×6 system)
pub fn solve_affine(points: &[ReferencePoint]) -> GeorefResult<AffineTransform> {
    if points.len() != 3 {
        return Err(GeorefError::InsufficientPoints { required: 3, got: points.len() });
    }
    let center = centroid(points);

    let mut a = Matrix6::<f64>::zeros();
    let mut rhs = Vector6::<f64>::zeros();
    for (i, r) in points.iter().enumerate() {
        let (x, y) = (r.pixel.x as f64 - center.0, r.pixel.y as f64 - center.1);
        for (j, v) in [x, y, 1.0].into_iter().enumerate() {
            a[(2 * i, j)] = v;
            a[(2 * i + 1, j + 3)] = v;
        }
        rhs[2 * i] = r.geo.lon;
        rhs[2 * i + 1] = r.geo.lat;
    }

    let params = solve_system(a, rhs).ok_or_else(collinear)?;
    Ok(uncenter(params, center))
}

/// Least-squares affine over four or more references (normal equations)
pub fn fit_affine_least_squares(points: &[ReferencePoint]) -> GeorefResult<AffineTransform> {
    if points.len() < 3 {
        return Err(GeorefError::InsufficientPoints { required: 3, got: points.len() });
    }
    let center = centroid(points);

    let mut normal = Matrix6::<f64>::zeros();
    let mut rhs = Vector6::<f64>::zeros();
    for r in points {
        let row = [r.pixel.x as f64 - center.0, r.pixel.y as f64 - center.1, 1.0];
        for i in 0..3 {
            for j in 0..3 {
                normal[(i, j)] += row[i] * row[j];
                normal[(i + 3, j + 3)] += row[i] * row[j];
            }
            rhs[i] += row[i] * r.geo.lon;
            rhs[i + 3] += row[i] * r.geo.lat;
        }
    }

    let params = solve_system(normal, rhs).ok_or_else(collinear)?;
    Ok(uncenter(params, center))
}
