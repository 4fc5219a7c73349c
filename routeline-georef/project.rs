use log::debug;
use rayon::prelude::*;
use routeline_core::{GeoPath, GeoPoint, PixelPath};

use crate::transform::Transform;

/// Paths shorter than this are mapped on the calling thread
const PARALLEL_THRESHOLD: usize = 4096;

/// Maps pixel paths through one solved transform
#[derive(Debug, Clone, Copy)]
pub struct Georeferencer {
    transform: Transform,
}

impl Georeferencer {
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Same length and order as `path`
    pub fn project(&self, path: &PixelPath) -> GeoPath {
        let points = path.points();
        let geo: Vec<GeoPoint> = if points.len() >= PARALLEL_THRESHOLD {
            points.par_iter().map(|&p| self.transform.apply(p)).collect()
        } else {
            points.iter().map(|&p| self.transform.apply(p)).collect()
        };
        debug!("projected {} points", geo.len());
        GeoPath::new(geo)
    }
}

/// Map every pixel of `path` through `transform`
pub fn project(path: &PixelPath, transform: &Transform) -> GeoPath {
    Georeferencer::new(*transform).project(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::AffineTransform;
    use routeline_core::PixelPoint;

    fn create_test_transform() -> Transform {
        Transform::Affine(AffineTransform { a: 0.0, b: -1e-5, c: 0.004, d: -7.5e-6, e: 0.0, f: 0.00375 })
    }

    #[test]
    fn test_order_and_length_preserved() {
        let path = PixelPath::new(vec![PixelPoint::new(500, 400), PixelPoint::new(500, 250), PixelPoint::new(500, 100)]).unwrap();
        let geo = project(&path, &create_test_transform());

        assert_eq!(geo.len(), 3);
        let lons: Vec<f64> = geo.points().iter().map(|g| g.lon).collect();
        assert!(lons.windows(2).all(|w| w[1] > w[0]));
        assert!(geo.points().iter().all(|g| g.lat.abs() < 1e-12));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let points: Vec<PixelPoint> = (0..10_000).map(|i| PixelPoint::new(i % 997, i / 3)).collect();
        let path = PixelPath::new(points).unwrap();
        let transform = create_test_transform();

        let geo = Georeferencer::new(transform).project(&path);
        assert_eq!(geo.len(), path.len());
        for (p, g) in path.points().iter().zip(geo.points()) {
            assert_eq!(*g, transform.apply(*p));
        }
    }

    #[test]
    fn test_single_point() {
        let path = PixelPath::single(PixelPoint::new(0, 0));
        let geo = project(&path, &create_test_transform());
        assert_eq!(geo.points(), &[GeoPoint::new(0.00375, 0.004)]);
    }
}
