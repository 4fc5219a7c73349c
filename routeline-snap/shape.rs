//! Route shapes in the encoded polyline format.
//!
//! Valhalla encodes shapes with precision 6. The codec itself is the
//! `polyline` crate; this module maps between its `geo_types` coordinates
//! (x = longitude, y = latitude) and [`GeoPoint`].

use geo_types::Coord;
use routeline_core::GeoPoint;

/// Precision of Valhalla route shapes
pub const VALHALLA_PRECISION: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ShapeError(String);

/// Decode an encoded polyline into (lat, lon) points
pub fn decode(encoded: &str, precision: u32) -> Result<Vec<GeoPoint>, ShapeError> {
    let line = ::polyline::decode_polyline(encoded, precision).map_err(|e| ShapeError(e.to_string()))?;
    Ok(line.0.into_iter().map(|c| GeoPoint::new(c.y, c.x)).collect())
}

/// Encode (lat, lon) points as a polyline
pub fn encode(points: &[GeoPoint], precision: u32) -> Result<String, ShapeError> {
    let coords = points.iter().map(|p| Coord { x: p.lon, y: p.lat });
    ::polyline::encode_coordinates(coords, precision).map_err(|e| ShapeError(e.to_string()))
}
