use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use routeline_core::GeoPath;
use time::OffsetDateTime;

use crate::{RouteError, RouteResult};

const CREATOR: &str = "routeline";

/// GPX 1.1 document with one track of one segment, every point stamped with `timestamp`
pub fn write_gpx(path: &GeoPath, name: Option<&str>, timestamp: OffsetDateTime) -> RouteResult<String> {
    if path.len() < 2 {
        return Err(RouteError::NoLineFound);
    }

    let mut segment = TrackSegment::new();
    segment.points = path
        .points()
        .iter()
        .map(|p| {
            let mut waypoint = Waypoint::new(geo_types::Point::new(p.lon, p.lat));
            waypoint.time = Some(timestamp.into());
            waypoint
        })
        .collect();

    let mut track = Track::new();
    track.name = name.map(str::to_string);
    track.segments.push(segment);

    let document = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        tracks: vec![track],
        ..Default::default()
    };

    let mut buffer = Vec::new();
    gpx::write(&document, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| RouteError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use routeline_core::GeoPoint;

    fn create_test_path() -> GeoPath {
        GeoPath::new(vec![
            GeoPoint::new(60.1699, 24.9384),
            GeoPoint::new(60.1702, 24.9410),
            GeoPoint::new(60.1710, 24.9425),
        ])
    }

    #[test]
    fn test_written_track_reads_back() {
        let stamp = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let xml = write_gpx(&create_test_path(), Some("Morning walk"), stamp).unwrap();
        assert!(xml.contains("version=\"1.1\""));

        let parsed = gpx::read(xml.as_bytes()).unwrap();
        assert_eq!(parsed.tracks.len(), 1);
        let track = &parsed.tracks[0];
        assert_eq!(track.name.as_deref(), Some("Morning walk"));
        assert_eq!(track.segments.len(), 1);

        let points = &track.segments[0].points;
        assert_eq!(points.len(), 3);
        assert_abs_diff_eq!(points[1].point().y(), 60.1702, epsilon = 1e-9);
        assert_abs_diff_eq!(points[1].point().x(), 24.9410, epsilon = 1e-9);
        assert!(points.iter().all(|p| p.time.is_some()));
    }

    #[test]
    fn test_short_track_rejected() {
        let single = GeoPath::new(vec![GeoPoint::new(1.0, 1.0)]);
        assert!(matches!(write_gpx(&single, None, OffsetDateTime::UNIX_EPOCH), Err(RouteError::NoLineFound)));
    }
}
