use log::{debug, info, warn};
use routeline_core::GeoPath;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SnapConfig;
use crate::error::{SnapError, SnapResult};
use crate::shape::{self, VALHALLA_PRECISION};

/// Longest error body kept in `SnapError::Status`
const MAX_ERROR_BODY: usize = 512;

/// Snaps a geographic polyline onto a road network
pub trait RoadSnapper {
    /// One attempt, no retained state. The result may differ in length from `path`.
    fn snap(&self, path: &GeoPath, search_radius_m: f64) -> SnapResult<GeoPath>;
}

#[derive(Serialize)]
struct ShapePoint {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct TraceOptions {
    turn_penalty_factor: f64,
    search_radius: f64,
    gps_accuracy: f64,
    sigma_z: f64,
    beta: f64,
    max_route_distance_factor: f64,
    max_route_time_factor: f64,
}

#[derive(Serialize)]
struct DirectionsOptions<'a> {
    units: &'a str,
}

#[derive(Serialize)]
struct TraceAttributesRequest<'a> {
    shape: Vec<ShapePoint>,
    costing: &'a str,
    shape_match: &'a str,
    search_radius: f64,
    gps_accuracy: f64,
    #[serde(rename = "break")]
    break_mode: &'a str,
    break_distance: f64,
    interpolation_distance: f64,
    trace_options: TraceOptions,
    directions_options: DirectionsOptions<'a>,
}

#[derive(Deserialize)]
struct TraceAttributesResponse {
    shape: Option<String>,
}

/// Blocking client for Valhalla's `trace_attributes` map matching
#[derive(Debug, Clone)]
pub struct ValhallaClient {
    config: SnapConfig,
    http: reqwest::blocking::Client,
}

impl ValhallaClient {
    pub fn new(config: SnapConfig) -> SnapResult<Self> {
        config.validate()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        format!("{}/trace_attributes", self.config.base_url.trim_end_matches('/'))
    }

    /// JSON body sent for `path`
    pub fn request_body(&self, path: &GeoPath, search_radius_m: f64) -> serde_json::Value {
        let cfg = &self.config;
        let request = TraceAttributesRequest {
            shape: path.points().iter().map(|p| ShapePoint { lat: p.lat, lon: p.lon }).collect(),
            costing: &cfg.costing,
            shape_match: &cfg.shape_match,
            search_radius: search_radius_m,
            gps_accuracy: cfg.gps_accuracy,
            break_mode: "distance",
            break_distance: cfg.break_distance,
            interpolation_distance: cfg.interpolation_distance,
            trace_options: TraceOptions {
                turn_penalty_factor: cfg.turn_penalty_factor,
                search_radius: search_radius_m,
                gps_accuracy: cfg.gps_accuracy,
                sigma_z: cfg.sigma_z,
                beta: cfg.beta,
                max_route_distance_factor: cfg.max_route_distance_factor,
                max_route_time_factor: cfg.max_route_time_factor,
            },
            directions_options: DirectionsOptions { units: &cfg.units },
        };
        serde_json::json!(request)
    }
}

impl RoadSnapper for ValhallaClient {
    fn snap(&self, path: &GeoPath, search_radius_m: f64) -> SnapResult<GeoPath> {
        if path.len() < 2 {
            return Err(SnapError::InsufficientPoints(path.len()));
        }
        if !(search_radius_m.is_finite() && search_radius_m > 0.0) {
            return Err(SnapError::InvalidRadius(search_radius_m));
        }

        let url = self.endpoint();
        info!("snapping {} points via {} (radius {} m)", path.len(), url, search_radius_m);
        let response = self.http.post(&url).json(&self.request_body(path, search_radius_m)).send()?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            warn!("routing service answered {}: {}", status, body);
            return Err(SnapError::Status { status: status.as_u16(), body });
        }

        let snapped = parse_trace_response(&response.text()?)?;
        debug!("snapped {} points to {}", path.len(), snapped.len());
        Ok(snapped)
    }
}

/// Extract the matched shape from a `trace_attributes` response body
pub fn parse_trace_response(body: &str) -> SnapResult<GeoPath> {
    let parsed: TraceAttributesResponse =
        serde_json::from_str(body).map_err(|e| SnapError::MalformedResponse(e.to_string()))?;
    let shape = parsed
        .shape
        .ok_or_else(|| SnapError::MalformedResponse("response has no shape".to_string()))?;

    let points = shape::decode(&shape, VALHALLA_PRECISION)?;
    if points.is_empty() {
        return Err(SnapError::MalformedResponse("shape is empty".to_string()));
    }
    if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
        return Err(SnapError::MalformedResponse(format!(
            "shape point ({}, {}) out of range",
            bad.lat, bad.lon
        )));
    }
    Ok(GeoPath::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use routeline_core::GeoPoint;

    fn create_test_client() -> ValhallaClient {
        // Nothing listens on the discard port
        ValhallaClient::new(SnapConfig::new().with_base_url("http://127.0.0.1:9/")).unwrap()
    }

    fn create_test_path() -> GeoPath {
        GeoPath::new(vec![GeoPoint::new(60.1699, 24.9384), GeoPoint::new(60.1702, 24.9410)])
    }

    #[test]
    fn test_endpoint_trims_slash() {
        assert_eq!(create_test_client().endpoint(), "http://127.0.0.1:9/trace_attributes");
    }

    #[test]
    fn test_request_body_fields() {
        let body = create_test_client().request_body(&create_test_path(), 35.0);

        assert_eq!(body["shape"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(body["shape"][0]["lat"], 60.1699);
        assert_eq!(body["shape"][0]["lon"], 24.9384);
        assert_eq!(body["costing"], "pedestrian");
        assert_eq!(body["shape_match"], "map_snap");
        assert_eq!(body["search_radius"], 35.0);
        assert_eq!(body["break"], "distance");
        assert_eq!(body["trace_options"]["search_radius"], 35.0);
        assert_eq!(body["trace_options"]["sigma_z"], 4.07);
        assert_eq!(body["directions_options"]["units"], "kilometers");
    }

    #[test]
    fn test_too_few_points_fail_before_network() {
        let client = create_test_client();
        let single = GeoPath::new(vec![GeoPoint::new(1.0, 1.0)]);
        assert!(matches!(client.snap(&single, 50.0), Err(SnapError::InsufficientPoints(1))));
        assert!(matches!(client.snap(&GeoPath::default(), 50.0), Err(SnapError::InsufficientPoints(0))));
    }

    #[test]
    fn test_invalid_radius() {
        let client = create_test_client();
        assert!(matches!(client.snap(&create_test_path(), 0.0), Err(SnapError::InvalidRadius(_))));
        assert!(matches!(client.snap(&create_test_path(), f64::NAN), Err(SnapError::InvalidRadius(_))));
    }

    #[test]
    fn test_unreachable_service() {
        let result = create_test_client().snap(&create_test_path(), 50.0);
        assert!(matches!(result, Err(SnapError::Http(_))));
    }

    #[test]
    fn test_parse_response() {
        let shape = shape::encode(&create_test_path().into_points(), VALHALLA_PRECISION).unwrap();
        let body = format!(r#"{{"shape": "{}", "edges": []}}"#, shape);
        let path = parse_trace_response(&body).unwrap();
        assert_eq!(path.len(), 2);
        assert!((path.points()[1].lon - 24.9410).abs() < 1e-9);
    }

    #[test]
    fn test_parse_malformed_responses() {
        assert!(matches!(parse_trace_response("not json"), Err(SnapError::MalformedResponse(_))));
        assert!(matches!(parse_trace_response(r#"{"edges": []}"#), Err(SnapError::MalformedResponse(_))));
        assert!(matches!(parse_trace_response(r#"{"shape": ""}"#), Err(SnapError::MalformedResponse(_))));
        assert!(matches!(parse_trace_response(r#"{"shape": "_p~i"}"#), Err(SnapError::Shape(_))));
    }
}
