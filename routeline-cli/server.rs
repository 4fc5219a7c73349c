//! JSON over HTTP front end for the pipeline.
//!
//! Handlers are stateless: each request decodes its own image or points and
//! runs the CPU-bound and blocking work on `spawn_blocking`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{debug, error, info};
use routeline_core::{GeoPath, GeoPoint, PixelPath, PixelPoint, ReferencePoint};
use routeline_georef::{CorrespondenceSolver, GeorefError, Georeferencer, SimilarityMode};
use routeline_snap::{RoadSnapper, SnapError, ValhallaClient};
use routeline_trace::decode_image;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::gpx_export::write_gpx;
use crate::overlay::path_to_svg;
use crate::{RouteError, RouteLine, RouteResult};

type Shared = Arc<AppConfig>;

/// Error body `{"error": "..."}` with a status derived from the failure kind
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        let status = if err.is_input_error() {
            StatusCode::BAD_REQUEST
        } else {
            match err {
                RouteError::NoLineFound
                | RouteError::Georef(GeorefError::DegenerateConfiguration(_) | GeorefError::NotInvertible) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                RouteError::SnapFailed(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        Self { status, message: err.to_string() }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.message);
        } else {
            debug!("{} {}", self.status, self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> RouteResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {}", e)))?
        .map_err(ApiError::from)
}

struct TraceForm {
    image: Vec<u8>,
    seed: PixelPoint,
}

fn parse_coordinate(name: &str, text: &str) -> ApiResult<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("{} must be an integer, got {:?}", name, text)))
}

async fn read_trace_form(mut multipart: Multipart) -> ApiResult<TraceForm> {
    let (mut image, mut x, mut y) = (None, None, None);
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.body_text()))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => image = Some(field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?.to_vec()),
            "start_x" | "start_y" => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                let value = parse_coordinate(&name, &text)?;
                if name == "start_x" {
                    x = Some(value);
                } else {
                    y = Some(value);
                }
            }
            other => debug!("ignoring form field {:?}", other),
        }
    }

    let image = image.ok_or_else(|| ApiError::bad_request("No image uploaded"))?;
    match (x, y) {
        (Some(x), Some(y)) => Ok(TraceForm { image, seed: PixelPoint::new(x, y) }),
        _ => Err(ApiError::bad_request("Missing start_x or start_y")),
    }
}

fn pixel_pairs(path: &PixelPath) -> Vec<[i64; 2]> {
    path.points().iter().map(|p| [p.x, p.y]).collect()
}

fn geo_pairs(path: &GeoPath) -> Vec<[f64; 2]> {
    path.points().iter().map(|p| [p.lat, p.lon]).collect()
}

fn geo_path_from_pairs(pairs: &[[f64; 2]]) -> RouteResult<GeoPath> {
    pairs
        .iter()
        .map(|[lat, lon]| GeoPoint::validated(*lat, *lon).map_err(|e| RouteError::Georef(e.into())))
        .collect::<RouteResult<Vec<_>>>()
        .map(GeoPath::new)
}

async fn trace_points(State(config): State<Shared>, multipart: Multipart) -> ApiResult<Json<Value>> {
    let form = read_trace_form(multipart).await?;
    let body = blocking(move || {
        let route = RouteLine::new(&config)?;
        let img = decode_image(&form.image)?;
        let raw = route.trace(&img, form.seed)?;
        let line_found = !raw.is_single();
        let path = if line_found { route.simplify(&raw) } else { raw };
        info!("traced {} points from ({}, {})", path.len(), form.seed.x, form.seed.y);

        Ok(json!({
            "points": pixel_pairs(&path),
            "normalized_points": pixel_pairs(&path.normalized()),
            "width": img.width(),
            "height": img.height(),
            "bounds": path.bounds(),
            "line_found": line_found,
        }))
    })
    .await?;
    Ok(Json(body))
}

async fn trace_svg(State(config): State<Shared>, multipart: Multipart) -> ApiResult<Response> {
    let form = read_trace_form(multipart).await?;
    let svg = blocking(move || {
        let route = RouteLine::new(&config)?;
        let img = decode_image(&form.image)?;
        let path = route.trace_line(&img, form.seed)?;
        Ok(path_to_svg(&path, img.width(), img.height()))
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

#[derive(Debug, Deserialize)]
struct SnapRequest {
    points: Vec<[f64; 2]>,
    radius: Option<f64>,
}

#[derive(Debug, Serialize)]
struct PointsResponse {
    points: Vec<[f64; 2]>,
}

async fn snap_points(
    State(config): State<Shared>,
    payload: Result<Json<SnapRequest>, JsonRejection>,
) -> ApiResult<Json<PointsResponse>> {
    let Json(request) = payload?;
    let points = blocking(move || {
        let path = geo_path_from_pairs(&request.points)?;
        if path.len() < 2 {
            return Err(SnapError::InsufficientPoints(path.len()).into());
        }
        let radius = request.radius.unwrap_or(config.pipeline.snap_radius_m);
        // Built here: the blocking client owns a runtime that must not live on an async worker
        let client = ValhallaClient::new(config.snap.clone())?;
        let snapped = client.snap(&path, radius)?;
        Ok(geo_pairs(&snapped))
    })
    .await?;
    Ok(Json(PointsResponse { points }))
}

#[derive(Debug, Deserialize)]
struct ReferenceInput {
    pixel: [i64; 2],
    geo: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct GeoreferenceRequest {
    points: Vec<[i64; 2]>,
    references: Vec<ReferenceInput>,
    mode: Option<SimilarityMode>,
}

async fn georeference(
    State(config): State<Shared>,
    payload: Result<Json<GeoreferenceRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let body = blocking(move || {
        let path = PixelPath::new(request.points.iter().map(|[x, y]| PixelPoint::new(*x, *y)).collect())
            .ok_or_else(|| RouteError::InvalidInput("points must not be empty".to_string()))?;
        let references: Vec<ReferencePoint> = request
            .references
            .iter()
            .map(|r| ReferencePoint::new(PixelPoint::new(r.pixel[0], r.pixel[1]), GeoPoint::new(r.geo[0], r.geo[1])))
            .collect();

        let solver = CorrespondenceSolver::new(request.mode.unwrap_or(config.pipeline.similarity_mode));
        let transform = solver.solve(&references)?;
        let geo = Georeferencer::new(transform).project(&path);

        Ok(json!({
            "points": geo_pairs(&geo),
            "transform": transform,
            "residuals_m": transform.residuals(&references),
        }))
    })
    .await?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct GpxRequest {
    points: Vec<[f64; 2]>,
    name: Option<String>,
}

async fn export_gpx(payload: Result<Json<GpxRequest>, JsonRejection>) -> ApiResult<Response> {
    let Json(request) = payload?;
    let document = blocking(move || {
        let path = geo_path_from_pairs(&request.points)?;
        write_gpx(&path, request.name.as_deref(), OffsetDateTime::now_utc())
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "application/gpx+xml")], document).into_response())
}

pub fn router(config: AppConfig) -> Router {
    let limit = config.server.max_upload_bytes;
    Router::new()
        .route("/api/points", post(trace_points))
        .route("/api/svg", post(trace_svg))
        .route("/api/snap-points", post(snap_points))
        .route("/api/georeference", post(georeference))
        .route("/api/gpx", post(export_gpx))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(Arc::new(config))
}

/// Serve on an already bound listener until the task is cancelled
pub async fn serve_on(listener: tokio::net::TcpListener, config: AppConfig) -> RouteResult<()> {
    info!("listening on {}", listener.local_addr()?);
    debug!("{}", config.summary());
    axum::serve(listener, router(config)).await?;
    Ok(())
}

pub async fn serve(config: AppConfig) -> RouteResult<()> {
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    serve_on(listener, config).await
}
