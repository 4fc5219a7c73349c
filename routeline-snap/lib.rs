//! Road snapping of geographic polylines.
//!
//! [`RoadSnapper`] is the seam; [`ValhallaClient`] implements it against a
//! Valhalla server's `trace_attributes` endpoint.

pub mod client;
pub mod config;
pub mod error;
pub mod shape;

pub use client::{parse_trace_response, RoadSnapper, ValhallaClient};
pub use config::{SnapConfig, BASE_URL_ENV};
pub use error::{SnapError, SnapResult};
