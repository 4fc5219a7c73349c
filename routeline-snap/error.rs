use crate::shape::ShapeError;

#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    #[error("Need at least 2 points to snap, got {0}")]
    InsufficientPoints(usize),
    #[error("Invalid search radius: {0} m")]
    InvalidRadius(f64),
    #[error("Invalid snap configuration: {0}")]
    InvalidConfig(String),
    #[error("Routing service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Routing service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed routing response: {0}")]
    MalformedResponse(String),
    #[error("Malformed route shape: {0}")]
    Shape(#[from] ShapeError),
}

pub type SnapResult<T> = Result<T, SnapError>;
