use routeline_core::CoordinateError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeorefError {
    #[error("Need at least {required} reference points, got {got}")]
    InsufficientPoints { required: usize, got: usize },
    #[error("Degenerate reference configuration: {0}")]
    DegenerateConfiguration(String),
    #[error("Invalid reference coordinate: {0}")]
    InvalidGeoPoint(#[from] CoordinateError),
    #[error("Transform is not invertible")]
    NotInvertible,
}

pub type GeorefResult<T> = Result<T, GeorefError>;
