#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Pixel ({x}, {y}) outside image {width}x{height}")]
    OutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid tracer configuration: {0}")]
    InvalidConfig(String),
}

pub type TraceResult<T> = Result<T, TraceError>;
