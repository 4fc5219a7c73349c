//! Pixel to geographic transforms solved from reference point pairs.

pub mod error;
pub mod project;
pub mod solver;
pub mod transform;

pub use error::{GeorefError, GeorefResult};
pub use project::{project, Georeferencer};
pub use solver::{fit_affine_least_squares, solve_affine, solve_similarity, CorrespondenceSolver};
pub use transform::{AffineTransform, SimilarityMode, SimilarityTransform, Transform};
