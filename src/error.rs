// src/error.rs - Errors at the I/O boundary
use thiserror::Error;

/// Failures at the crate's I/O boundary. The analysis core itself never fails.
#[derive(Debug, Error)]
pub enum CoachError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed feed record on line {line}: {source}")]
    FeedParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
