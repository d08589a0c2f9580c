//! Error types shared by ingestion, synthesis, parsing and dispatch.

use thiserror::Error;

/// Result type for batch-planning operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing directory, exposure or driver file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed header value, log row or driver line.
    #[error("parse error at {location}: {message}\n  line: {line:?}")]
    Parse {
        location: String,
        line: String,
        message: String,
    },

    /// Missing required folder or parameter with no derivable default.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FITS error: {0}")]
    Fitsio(#[from] fitsio::errors::Error),

    #[error("log table error: {0}")]
    Table(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn parse(
        location: impl Into<String>,
        line: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Parse {
            location: location.into(),
            line: line.into(),
            message: message.into(),
        }
    }
}
