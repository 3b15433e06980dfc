//! Error types shared across vidredact crates.

use std::path::PathBuf;

/// Top-level error type for vidredact operations.
///
/// Everything except [`RedactError::Config`] is scoped to a single
/// `(input, output, annotation)` triplet and never aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum RedactError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Open error: {message}")]
    Open { message: String },

    #[error("Frame I/O error: {message}")]
    FrameIo { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using RedactError.
pub type RedactResult<T> = Result<T, RedactError>;

impl RedactError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open {
            message: msg.into(),
        }
    }

    pub fn frame_io(msg: impl Into<String>) -> Self {
        Self::FrameIo {
            message: msg.into(),
        }
    }

    /// Stable lowercase label for reports and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::FileNotFound { .. } => "not_found",
            Self::Parse { .. } => "parse",
            Self::Open { .. } => "open",
            Self::FrameIo { .. } | Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
