//! Application error types

use std::path::PathBuf;

use moodline_core::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model download failed: {0}")]
    DownloadFailed(String),

    #[error("Failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write clip {path}: {reason}")]
    ClipWrite { path: PathBuf, reason: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
