use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot open video source {path}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Sampling interval must be at least 1")]
    InvalidInterval,
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Detector failed on {path}: {reason}")]
    Detector { path: PathBuf, reason: String },
    #[error("Cannot read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Cannot write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("XML error: {0}")]
    Xml(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error only affects a single frame and the batch may go on.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            PipelineError::Detector { .. }
                | PipelineError::ImageRead { .. }
                | PipelineError::ImageWrite { .. }
                | PipelineError::Xml(_)
                | PipelineError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
