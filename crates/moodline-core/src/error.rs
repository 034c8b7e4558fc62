//! Pipeline error types

use thiserror::Error;

/// Errors raised by an inference engine implementation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Run(String),

    #[error("Unexpected model output: {0}")]
    Output(String),

    /// One input of a batch call failed
    #[error("Batch input {index} failed: {source}")]
    Batch {
        index: usize,
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Attach the position of the failing input within a batch
    pub fn at_input(self, index: usize) -> Self {
        Self::Batch {
            index,
            source: Box::new(self),
        }
    }
}

/// Errors that can occur while analyzing one audio source
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source could not be decoded (corrupt, unsupported, empty file)
    #[error("Failed to decode {source_id}: {reason}")]
    DecodeFailure { source_id: String, reason: String },

    /// A tensor or vector does not have the shape the network was trained on
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    /// The source decoded but contains no usable signal
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The inference engine is not loaded or not reachable
    #[error("Inference engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Feature extraction produced NaN or infinite values
    #[error("Non-finite values in chunk {chunk}")]
    NonFinite { chunk: usize },

    #[error("Inference failed for chunk {chunk}")]
    Inference {
        chunk: usize,
        #[source]
        source: EngineError,
    },

    #[error("Invalid prediction for chunk {chunk}: {reason}")]
    InvalidPrediction { chunk: usize, reason: String },
}

impl PipelineError {
    pub fn decode(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            source_id: source.into(),
            reason: reason.into(),
        }
    }

    pub fn shape(what: &'static str, expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        Self::ShapeMismatch {
            what,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Chunk index the error refers to, for per-chunk failures
    pub fn chunk(&self) -> Option<usize> {
        match self {
            Self::NonFinite { chunk }
            | Self::Inference { chunk, .. }
            | Self::InvalidPrediction { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_context() {
        let err = PipelineError::Inference {
            chunk: 3,
            source: EngineError::Run("boom".into()),
        };
        assert_eq!(err.chunk(), Some(3));
        assert_eq!(PipelineError::EmptyInput("x".into()).chunk(), None);
    }

    #[test]
    fn test_batch_error_keeps_inner_error() {
        let err = EngineError::Run("out of memory".into()).at_input(4);
        assert_eq!(err.to_string(), "Batch input 4 failed: Inference failed: out of memory");
        assert!(matches!(err, EngineError::Batch { index: 4, ref source } if matches!(**source, EngineError::Run(_))));
    }

    #[test]
    fn test_decode_failure_names_source() {
        let err = PipelineError::decode("song.mp3", "no audio track");
        assert_eq!(err.to_string(), "Failed to decode song.mp3: no audio track");
    }
}
