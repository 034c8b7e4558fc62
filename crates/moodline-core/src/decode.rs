//! Audio decoder seam
//!
//! Turns an audio source (a file path or an uploaded byte buffer) into a
//! mono waveform at the analysis sample rate. The concrete decoder lives in
//! the application crate; the core only depends on this trait.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Waveform, MAX_AUDIO_DURATION_SECS, SAMPLE_RATE};

/// Where the audio comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Audio file on disk
    Path(PathBuf),
    /// In-memory upload; `extension` is a container hint like "mp3"
    Bytes {
        id: String,
        data: Vec<u8>,
        extension: Option<String>,
    },
}

impl AudioSource {
    /// Identifier used in logs and errors
    pub fn id(&self) -> String {
        match self {
            AudioSource::Path(path) => path.display().to_string(),
            AudioSource::Bytes { id, .. } => id.clone(),
        }
    }

    /// Container hint derived from the file extension
    pub fn extension(&self) -> Option<String> {
        match self {
            AudioSource::Path(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            AudioSource::Bytes { extension, .. } => extension.clone(),
        }
    }

    /// Display name without directory or extension
    pub fn display_name(&self) -> String {
        match self {
            AudioSource::Path(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| path.display().to_string()),
            AudioSource::Bytes { id, .. } => id
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| id.clone()),
        }
    }
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        AudioSource::Path(path)
    }
}

/// Decode parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Output sample rate
    pub sample_rate: u32,
    /// Decoded audio is truncated to this many seconds
    pub max_duration_secs: f64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            max_duration_secs: MAX_AUDIO_DURATION_SECS,
        }
    }
}

impl DecodeOptions {
    /// Maximum number of output samples
    pub fn max_samples(&self) -> usize {
        (self.sample_rate as f64 * self.max_duration_secs.max(0.0)) as usize
    }
}

/// Decodes an audio source to a mono waveform
///
/// Any failure (missing file, unsupported container, corrupt stream, no
/// samples) is reported as `PipelineError::DecodeFailure` naming the source.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, source: &AudioSource, options: &DecodeOptions) -> Result<Waveform>;
}
