//! Analysis configuration
//!
//! `AnalysisConfig` holds the knobs of the pipeline that are safe to change
//! without retraining: how much audio to read and how many chunks to cut it
//! into. The spectrogram geometry is fixed by the network and lives in
//! `types` as constants.

mod io;

pub use io::{load_config, save_config};

use serde::{Deserialize, Serialize};

use crate::decode::DecodeOptions;
use crate::types::{MAX_AUDIO_DURATION_SECS, NUM_CHUNKS, SAMPLE_RATE};

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Decoded audio is truncated to this duration (seconds)
    pub max_duration_secs: f64,

    /// Chunk count for whole-song analysis
    pub num_chunks: usize,

    /// Send all chunk tensors to the engine in one batch call
    pub batch_inference: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: MAX_AUDIO_DURATION_SECS,
            num_chunks: NUM_CHUNKS,
            batch_inference: false,
        }
    }
}

impl AnalysisConfig {
    /// Clamp values to usable ranges
    pub fn validate(&mut self) {
        if !self.max_duration_secs.is_finite() {
            self.max_duration_secs = MAX_AUDIO_DURATION_SECS;
        }
        self.max_duration_secs = self.max_duration_secs.clamp(1.0, 3600.0);
        self.num_chunks = self.num_chunks.clamp(1, 100);
    }

    /// Decoder settings matching this configuration
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            sample_rate: SAMPLE_RATE,
            max_duration_secs: self.max_duration_secs,
        }
    }
}
