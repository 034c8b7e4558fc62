//! Common types for moodline
//!
//! Fixed analysis constants, the emotion label set and the waveform container
//! shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sample rate every waveform is decoded to before analysis (44.1kHz)
pub const SAMPLE_RATE: u32 = 44100;

/// Number of mel bands (frequency axis of the spectrogram)
pub const N_MELS: usize = 128;

/// FFT window size for the STFT
pub const N_FFT: usize = 2048;

/// STFT hop length in samples
pub const HOP_LENGTH: usize = 1024;

/// Number of spectrogram frames the network was trained on.
/// 431 frames at hop 1024 is exactly 10 seconds of 44.1kHz audio.
pub const TARGET_FRAMES: usize = 431;

/// Channel count of the network input (single spectrogram replicated 3x)
pub const NUM_CHANNELS: usize = 3;

/// Default number of chunks for whole-song analysis
pub const NUM_CHUNKS: usize = 10;

/// Default maximum decoded duration in seconds
pub const MAX_AUDIO_DURATION_SECS: f64 = 100.0;

/// Added to the standard deviation during z-score normalization
pub const NORM_EPSILON: f32 = 1e-6;

/// Network input shape: [batch, mel bands, frames, channels]
pub const MODEL_INPUT_SHAPE: [usize; 4] = [1, N_MELS, TARGET_FRAMES, NUM_CHANNELS];

/// Number of emotion classes
pub const NUM_EMOTIONS: usize = 5;

/// Emotion classes in model output order.
///
/// The discriminants are the output indices of the network. Reordering these
/// variants mislabels every prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(usize)]
pub enum Emotion {
    Calm = 0,
    Energetic = 1,
    Happy = 2,
    Romantic = 3,
    Sad = 4,
}

impl Emotion {
    /// All emotions in model output order
    pub const ALL: [Emotion; NUM_EMOTIONS] = [
        Emotion::Calm,
        Emotion::Energetic,
        Emotion::Happy,
        Emotion::Romantic,
        Emotion::Sad,
    ];

    /// Convert from output index (0-4) to Emotion
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Output index of this emotion
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name, identical to the training label
    pub fn name(self) -> &'static str {
        match self {
            Emotion::Calm => "Calm",
            Emotion::Energetic => "Energetic",
            Emotion::Happy => "Happy",
            Emotion::Romantic => "Romantic",
            Emotion::Sad => "Sad",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown emotion: {}", s))
    }
}

/// Decoded mono audio, owned by one analysis request
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Identifier of the audio source (path or upload name), used in errors
    pub source: String,
    /// Mono samples
    pub samples: Vec<f32>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(source: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            source: source.into(),
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples between two timestamps, clamped to the waveform
    pub fn slice_secs(&self, start_secs: f64, end_secs: f64) -> &[f32] {
        let sr = self.sample_rate as f64;
        let start = ((start_secs.max(0.0) * sr) as usize).min(self.samples.len());
        let end = ((end_secs.max(0.0) * sr) as usize).clamp(start, self.samples.len());
        &self.samples[start..end]
    }

    /// Index of the first NaN/Inf sample, if any
    pub fn first_non_finite(&self) -> Option<usize> {
        self.samples.iter().position(|s| !s.is_finite())
    }
}
