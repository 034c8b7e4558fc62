//! Feature extraction for the emotion network
//!
//! - **Log-mel** (`mel.rs`): waveform chunk -> `[128, n_frames]` dB spectrogram
//! - **Normalization** (`normalize.rs`): spectrogram -> `[1, 128, 431, 3]` input tensor

pub mod mel;
pub mod normalize;

pub use mel::{power_to_db, MelExtractor};
pub use normalize::{fit_frames, prepare_input, zscore, ModelInput};
