//! moodline - song emotion classification
//!
//! Application layer over `moodline-core`:
//!
//! 1. **Decoding** (`audio`): Symphonia decode, mono downmix, rubato resample
//! 2. **Model runtime** (`ml`): ONNX Runtime engine and model artifact cache
//! 3. **Batch** (`batch`): classify many files in parallel into a catalog
//! 4. **Export** (`export`): write each emotion segment as a WAV clip

pub mod audio;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ml;
