//! moodline core - audio to emotion inference pipeline
//!
//! Classifies the emotional content of a song from its audio signal with a
//! pretrained CNN applied to log-mel spectrograms.
//!
//! # Architecture
//!
//! - **Features** (`features`): log-mel spectrogram and input normalization
//! - **Chunking** (`chunking`): fixed-count and fixed-hop windowing
//! - **Aggregation** (`aggregate`): mean of chunk probabilities, arg-max label
//! - **Segments** (`segments`): timeline merged into same-emotion runs
//! - **Engine** (`engine`): inference trait and process-wide engine cell
//! - **Decode** (`decode`): audio decoder trait
//! - **Pipeline** (`pipeline`): drives one waveform through all of the above
//! - **Catalog** (`catalog`): classified tracks grouped by emotion
//!
//! Decoding and the ONNX runtime live in the `moodline` crate.

pub mod aggregate;
pub mod catalog;
pub mod chunking;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod segments;
pub mod types;

pub use aggregate::{average_predictions, Prediction, Probabilities};
pub use catalog::{CatalogEntry, EmotionCatalog};
pub use chunking::ChunkPolicy;
pub use config::AnalysisConfig;
pub use decode::{AudioDecoder, AudioSource, DecodeOptions};
pub use engine::{EngineCell, InferenceEngine};
pub use error::{EngineError, PipelineError, Result};
pub use features::ModelInput;
pub use pipeline::{EmotionAnalysis, EmotionPipeline};
pub use segments::{merge_segments, Segment, TimelineEntry};
pub use types::{Emotion, Waveform};
