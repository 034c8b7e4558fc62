//! Emotion analysis pipeline
//!
//! Drives one recording through the full chain:
//!
//! ```text
//! Waveform -> chunks -> log-mel -> normalize -> engine -> average -> timeline -> segments
//! ```
//!
//! Two entry points select the chunk policy:
//! - [`EmotionPipeline::analyze_song`]: `num_chunks` equal waveform chunks
//! - [`EmotionPipeline::classify_track`]: 431-frame windows over one spectrogram
//!
//! Each call is single-threaded and deterministic. Any chunk failure aborts
//! the whole analysis with the chunk index attached.

use std::ops::Range;

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::aggregate::{average_predictions, probabilities_from_slice, Prediction, Probabilities};
use crate::chunking::{
    fixed_count_ranges, fixed_hop_windows, frame_window_secs, pad_for_hop, sample_range_secs,
    ChunkPolicy,
};
use crate::config::AnalysisConfig;
use crate::decode::{AudioDecoder, AudioSource};
use crate::engine::InferenceEngine;
use crate::error::{EngineError, PipelineError, Result};
use crate::features::{prepare_input, MelExtractor, ModelInput};
use crate::segments::{merge_segments, Segment, TimelineEntry};
use crate::types::{Waveform, MODEL_INPUT_SHAPE, SAMPLE_RATE};

/// Result of analyzing one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    /// Source identifier of the analyzed waveform
    pub source: String,
    /// Duration of the analyzed (possibly truncated) audio
    pub duration_secs: f64,
    pub policy: ChunkPolicy,
    /// Song-level prediction (mean of chunk probabilities)
    pub prediction: Prediction,
    /// Raw probabilities per chunk, in time order
    pub chunk_predictions: Vec<Probabilities>,
    /// One entry per chunk
    pub timeline: Vec<TimelineEntry>,
    /// Timeline merged into same-emotion runs
    pub segments: Vec<Segment>,
}

/// Chunks of one waveform, ready to be turned into model inputs
enum ChunkPlan {
    /// Sample ranges, each with its own spectrogram
    Samples(Vec<Range<usize>>),
    /// Frame windows into one shared spectrogram
    Frames {
        mel: Array2<f32>,
        windows: Vec<Range<usize>>,
    },
}

impl ChunkPlan {
    fn len(&self) -> usize {
        match self {
            ChunkPlan::Samples(ranges) => ranges.len(),
            ChunkPlan::Frames { windows, .. } => windows.len(),
        }
    }

    /// Start and end time of chunk `i` in seconds
    fn span(&self, i: usize, waveform: &Waveform) -> (f64, f64) {
        match self {
            ChunkPlan::Samples(ranges) => sample_range_secs(&ranges[i], waveform.sample_rate),
            ChunkPlan::Frames { mel, windows } => {
                frame_window_secs(&windows[i], mel.ncols(), waveform.duration_secs())
            }
        }
    }

    fn input(&self, i: usize, extractor: &MelExtractor, waveform: &Waveform) -> Result<ModelInput> {
        match self {
            ChunkPlan::Samples(ranges) => {
                let mel = extractor.compute(&waveform.samples[ranges[i].clone()])?;
                prepare_input(mel.view(), i)
            }
            ChunkPlan::Frames { mel, windows } => {
                let window = &windows[i];
                prepare_input(mel.slice(s![.., window.start..window.end]), i)
            }
        }
    }
}

/// Audio-to-emotion pipeline
///
/// Holds the precomputed mel tables, so one pipeline should be reused for
/// many recordings. The inference engine is passed per call and shared.
#[derive(Clone, Default)]
pub struct EmotionPipeline {
    config: AnalysisConfig,
    extractor: MelExtractor,
}

impl EmotionPipeline {
    pub fn new(mut config: AnalysisConfig) -> Self {
        config.validate();
        Self {
            config,
            extractor: MelExtractor::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Whole-song analysis: `num_chunks` equal chunks
    pub fn analyze_song(&self, waveform: &Waveform, engine: &dyn InferenceEngine) -> Result<EmotionAnalysis> {
        self.analyze(waveform, engine, ChunkPolicy::FixedCount(self.config.num_chunks))
    }

    /// Library classification: non-overlapping 431-frame windows
    pub fn classify_track(&self, waveform: &Waveform, engine: &dyn InferenceEngine) -> Result<EmotionAnalysis> {
        self.analyze(waveform, engine, ChunkPolicy::FixedHop)
    }

    /// Decode `source` and analyze it with `policy`
    pub fn analyze_source(
        &self,
        decoder: &dyn AudioDecoder,
        source: &AudioSource,
        engine: &dyn InferenceEngine,
        policy: ChunkPolicy,
    ) -> Result<EmotionAnalysis> {
        // Fail before decoding when the engine cannot serve the request
        check_engine(engine)?;
        let waveform = decoder.decode(source, &self.config.decode_options())?;
        self.analyze(&waveform, engine, policy)
    }

    /// Analyze a decoded waveform with an explicit chunk policy
    pub fn analyze(
        &self,
        waveform: &Waveform,
        engine: &dyn InferenceEngine,
        policy: ChunkPolicy,
    ) -> Result<EmotionAnalysis> {
        check_engine(engine)?;
        check_waveform(waveform)?;

        let plan = self.plan(waveform, policy)?;
        log::info!(
            "analyze: {} ({:.1}s) -> {} chunks [{}] via {}",
            waveform.source,
            waveform.duration_secs(),
            plan.len(),
            policy.display_name(),
            engine.name()
        );

        let chunk_predictions = if self.config.batch_inference {
            self.infer_batch(&plan, waveform, engine)?
        } else {
            self.infer_sequential(&plan, waveform, engine)?
        };

        let prediction = average_predictions(&chunk_predictions)?;

        let timeline: Vec<TimelineEntry> = chunk_predictions
            .iter()
            .enumerate()
            .map(|(i, &probs)| {
                let (start, end) = plan.span(i, waveform);
                TimelineEntry::new(start, end, Prediction::from_probabilities(probs).emotion)
            })
            .collect();
        let segments = merge_segments(&timeline);

        log::info!(
            "analyze: {} -> {} ({:.1}%), {} segments",
            waveform.source,
            prediction.emotion,
            prediction.confidence * 100.0,
            segments.len()
        );

        Ok(EmotionAnalysis {
            source: waveform.source.clone(),
            duration_secs: waveform.duration_secs(),
            policy,
            prediction,
            chunk_predictions,
            timeline,
            segments,
        })
    }

    fn plan(&self, waveform: &Waveform, policy: ChunkPolicy) -> Result<ChunkPlan> {
        match policy {
            ChunkPolicy::FixedCount(n) => Ok(ChunkPlan::Samples(fixed_count_ranges(waveform.len(), n)?)),
            ChunkPolicy::FixedHop => {
                let mel = self.extractor.compute(&pad_for_hop(&waveform.samples))?;
                let windows = fixed_hop_windows(mel.ncols())?;
                Ok(ChunkPlan::Frames { mel, windows })
            }
        }
    }

    fn infer_sequential(
        &self,
        plan: &ChunkPlan,
        waveform: &Waveform,
        engine: &dyn InferenceEngine,
    ) -> Result<Vec<Probabilities>> {
        (0..plan.len())
            .map(|chunk| {
                let input = plan.input(chunk, &self.extractor, waveform)?;
                predict_chunk(engine, chunk, &input)
            })
            .collect()
    }

    fn infer_batch(
        &self,
        plan: &ChunkPlan,
        waveform: &Waveform,
        engine: &dyn InferenceEngine,
    ) -> Result<Vec<Probabilities>> {
        let inputs = (0..plan.len())
            .map(|chunk| plan.input(chunk, &self.extractor, waveform))
            .collect::<Result<Vec<_>>>()?;

        let raw = match engine.predict_batch(&inputs) {
            Ok(raw) => raw,
            Err(EngineError::Batch { index, source }) => {
                return Err(PipelineError::Inference {
                    chunk: index,
                    source: *source,
                })
            }
            Err(e) => {
                // The call failed as a whole; run each chunk to find the one at fault
                log::warn!(
                    "analyze: batch inference on {} failed ({}), retrying chunk by chunk",
                    waveform.source,
                    e
                );
                return inputs
                    .iter()
                    .enumerate()
                    .map(|(chunk, input)| predict_chunk(engine, chunk, input))
                    .collect();
            }
        };
        if raw.len() != inputs.len() {
            return Err(PipelineError::shape("batch output count", inputs.len(), raw.len()));
        }

        raw.iter()
            .enumerate()
            .map(|(chunk, probs)| probabilities_from_slice(chunk, probs))
            .collect()
    }
}

fn predict_chunk(engine: &dyn InferenceEngine, chunk: usize, input: &ModelInput) -> Result<Probabilities> {
    let raw = engine
        .predict(input)
        .map_err(|source| PipelineError::Inference { chunk, source })?;
    log::debug!("analyze: chunk {} -> {:?}", chunk, raw);
    probabilities_from_slice(chunk, &raw)
}

fn check_engine(engine: &dyn InferenceEngine) -> Result<()> {
    if !engine.is_ready() {
        let reason = engine
            .unavailable_reason()
            .unwrap_or_else(|| format!("{} is not loaded", engine.name()));
        return Err(PipelineError::EngineUnavailable(reason));
    }
    let shape = engine.input_shape();
    if shape != MODEL_INPUT_SHAPE {
        return Err(PipelineError::shape("engine input", MODEL_INPUT_SHAPE, shape));
    }
    Ok(())
}

fn check_waveform(waveform: &Waveform) -> Result<()> {
    if waveform.is_empty() {
        return Err(PipelineError::EmptyInput(format!("{} has no samples", waveform.source)));
    }
    if waveform.sample_rate != SAMPLE_RATE {
        return Err(PipelineError::shape("sample rate", SAMPLE_RATE, waveform.sample_rate));
    }
    if let Some(idx) = waveform.first_non_finite() {
        return Err(PipelineError::decode(
            &waveform.source,
            format!("non-finite sample at index {}", idx),
        ));
    }
    Ok(())
}
