//! Library classification over many files
//!
//! Each file is decoded and classified with the fixed-hop policy on a rayon
//! worker; the engine is shared by all workers. A failing file is recorded
//! and skipped, it never aborts the batch. Results are filed into an
//! `EmotionCatalog` in input order, so the output does not depend on
//! scheduling.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Instant;

use moodline_core::{
    AudioDecoder, AudioSource, ChunkPolicy, EmotionAnalysis, EmotionCatalog, EmotionPipeline,
    InferenceEngine,
};
use rayon::prelude::*;
use serde::Serialize;

/// Progress messages sent while a batch runs
#[derive(Debug, Clone)]
pub enum BatchProgress {
    Started { total: usize },
    TrackStarted { name: String, index: usize, total: usize },
    TrackCompleted { name: String, index: usize, success: bool },
    AllComplete { classified: usize, failed: usize },
}

/// A file that could not be classified
#[derive(Debug, Clone, Serialize)]
pub struct TrackFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of classifying a set of files
#[derive(Debug, Default, Serialize)]
pub struct LibraryScan {
    pub catalog: EmotionCatalog,
    pub analyses: Vec<EmotionAnalysis>,
    pub failures: Vec<TrackFailure>,
}

/// Batch settings
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Parallel workers (1-16)
    pub workers: usize,
    pub policy: ChunkPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            policy: ChunkPolicy::FixedHop,
        }
    }
}

/// Classify `paths` and group them by predicted emotion
pub fn classify_files(
    paths: &[PathBuf],
    pipeline: &EmotionPipeline,
    decoder: &dyn AudioDecoder,
    engine: &dyn InferenceEngine,
    options: BatchOptions,
    progress_tx: Option<&Sender<BatchProgress>>,
) -> LibraryScan {
    let start_time = Instant::now();
    let total = paths.len();
    let send = |msg: BatchProgress| {
        if let Some(tx) = progress_tx {
            let _ = tx.send(msg);
        }
    };

    let workers = options.workers.clamp(1, 16);
    log::info!("classify_files: {} files on {} workers", total, workers);
    send(BatchProgress::Started { total });

    let run = || -> Vec<(AudioSource, Result<EmotionAnalysis, String>)> {
        paths
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                let source = AudioSource::Path(path.clone());
                let name = source.display_name();
                send(BatchProgress::TrackStarted {
                    name: name.clone(),
                    index,
                    total,
                });

                let result = pipeline
                    .analyze_source(decoder, &source, engine, options.policy)
                    .map_err(|e| e.to_string());
                if let Err(ref e) = result {
                    log::warn!("classify_files: {} failed: {}", source.id(), e);
                }

                send(BatchProgress::TrackCompleted {
                    name,
                    index,
                    success: result.is_ok(),
                });
                (source, result)
            })
            .collect()
    };

    let results = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
            log::warn!("classify_files: thread pool unavailable ({}), using global pool", e);
            run()
        }
    };

    let mut scan = LibraryScan::default();
    for (source, result) in results {
        match result {
            Ok(analysis) => {
                scan.catalog
                    .insert(source.id(), source.display_name(), &analysis.prediction);
                scan.analyses.push(analysis);
            }
            Err(error) => scan.failures.push(TrackFailure {
                id: source.id(),
                error,
            }),
        }
    }

    log::info!(
        "classify_files: Complete in {:.1}s - {} classified, {} failed",
        start_time.elapsed().as_secs_f64(),
        scan.analyses.len(),
        scan.failures.len()
    );
    send(BatchProgress::AllComplete {
        classified: scan.analyses.len(),
        failed: scan.failures.len(),
    });

    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SymphoniaDecoder;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use moodline_core::{Emotion, EngineError, ModelInput};
    use std::path::Path;
    use std::sync::mpsc;

    /// Always answers Romantic
    struct FixedEngine;

    impl InferenceEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict(&self, _input: &ModelInput) -> Result<Vec<f32>, EngineError> {
            Ok(vec![0.1, 0.1, 0.1, 0.6, 0.1])
        }
    }

    fn write_tone(path: &Path, secs: f32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..(44100.0 * secs) as usize {
            let t = i as f32 / 44100.0;
            writer.write_sample(0.3 * (2.0 * std::f32::consts::PI * 330.0 * t).sin()).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_batch_catalog_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("first.wav");
        let b = dir.path().join("second.wav");
        let bad = dir.path().join("broken.mp3");
        write_tone(&a, 2.0);
        write_tone(&b, 12.0);
        std::fs::write(&bad, b"not audio at all").unwrap();

        let (tx, rx) = mpsc::channel();
        let scan = classify_files(
            &[a.clone(), bad.clone(), b.clone()],
            &EmotionPipeline::default(),
            &SymphoniaDecoder::new(),
            &FixedEngine,
            BatchOptions { workers: 2, ..Default::default() },
            Some(&tx),
        );
        drop(tx);

        assert_eq!(scan.analyses.len(), 2);
        assert_eq!(scan.failures.len(), 1);
        assert_eq!(scan.failures[0].id, bad.display().to_string());

        let names: Vec<&str> = scan
            .catalog
            .tracks(Emotion::Romantic)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, ["first", "second"]);

        // 12s of audio -> 2 hop windows
        assert_eq!(scan.analyses[1].timeline.len(), 2);

        let messages: Vec<BatchProgress> = rx.iter().collect();
        assert!(matches!(messages.first(), Some(BatchProgress::Started { total: 3 })));
        assert!(matches!(
            messages.last(),
            Some(BatchProgress::AllComplete { classified: 2, failed: 1 })
        ));
        let completed = messages
            .iter()
            .filter(|m| matches!(m, BatchProgress::TrackCompleted { .. }))
            .count();
        assert_eq!(completed, 3);
    }

    #[test]
    fn test_empty_batch() {
        let scan = classify_files(
            &[],
            &EmotionPipeline::default(),
            &SymphoniaDecoder::new(),
            &FixedEngine,
            BatchOptions::default(),
            None,
        );
        assert!(scan.catalog.is_empty());
        assert!(scan.failures.is_empty());
    }
}
