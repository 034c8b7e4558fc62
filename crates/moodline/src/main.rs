//! moodline - classify the emotion of songs from their audio
//!
//! ## Commands
//!
//! - `analyze <file>`: whole-song analysis with a per-chunk emotion timeline
//! - `classify <file>...`: library classification grouped by emotion
//!
//! Set RUST_LOG=debug for verbose output.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use moodline::audio::SymphoniaDecoder;
use moodline::batch::{classify_files, BatchOptions, LibraryScan};
use moodline::cli::{Cli, Command};
use moodline::config::{default_config_path, load_config, AppConfig};
use moodline::export::write_segment_clips;
use moodline::ml::{shared_engine, ModelManager, OrtEngine};
use moodline_core::{AudioDecoder, AudioSource, EmotionAnalysis, EmotionPipeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Cli::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path);
    if let Some(model) = &args.model {
        config.model.path = Some(model.clone());
    }

    log::info!("moodline starting up (config {:?})", config_path);

    match &args.command {
        Command::Analyze { file, export_segments } => {
            let engine = load_engine(&config)?;
            run_analyze(&args, &config, engine, file, export_segments.as_deref())
        }
        Command::Classify { files, workers } => {
            let engine = load_engine(&config)?;
            run_classify(&args, &config, engine, files, *workers)
        }
    }
}

fn load_engine(config: &AppConfig) -> Result<Arc<OrtEngine>> {
    let manager = ModelManager::new();
    shared_engine(&manager, &config.model).context("Failed to load the emotion model")
}

fn run_analyze(
    args: &Cli,
    config: &AppConfig,
    engine: Arc<OrtEngine>,
    file: &std::path::Path,
    export_dir: Option<&std::path::Path>,
) -> Result<()> {
    let pipeline = EmotionPipeline::new(config.analysis.clone());
    let source = AudioSource::Path(file.to_path_buf());

    let waveform = SymphoniaDecoder::new().decode(&source, &pipeline.config().decode_options())?;
    let analysis = pipeline.analyze_song(&waveform, &engine)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }

    if let Some(dir) = export_dir {
        let clips = write_segment_clips(&waveform, &analysis.segments, dir, &source.display_name())?;
        println!("Wrote {} segment clips to {:?}", clips.len(), dir);
    }
    Ok(())
}

fn run_classify(
    args: &Cli,
    config: &AppConfig,
    engine: Arc<OrtEngine>,
    files: &[std::path::PathBuf],
    workers: Option<usize>,
) -> Result<()> {
    let pipeline = EmotionPipeline::new(config.analysis.clone());
    let options = BatchOptions {
        workers: workers.unwrap_or_else(|| BatchOptions::default().workers),
        ..Default::default()
    };

    let scan = classify_files(files, &pipeline, &SymphoniaDecoder::new(), &engine, options, None);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
    } else {
        print_scan(&scan);
    }

    if !scan.failures.is_empty() && scan.analyses.is_empty() {
        anyhow::bail!("No files could be classified");
    }
    Ok(())
}

fn print_analysis(analysis: &EmotionAnalysis) {
    println!("{} ({:.1}s)", analysis.source, analysis.duration_secs);
    println!(
        "Emotion: {} ({:.1}%)",
        analysis.prediction.emotion,
        analysis.prediction.confidence * 100.0
    );
    println!();
    for (emotion, probability) in analysis.prediction.ranked() {
        println!("  {:<10} {:>5.1}%", emotion.name(), probability * 100.0);
    }
    println!();
    println!("Timeline:");
    for segment in &analysis.segments {
        println!(
            "  {:>6.1}s - {:>6.1}s  {}",
            segment.start_secs, segment.end_secs, segment.emotion
        );
    }
}

fn print_scan(scan: &LibraryScan) {
    for (emotion, tracks) in scan.catalog.iter() {
        println!("{} ({})", emotion, tracks.len());
        for track in tracks {
            println!("  {:<40} {:>5.1}%", track.name, track.confidence * 100.0);
        }
    }
    for failure in &scan.failures {
        eprintln!("Failed: {}: {}", failure.id, failure.error);
    }
}
