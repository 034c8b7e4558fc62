//! Segment clip export
//!
//! Writes the audio of each emotion segment as its own mono 32-bit float WAV:
//! `{base_name}_{index:02}_{Emotion}.wav`.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use moodline_core::{Segment, Waveform};

use crate::error::{AppError, Result};

/// Write one WAV per segment into `dir`, returning the written paths in
/// segment order. Segments with no samples are skipped.
pub fn write_segment_clips(
    waveform: &Waveform,
    segments: &[Segment],
    dir: &Path,
    base_name: &str,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;

    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let base_name = sanitize_filename(base_name);

    let mut written = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let range = segment.sample_range(waveform.sample_rate);
        let end = range.end.min(waveform.len());
        let start = range.start.min(end);
        let clip = &waveform.samples[start..end];
        if clip.is_empty() {
            log::debug!("write_segment_clips: segment {} is empty, skipping", index);
            continue;
        }

        let path = dir.join(format!("{}_{:02}_{}.wav", base_name, index, segment.emotion));
        let clip_err = |e: hound::Error| AppError::ClipWrite {
            path: path.clone(),
            reason: e.to_string(),
        };

        let mut writer = WavWriter::create(&path, spec).map_err(clip_err)?;
        for &sample in clip {
            writer.write_sample(sample).map_err(clip_err)?;
        }
        writer.finalize().map_err(clip_err)?;

        log::info!(
            "write_segment_clips: {:?} ({} {:.1}s-{:.1}s)",
            path,
            segment.emotion,
            segment.start_secs,
            segment.end_secs
        );
        written.push(path);
    }

    Ok(written)
}

/// Replace characters that are invalid in file names
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodline_core::Emotion;

    #[test]
    fn test_clips_match_segments() {
        let dir = tempfile::tempdir().unwrap();
        let samples: Vec<f32> = (0..44100 * 3).map(|i| (i % 100) as f32 / 100.0).collect();
        let waveform = Waveform::new("song", samples, 44100);
        let segments = [
            Segment { emotion: Emotion::Happy, start_secs: 0.0, end_secs: 2.0 },
            Segment { emotion: Emotion::Sad, start_secs: 2.0, end_secs: 3.0 },
        ];

        let paths = write_segment_clips(&waveform, &segments, dir.path(), "My: Song").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("My_ Song_00_Happy.wav"));
        assert!(paths[1].ends_with("My_ Song_01_Sad.wav"));

        let reader = hound::WavReader::open(&paths[1]).unwrap();
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.spec().channels, 1);
        let clip: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(clip.len(), 44100);
        assert_eq!(clip[0], waveform.samples[88200]);
    }

    #[test]
    fn test_out_of_range_segment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let waveform = Waveform::new("short", vec![0.1; 1000], 44100);
        let segments = [Segment { emotion: Emotion::Calm, start_secs: 5.0, end_secs: 6.0 }];
        let paths = write_segment_clips(&waveform, &segments, dir.path(), "short").unwrap();
        assert!(paths.is_empty());
    }
}
