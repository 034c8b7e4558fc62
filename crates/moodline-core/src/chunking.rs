//! Chunk scheduling
//!
//! Two windowing policies turn one recording into several inference units:
//!
//! - **Fixed count** (whole-song analysis): the waveform is cut into `n`
//!   equal, contiguous sample ranges. `len / n` truncation drops the remainder
//!   samples at the end.
//! - **Fixed hop** (library classification): one spectrogram for the whole
//!   waveform, cut into non-overlapping windows of `TARGET_FRAMES` frames. The
//!   last window may be short and is zero-padded by the normalizer.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{NUM_CHUNKS, N_FFT, TARGET_FRAMES};

/// Windowing policy for splitting a recording into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// `n` equal waveform chunks
    FixedCount(usize),
    /// `TARGET_FRAMES`-frame windows over the full spectrogram
    FixedHop,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        ChunkPolicy::FixedCount(NUM_CHUNKS)
    }
}

impl ChunkPolicy {
    pub fn display_name(&self) -> &'static str {
        match self {
            ChunkPolicy::FixedCount(_) => "Whole-song deep analysis",
            ChunkPolicy::FixedHop => "Library classification",
        }
    }
}

/// Sample ranges for the fixed-count policy.
///
/// When a chunk would be shorter than one FFT window the whole waveform is
/// returned as a single chunk instead.
pub fn fixed_count_ranges(total_len: usize, chunk_count: usize) -> Result<Vec<Range<usize>>> {
    if total_len == 0 {
        return Err(PipelineError::EmptyInput("waveform has no samples".to_string()));
    }
    if chunk_count == 0 {
        return Err(PipelineError::EmptyInput("chunk count is zero".to_string()));
    }

    let chunk_len = total_len / chunk_count;
    if chunk_len < N_FFT {
        log::debug!(
            "fixed_count_ranges: {} samples too short for {} chunks, using one chunk",
            total_len,
            chunk_count
        );
        return Ok(vec![0..total_len]);
    }

    Ok((0..chunk_count)
        .map(|i| i * chunk_len..(i + 1) * chunk_len)
        .collect())
}

/// Frame ranges for the fixed-hop policy: `ceil(n_frames / TARGET_FRAMES)`
/// windows, the last one possibly shorter than `TARGET_FRAMES`.
pub fn fixed_hop_windows(n_frames: usize) -> Result<Vec<Range<usize>>> {
    if n_frames == 0 {
        return Err(PipelineError::EmptyInput("spectrogram has no frames".to_string()));
    }

    Ok((0..n_frames)
        .step_by(TARGET_FRAMES)
        .map(|start| start..(start + TARGET_FRAMES).min(n_frames))
        .collect())
}

/// Zero-pad a waveform to at least `TARGET_FRAMES` samples before the
/// fixed-hop spectrogram is computed.
pub fn pad_for_hop(samples: &[f32]) -> Vec<f32> {
    let mut padded = samples.to_vec();
    if padded.len() < TARGET_FRAMES {
        padded.resize(TARGET_FRAMES, 0.0);
    }
    padded
}

/// Time span in seconds of a sample range
pub fn sample_range_secs(range: &Range<usize>, sample_rate: u32) -> (f64, f64) {
    let sr = sample_rate as f64;
    (range.start as f64 / sr, range.end as f64 / sr)
}

/// Time span in seconds of a frame window.
///
/// The `n_frames` frames are spread evenly over the audio duration. A centred
/// STFT of a length that is a multiple of `HOP_LENGTH` ends with a frame
/// centred on the last sample, and that frame may land alone in the final
/// window; spreading keeps every window non-empty and the last one ending
/// exactly at `duration_secs`.
pub fn frame_window_secs(window: &Range<usize>, n_frames: usize, duration_secs: f64) -> (f64, f64) {
    let n_frames = n_frames.max(1) as f64;
    let start = (window.start as f64 / n_frames).min(1.0) * duration_secs;
    let end = (window.end as f64 / n_frames).min(1.0) * duration_secs;
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HOP_LENGTH, SAMPLE_RATE};

    #[test]
    fn test_fixed_count_equal_chunks() {
        let ranges = fixed_count_ranges(4_410_000, 10).unwrap();
        assert_eq!(ranges.len(), 10);
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.len(), 441_000);
            assert_eq!(r.start, i * 441_000);
        }
    }

    #[test]
    fn test_fixed_count_drops_remainder() {
        let ranges = fixed_count_ranges(100_009, 10).unwrap();
        assert_eq!(ranges.len(), 10);
        assert_eq!(ranges.last().unwrap().end, 100_000);
        assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn test_fixed_count_short_audio_is_one_chunk() {
        let ranges = fixed_count_ranges(5000, 10).unwrap();
        assert_eq!(ranges, vec![0..5000]);

        let ranges = fixed_count_ranges(3, 10).unwrap();
        assert_eq!(ranges, vec![0..3]);
    }

    #[test]
    fn test_fixed_count_empty_is_error() {
        assert!(matches!(fixed_count_ranges(0, 10), Err(PipelineError::EmptyInput(_))));
        assert!(matches!(fixed_count_ranges(100, 0), Err(PipelineError::EmptyInput(_))));
    }

    #[test]
    fn test_fixed_hop_window_count() {
        assert_eq!(fixed_hop_windows(1).unwrap(), vec![0..1]);
        assert_eq!(fixed_hop_windows(TARGET_FRAMES).unwrap().len(), 1);
        let windows = fixed_hop_windows(TARGET_FRAMES + 1).unwrap();
        assert_eq!(windows, vec![0..TARGET_FRAMES, TARGET_FRAMES..TARGET_FRAMES + 1]);
        assert_eq!(fixed_hop_windows(10 * TARGET_FRAMES).unwrap().len(), 10);
        assert!(fixed_hop_windows(0).is_err());
    }

    #[test]
    fn test_pad_for_hop() {
        assert_eq!(pad_for_hop(&[1.0; 10]).len(), TARGET_FRAMES);
        assert_eq!(pad_for_hop(&[1.0; 5000]).len(), 5000);
    }

    #[test]
    fn test_frame_window_secs_cover_duration() {
        let (start, end) = frame_window_secs(&(0..TARGET_FRAMES), TARGET_FRAMES, 4.0);
        assert_eq!((start, end), (0.0, 4.0));

        // 431 * 1024 samples: 432 centred frames, the last window holds one frame
        let len = TARGET_FRAMES * HOP_LENGTH;
        let n_frames = 1 + len / HOP_LENGTH;
        let duration = len as f64 / SAMPLE_RATE as f64;
        let windows = fixed_hop_windows(n_frames).unwrap();
        assert_eq!(windows.len(), 2);

        let spans: Vec<_> = windows
            .iter()
            .map(|w| frame_window_secs(w, n_frames, duration))
            .collect();
        assert_eq!(spans[0].0, 0.0);
        assert_eq!(spans[0].1, spans[1].0);
        assert!(spans.iter().all(|(s, e)| e > s));
        assert_eq!(spans[1].1, duration);
        // Within one frame of the hop-derived boundary
        let frame_secs = HOP_LENGTH as f64 / SAMPLE_RATE as f64;
        assert!((spans[0].1 - TARGET_FRAMES as f64 * frame_secs).abs() < frame_secs);
    }

    #[test]
    fn test_sample_range_secs() {
        let (s, e) = sample_range_secs(&(441_000..882_000), SAMPLE_RATE);
        assert_eq!((s, e), (10.0, 20.0));
    }
}
