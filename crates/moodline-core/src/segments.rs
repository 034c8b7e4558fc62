//! Emotion timeline and segment merging
//!
//! A timeline holds one labeled, contiguous time range per chunk. Merging
//! collapses consecutive entries with the same label into segments, which
//! partition the analyzed duration with no gaps or overlaps.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::types::Emotion;

/// Predicted emotion of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub start_secs: f64,
    pub end_secs: f64,
    pub emotion: Emotion,
}

impl TimelineEntry {
    pub fn new(start_secs: f64, end_secs: f64, emotion: Emotion) -> Self {
        Self {
            start_secs,
            end_secs,
            emotion,
        }
    }
}

/// Maximal run of consecutive chunks sharing one emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub emotion: Emotion,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl Segment {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Sample indices covered by this segment at `sample_rate`
    pub fn sample_range(&self, sample_rate: u32) -> Range<usize> {
        let sr = sample_rate as f64;
        let start = (self.start_secs.max(0.0) * sr) as usize;
        let end = (self.end_secs.max(0.0) * sr) as usize;
        start..end.max(start)
    }
}

/// Merge a chronological timeline into emotion segments.
///
/// A new segment opens at the start of the first entry whose label differs
/// from the current one; the final segment closes at the last entry's end.
pub fn merge_segments(timeline: &[TimelineEntry]) -> Vec<Segment> {
    let Some(first) = timeline.first() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = Segment {
        emotion: first.emotion,
        start_secs: first.start_secs,
        end_secs: first.end_secs,
    };

    for entry in &timeline[1..] {
        if entry.emotion == current.emotion {
            current.end_secs = entry.end_secs;
        } else {
            current.end_secs = entry.start_secs;
            segments.push(current);
            current = Segment {
                emotion: entry.emotion,
                start_secs: entry.start_secs,
                end_secs: entry.end_secs,
            };
        }
    }

    segments.push(current);
    segments
}
