//! Prediction aggregation
//!
//! Averages per-chunk probability vectors into one song-level distribution
//! and decodes the arg-max class. Every chunk has equal weight, including a
//! mostly padded trailing chunk.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{Emotion, NUM_EMOTIONS};

/// Per-class probabilities in `Emotion::ALL` order
pub type Probabilities = [f32; NUM_EMOTIONS];

/// Song-level (or chunk-level) emotion prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Arg-max class
    pub emotion: Emotion,
    /// Probability of `emotion`
    pub confidence: f32,
    /// Full distribution in label order
    pub probabilities: Probabilities,
}

impl Prediction {
    /// Decode a probability vector. Ties go to the lowest class index.
    pub fn from_probabilities(probabilities: Probabilities) -> Self {
        let idx = argmax(&probabilities).unwrap_or(0);
        Self {
            emotion: Emotion::ALL[idx],
            confidence: probabilities[idx],
            probabilities,
        }
    }

    /// All classes ordered from most to least probable
    pub fn ranked(&self) -> Vec<(Emotion, f32)> {
        let mut ranked: Vec<(Emotion, f32)> = Emotion::ALL
            .iter()
            .map(|&e| (e, self.probabilities[e.index()]))
            .collect();
        // Stable sort keeps label order among equal probabilities
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub fn probability(&self, emotion: Emotion) -> f32 {
        self.probabilities[emotion.index()]
    }
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Validate a raw engine output vector for one chunk
pub fn probabilities_from_slice(chunk: usize, raw: &[f32]) -> Result<Probabilities> {
    let probs: Probabilities = raw.try_into().map_err(|_| {
        PipelineError::shape("prediction vector", NUM_EMOTIONS, raw.len())
    })?;

    if let Some(bad) = probs.iter().find(|p| !p.is_finite()) {
        return Err(PipelineError::InvalidPrediction {
            chunk,
            reason: format!("non-finite probability {}", bad),
        });
    }
    Ok(probs)
}

/// Element-wise mean of per-chunk probability vectors.
///
/// An empty list is `EmptyInput`; there is no default label.
pub fn average_predictions(chunks: &[Probabilities]) -> Result<Prediction> {
    if chunks.is_empty() {
        return Err(PipelineError::EmptyInput(
            "no chunk predictions to aggregate".to_string(),
        ));
    }

    let n = chunks.len() as f64;
    let mut sums = [0.0f64; NUM_EMOTIONS];
    for chunk in chunks {
        for (sum, &p) in sums.iter_mut().zip(chunk) {
            *sum += p as f64;
        }
    }

    let mut avg = [0.0f32; NUM_EMOTIONS];
    for (a, s) in avg.iter_mut().zip(sums) {
        *a = (s / n) as f32;
    }

    Ok(Prediction::from_probabilities(avg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_two_chunks() {
        let p = average_predictions(&[
            [0.1, 0.2, 0.5, 0.1, 0.1],
            [0.3, 0.2, 0.1, 0.3, 0.1],
        ])
        .unwrap();
        assert_eq!(p.emotion, Emotion::Happy);
        assert!((p.confidence - 0.3).abs() < 1e-6);
        assert!((p.probabilities[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_average_sums_to_one() {
        let chunks: Vec<Probabilities> = (0..10)
            .map(|i| {
                let raw = [1.0 + i as f32, 2.0, 0.5, 3.0 - (i % 3) as f32, 1.5];
                let total: f32 = raw.iter().sum();
                raw.map(|v| v / total)
            })
            .collect();
        let p = average_predictions(&chunks).unwrap();
        let total: f32 = p.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-5, "sum = {}", total);
        assert!((0.0..=1.0).contains(&p.confidence));
    }

    #[test]
    fn test_empty_list_is_empty_input() {
        let err = average_predictions(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput(_)));
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let p = average_predictions(&[[0.1, 0.3, 0.3, 0.0, 0.3]]).unwrap();
        assert_eq!(p.emotion, Emotion::Energetic);

        let p = Prediction::from_probabilities([0.2; NUM_EMOTIONS]);
        assert_eq!(p.emotion, Emotion::Calm);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.5]), Some(0));
        assert_eq!(argmax(&[0.1, 0.9, 0.9]), Some(1));
    }

    #[test]
    fn test_ranked_breakdown() {
        let p = Prediction::from_probabilities([0.1, 0.4, 0.1, 0.3, 0.1]);
        let ranked = p.ranked();
        assert_eq!(ranked[0].0, Emotion::Energetic);
        assert_eq!(ranked[1].0, Emotion::Romantic);
        // Equal probabilities keep label order
        assert_eq!(ranked[2].0, Emotion::Calm);
        assert_eq!(ranked[3].0, Emotion::Happy);
        assert_eq!(ranked[4].0, Emotion::Sad);
    }

    #[test]
    fn test_probabilities_from_slice_validates() {
        assert!(probabilities_from_slice(0, &[0.2; 5]).is_ok());
        assert!(matches!(
            probabilities_from_slice(0, &[0.25; 4]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            probabilities_from_slice(6, &[0.2, f32::NAN, 0.2, 0.2, 0.2]),
            Err(PipelineError::InvalidPrediction { chunk: 6, .. })
        ));
    }
}
