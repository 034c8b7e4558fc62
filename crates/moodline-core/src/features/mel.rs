//! Log-mel spectrogram extraction
//!
//! Computes 128-band power mel spectrograms in dB, using the same conventions
//! the network was trained with:
//! - 44.1kHz mono input, n_fft=2048, hop=1024, periodic Hann window
//! - Centered frames (n_fft/2 zeros on both sides of the signal)
//! - Slaney mel scale with Slaney area normalization, 0Hz to Nyquist
//! - dB relative to the chunk's own maximum, floored 80dB below the peak

use std::sync::Arc;

use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{PipelineError, Result};
use crate::types::{HOP_LENGTH, N_FFT, N_MELS, SAMPLE_RATE};

/// Floor applied to power values before taking the log
const AMIN: f32 = 1e-10;

/// Dynamic range kept below the loudest bin
const TOP_DB: f32 = 80.0;

/// Non-zero span of one triangular mel filter
#[derive(Debug, Clone)]
struct MelFilter {
    /// First FFT bin with a non-zero weight
    start: usize,
    weights: Vec<f32>,
}

/// Log-mel feature extractor with precomputed window, FFT plan and filterbank.
///
/// Stateless between calls; one instance can be reused for every chunk.
#[derive(Clone)]
pub struct MelExtractor {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    filters: Vec<MelFilter>,
}

impl Default for MelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MelExtractor {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(N_FFT);

        Self {
            fft,
            window: hann_window(N_FFT),
            filters: slaney_filterbank(N_MELS, N_FFT, SAMPLE_RATE as f64),
        }
    }

    /// Number of frames produced for `len` input samples
    pub fn frame_count(len: usize) -> usize {
        if len == 0 {
            0
        } else {
            1 + len / HOP_LENGTH
        }
    }

    /// Compute the log-mel spectrogram `[N_MELS, n_frames]` of a mono chunk.
    ///
    /// Empty input yields zero frames rather than an error; the normalizer pads it.
    pub fn compute(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let n_frames = Self::frame_count(samples.len());
        if n_frames == 0 {
            return Ok(Array2::zeros((N_MELS, 0)));
        }

        let pad = N_FFT / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let mut mel = Array2::<f32>::zeros((N_MELS, n_frames));
        let mut frame_buf = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut bin_power = vec![0.0f32; spectrum.len()];

        for frame_idx in 0..n_frames {
            let start = frame_idx * HOP_LENGTH;
            let frame = &padded[start..start + N_FFT];

            for ((dst, &s), &w) in frame_buf.iter_mut().zip(frame).zip(&self.window) {
                *dst = s * w;
            }

            self.fft
                .process_with_scratch(&mut frame_buf, &mut spectrum, &mut scratch)
                .map_err(|e| PipelineError::shape("fft buffer", N_FFT, e.to_string()))?;

            for (p, c) in bin_power.iter_mut().zip(&spectrum) {
                *p = c.norm_sqr();
            }

            for (band, filter) in self.filters.iter().enumerate() {
                let energy: f32 = filter
                    .weights
                    .iter()
                    .zip(&bin_power[filter.start..])
                    .map(|(w, p)| w * p)
                    .sum();
                mel[[band, frame_idx]] = energy;
            }
        }

        Ok(power_to_db(mel))
    }
}

/// Convert a power spectrogram to dB relative to its maximum.
///
/// An all-zero input maps to an all-zero output.
pub fn power_to_db(mut power: Array2<f32>) -> Array2<f32> {
    if power.is_empty() {
        return power;
    }

    let reference = power.iter().fold(0.0f32, |acc, &p| acc.max(p));
    let ref_db = 10.0 * reference.max(AMIN).log10();
    power.mapv_inplace(|p| 10.0 * p.max(AMIN).log10() - ref_db);

    let peak = power.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let floor = peak - TOP_DB;
    power.mapv_inplace(|v| v.max(floor));
    power
}

/// Periodic Hann window (DFT-even), as used for spectral analysis
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / size as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

// Slaney mel scale: linear below 1kHz, logarithmic above
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Build the triangular, area-normalized mel filterbank.
///
/// Only the non-zero span of each filter is stored.
fn slaney_filterbank(n_mels: usize, n_fft: usize, sample_rate: f64) -> Vec<MelFilter> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate / n_fft as f64)
        .collect();

    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(sample_rate / 2.0);
    let n_points = n_mels + 2;
    let hz_points: Vec<f64> = (0..n_points)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_points - 1) as f64))
        .collect();

    (0..n_mels)
        .map(|band| {
            let left = hz_points[band];
            let center = hz_points[band + 1];
            let right = hz_points[band + 2];
            let enorm = 2.0 / (right - left);

            let dense: Vec<f64> = fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect();

            let start = dense.iter().position(|&w| w > 0.0).unwrap_or(0);
            let end = dense
                .iter()
                .rposition(|&w| w > 0.0)
                .map_or(start, |last| last + 1);

            MelFilter {
                start,
                weights: dense[start..end].iter().map(|&w| w as f32).collect(),
            }
        })
        .collect()
}
