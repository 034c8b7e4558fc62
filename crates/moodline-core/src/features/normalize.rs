//! Frame normalization: spectrogram -> network input tensor
//!
//! Pads or truncates to `TARGET_FRAMES`, z-score normalizes per chunk and
//! replicates the single spectrogram channel to the 3-channel image layout
//! the network expects.

use ndarray::{s, Array2, Array4, ArrayView2, ArrayView4};

use crate::error::{PipelineError, Result};
use crate::types::{MODEL_INPUT_SHAPE, NORM_EPSILON, NUM_CHANNELS, N_MELS, TARGET_FRAMES};

/// Network input tensor, always shaped `[1, N_MELS, TARGET_FRAMES, NUM_CHANNELS]`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput(Array4<f32>);

impl ModelInput {
    /// Wrap an existing array, checking it has the model input shape
    pub fn from_array(array: Array4<f32>) -> Result<Self> {
        if array.shape() != &MODEL_INPUT_SHAPE[..] {
            return Err(PipelineError::shape("model input", MODEL_INPUT_SHAPE, array.shape()));
        }
        Ok(Self(array))
    }

    pub fn shape(&self) -> [usize; 4] {
        let (b, m, t, c) = self.0.dim();
        [b, m, t, c]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        self.0.as_slice()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.0
    }
}

/// Right-pad with zeros or keep only the first `TARGET_FRAMES` frames
pub fn fit_frames(mel: ArrayView2<f32>) -> Array2<f32> {
    let keep = mel.ncols().min(TARGET_FRAMES);
    let mut fitted = Array2::<f32>::zeros((mel.nrows(), TARGET_FRAMES));
    fitted
        .slice_mut(s![.., ..keep])
        .assign(&mel.slice(s![.., ..keep]));
    fitted
}

/// In-place `(x - mean) / (std + NORM_EPSILON)` over the whole matrix.
///
/// Population standard deviation. A constant matrix becomes all zeros.
pub fn zscore(mel: &mut Array2<f32>) {
    let n = mel.len();
    if n == 0 {
        return;
    }

    let mean = mel.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let var = mel
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    let denom = var.sqrt() + NORM_EPSILON as f64;

    mel.mapv_inplace(|v| ((v as f64 - mean) / denom) as f32);
}

/// Convert one chunk's spectrogram into a network input tensor.
///
/// `chunk` is only used for error context.
pub fn prepare_input(mel: ArrayView2<f32>, chunk: usize) -> Result<ModelInput> {
    if mel.nrows() != N_MELS {
        return Err(PipelineError::shape("spectrogram mel bands", N_MELS, mel.nrows()));
    }

    let mut fitted = fit_frames(mel);
    zscore(&mut fitted);

    if fitted.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::NonFinite { chunk });
    }

    let input = Array4::from_shape_fn((1, N_MELS, TARGET_FRAMES, NUM_CHANNELS), |(_, m, t, _)| {
        fitted[[m, t]]
    });
    ModelInput::from_array(input)
}
