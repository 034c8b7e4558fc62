//! ONNX Runtime emotion engine
//!
//! Wraps one `ort` session of the emotion CNN. `Session::run` needs
//! `&mut self`, so the session sits behind a `Mutex`; concurrent callers
//! (rayon workers in a batch) take turns on it.

use std::path::Path;
use std::sync::Mutex;

use moodline_core::types::{MODEL_INPUT_SHAPE, NUM_EMOTIONS};
use moodline_core::{EngineError, InferenceEngine, ModelInput};
use ndarray::{Array4, Axis};
use ort::session::Session;
use ort::value::Tensor;

use crate::config::ModelConfig;

/// Emotion CNN loaded into ONNX Runtime
pub struct OrtEngine {
    session: Mutex<Session>,
    input_name: Option<String>,
    model_name: String,
    /// Input shape declared by the model, batch dimension 1
    input_shape: [usize; 4],
    /// Whether the model accepts more than one input per run
    dynamic_batch: bool,
}

impl OrtEngine {
    /// Load the model at `model_path`
    pub fn load(model_path: &Path, config: &ModelConfig) -> Result<Self, EngineError> {
        if !model_path.is_file() {
            return Err(EngineError::Load(format!("model not found: {:?}", model_path)));
        }

        log::info!("Loading emotion model from {:?}", model_path);
        let session = build_session(model_path, config.intra_threads)
            .map_err(|e| EngineError::Load(format!("{:?}: {}", model_path, e)))?;

        let input = match &config.input_name {
            Some(name) => session
                .inputs()
                .iter()
                .find(|input| input.name() == name)
                .ok_or_else(|| EngineError::Load(format!("model has no input named {:?}", name)))?,
            None => session
                .inputs()
                .first()
                .ok_or_else(|| EngineError::Load("model declares no inputs".to_string()))?,
        };
        let dims = input
            .dtype()
            .tensor_shape()
            .ok_or_else(|| EngineError::Load(format!("input {:?} is not a tensor", input.name())))?;
        let (input_shape, dynamic_batch) = declared_input_shape(dims)?;

        if input_shape != MODEL_INPUT_SHAPE {
            log::warn!(
                "Emotion model input {:?} expects {:?}, features are {:?}",
                input.name(),
                input_shape,
                MODEL_INPUT_SHAPE
            );
        }

        let model_name = model_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("onnx")
            .to_string();

        log::info!(
            "Emotion model {} loaded (input {:?}, batched runs: {})",
            model_name,
            input_shape,
            dynamic_batch
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name: config.input_name.clone(),
            model_name,
            input_shape,
            dynamic_batch,
        })
    }

    /// Run one `[N, 128, 431, 3]` tensor, returning `N * 5` floats
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, EngineError> {
        let batch = input.len_of(Axis(0));
        let tensor = Tensor::from_array(input)
            .map_err(|e| EngineError::Run(format!("tensor creation error: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::Run("session lock poisoned".to_string()))?;

        let outputs = match &self.input_name {
            Some(name) => session.run(ort::inputs![name.as_str() => tensor]),
            None => session.run(ort::inputs![tensor]),
        }
        .map_err(|e| EngineError::Run(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| EngineError::Output("model produced no output".to_string()))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Output(e.to_string()))?;

        if data.len() != batch * NUM_EMOTIONS {
            return Err(EngineError::Output(format!(
                "expected {} values, got {}",
                batch * NUM_EMOTIONS,
                data.len()
            )));
        }
        Ok(data.to_vec())
    }
}

fn build_session(model_path: &Path, intra_threads: usize) -> ort::Result<Session> {
    let environment = ort::init().with_name("moodline").build()?;
    let mut builder = Session::builder(&environment)?.with_intra_threads(intra_threads)?;
    builder.commit_from_file(model_path)
}

/// Input shape from the dimensions an ONNX model declares.
///
/// Dynamic dimensions (`-1`) accept any size: a dynamic batch reports 1 and
/// allows stacked runs, any other dynamic dimension takes the feature size.
fn declared_input_shape(dims: &[i64]) -> Result<([usize; 4], bool), EngineError> {
    if dims.len() != MODEL_INPUT_SHAPE.len() {
        return Err(EngineError::Load(format!(
            "model input has rank {} ({:?}), expected {:?}",
            dims.len(),
            dims,
            MODEL_INPUT_SHAPE
        )));
    }

    let mut shape = MODEL_INPUT_SHAPE;
    for (axis, &dim) in dims.iter().enumerate() {
        if dim >= 0 {
            shape[axis] = dim as usize;
        }
    }
    let dynamic_batch = dims[0] < 0;
    Ok((shape, dynamic_batch))
}

impl InferenceEngine for OrtEngine {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, EngineError> {
        self.run(input.view().to_owned())
    }

    fn predict_batch(&self, inputs: &[ModelInput]) -> Result<Vec<Vec<f32>>, EngineError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        // A fixed batch dimension only takes one input per run
        if !self.dynamic_batch {
            return inputs
                .iter()
                .enumerate()
                .map(|(index, input)| self.predict(input).map_err(|e| e.at_input(index)))
                .collect();
        }

        let views: Vec<_> = inputs.iter().map(|input| input.view()).collect();
        let stacked = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| EngineError::Run(format!("batch stacking error: {}", e)))?;

        let flat = self.run(stacked)?;
        Ok(flat.chunks_exact(NUM_EMOTIONS).map(<[f32]>::to_vec).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = OrtEngine::load(&dir.path().join("absent.onnx"), &ModelConfig::default());
        assert!(matches!(result, Err(EngineError::Load(_))));
    }

    #[test]
    fn test_declared_shape_dynamic_batch() {
        let (shape, dynamic_batch) = declared_input_shape(&[-1, 128, 431, 3]).unwrap();
        assert_eq!(shape, MODEL_INPUT_SHAPE);
        assert!(dynamic_batch);

        let (shape, dynamic_batch) = declared_input_shape(&[1, 128, 431, 3]).unwrap();
        assert_eq!(shape, MODEL_INPUT_SHAPE);
        assert!(!dynamic_batch);
    }

    #[test]
    fn test_declared_shape_reports_trained_frames() {
        // A model trained on 430-frame windows must not pass as 431
        let (shape, _) = declared_input_shape(&[-1, 128, 430, 3]).unwrap();
        assert_eq!(shape, [1, 128, 430, 3]);
        assert_ne!(shape, MODEL_INPUT_SHAPE);

        let (shape, _) = declared_input_shape(&[-1, 3, 128, 431]).unwrap();
        assert_ne!(shape, MODEL_INPUT_SHAPE);
    }

    #[test]
    fn test_declared_shape_dynamic_axes_are_wildcards() {
        let (shape, dynamic_batch) = declared_input_shape(&[-1, 128, -1, 3]).unwrap();
        assert_eq!(shape, MODEL_INPUT_SHAPE);
        assert!(dynamic_batch);
    }

    #[test]
    fn test_declared_shape_wrong_rank() {
        assert!(matches!(declared_input_shape(&[1, 128, 431]), Err(EngineError::Load(_))));
        assert!(matches!(declared_input_shape(&[]), Err(EngineError::Load(_))));
    }
}
