//! Inference engine trait and process-wide engine holder
//!
//! The emotion network is an opaque collaborator: it takes one
//! `[1, 128, 431, 3]` tensor and returns a 5-way probability vector. The
//! pipeline only talks to it through `InferenceEngine`, so the ONNX runtime
//! can be swapped for a mock in tests.
//!
//! ## Implementing a New Engine
//!
//! ```ignore
//! struct MyEngine;
//!
//! impl InferenceEngine for MyEngine {
//!     fn name(&self) -> &str { "my-engine" }
//!     fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, EngineError> {
//!         // run the network on input.view()
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{EngineError, PipelineError, Result};
use crate::features::ModelInput;
use crate::types::MODEL_INPUT_SHAPE;

/// A loaded emotion classifier
///
/// Implementations must be safe to call from several threads; any interior
/// mutability (e.g. an ONNX session needing `&mut`) is the engine's business.
pub trait InferenceEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Whether the model is loaded and can serve requests
    fn is_ready(&self) -> bool {
        true
    }

    /// Reason the engine is not ready (if `is_ready()` returns false)
    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    /// Input tensor shape the loaded model expects
    fn input_shape(&self) -> [usize; 4] {
        MODEL_INPUT_SHAPE
    }

    /// Run one input tensor, returning the raw output vector
    fn predict(&self, input: &ModelInput) -> std::result::Result<Vec<f32>, EngineError>;

    /// Run several inputs. The default runs them one at a time.
    ///
    /// Implementations that know which input failed should report it with
    /// [`EngineError::at_input`]; any other error fails the call as a whole.
    fn predict_batch(
        &self,
        inputs: &[ModelInput],
    ) -> std::result::Result<Vec<Vec<f32>>, EngineError> {
        inputs
            .iter()
            .enumerate()
            .map(|(index, input)| self.predict(input).map_err(|e| e.at_input(index)))
            .collect()
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn unavailable_reason(&self) -> Option<String> {
        (**self).unavailable_reason()
    }

    fn input_shape(&self) -> [usize; 4] {
        (**self).input_shape()
    }

    fn predict(&self, input: &ModelInput) -> std::result::Result<Vec<f32>, EngineError> {
        (**self).predict(input)
    }

    fn predict_batch(
        &self,
        inputs: &[ModelInput],
    ) -> std::result::Result<Vec<Vec<f32>>, EngineError> {
        (**self).predict_batch(inputs)
    }
}

/// Process-wide, lazily loaded engine
///
/// Loading a model is slow, so it happens once on first use and the engine is
/// then shared read-only. Concurrent first callers block on the init lock
/// instead of loading twice; a failed load leaves the cell empty so a later
/// call can retry.
///
/// ```ignore
/// static ENGINE: EngineCell<OrtEngine> = EngineCell::new();
/// let engine = ENGINE.get_or_try_init(|| OrtEngine::load(&path, &config))?;
/// ```
pub struct EngineCell<E> {
    cell: OnceLock<Arc<E>>,
    init_lock: Mutex<()>,
}

impl<E> EngineCell<E> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// The engine, if it has been loaded
    pub fn get(&self) -> Option<Arc<E>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Get the engine, loading it with `init` on first use
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<E>>
    where
        F: FnOnce() -> std::result::Result<E, EngineError>,
    {
        if let Some(engine) = self.cell.get() {
            return Ok(Arc::clone(engine));
        }

        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have finished loading while we waited
        if let Some(engine) = self.cell.get() {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(init().map_err(|e| PipelineError::EngineUnavailable(e.to_string()))?);
        let _ = self.cell.set(Arc::clone(&engine));
        Ok(engine)
    }
}

impl<E> Default for EngineCell<E> {
    fn default() -> Self {
        Self::new()
    }
}
