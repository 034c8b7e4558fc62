//! Emotion model runtime
//!
//! - **Model management** (`models.rs`): locate or download the ONNX artifact
//! - **Inference** (`inference.rs`): `OrtEngine`, the ort-backed `InferenceEngine`
//!
//! The engine is loaded once per process through [`shared_engine`].

pub mod inference;
pub mod models;

pub use inference::OrtEngine;
pub use models::ModelManager;

use std::path::Path;
use std::sync::Arc;

use moodline_core::{EngineCell, EngineError};

use crate::config::ModelConfig;
use crate::error::Result;

static ENGINE: EngineCell<OrtEngine> = EngineCell::new();

/// The process-wide emotion engine, loaded on first call
pub fn shared_engine(manager: &ModelManager, config: &ModelConfig) -> Result<Arc<OrtEngine>> {
    load_shared(&ENGINE, manager, config, OrtEngine::load)
}

/// Resolve (and if needed download) the model, then load it into `cell`.
///
/// Both steps run under the cell's init lock, so concurrent first callers
/// fetch the model at most once.
fn load_shared<E, F>(
    cell: &EngineCell<E>,
    manager: &ModelManager,
    config: &ModelConfig,
    load: F,
) -> Result<Arc<E>>
where
    F: FnOnce(&Path, &ModelConfig) -> std::result::Result<E, EngineError>,
{
    if let Some(engine) = cell.get() {
        return Ok(engine);
    }

    let mut model_error = None;
    let loaded = cell.get_or_try_init(|| {
        let model_path = manager.ensure_model(config, None).map_err(|e| {
            let reason = e.to_string();
            model_error = Some(e);
            EngineError::Load(reason)
        })?;
        load(&model_path, config)
    });

    match (loaded, model_error) {
        (Ok(engine), _) => Ok(engine),
        // Keep ModelNotFound / DownloadFailed instead of a generic load error
        (Err(_), Some(e)) => Err(e),
        (Err(e), None) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::models::testing::serve;
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::Ordering;

    struct Loaded(Vec<u8>);

    fn read_model(path: &Path, _: &ModelConfig) -> std::result::Result<Loaded, EngineError> {
        std::fs::read(path)
            .map(Loaded)
            .map_err(|e| EngineError::Load(e.to_string()))
    }

    #[test]
    fn test_concurrent_first_use_downloads_once() {
        let body = vec![3u8; 50_000];
        let (url, requests) = serve(body.clone(), body.len());
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_cache_dir(dir.path().to_path_buf());
        let config = ModelConfig {
            download_url: Some(url),
            ..Default::default()
        };
        let cell: EngineCell<Loaded> = EngineCell::new();

        let engines: Vec<Arc<Loaded>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| scope.spawn(|| load_shared(&cell, &manager, &config, read_model).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
        assert_eq!(engines[0].0, body);
    }

    #[test]
    fn test_missing_model_keeps_app_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_cache_dir(dir.path().to_path_buf());
        let cell: EngineCell<Loaded> = EngineCell::new();

        let err = load_shared(&cell, &manager, &ModelConfig::default(), read_model)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ModelNotFound(_)));
        assert!(!cell.is_initialized());
    }
}
