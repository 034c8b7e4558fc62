//! Emotion model artifact management
//!
//! Resolves where the ONNX model lives: an explicit configured path, or
//! `~/.cache/moodline/models/<filename>`. When the cached file is missing and
//! a download URL is configured, the model is fetched once with an atomic
//! rename so a partial download never looks like a model.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::{AppError, Result};

/// Download progress callback (0.0 to 1.0)
pub type ProgressCallback = Box<dyn Fn(f32) + Send>;

pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Default cache directory: `~/.cache/moodline/models/`
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            cache_dir: base.join("moodline").join("models"),
        }
    }

    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the model for `config` is expected to be
    pub fn model_path(&self, config: &ModelConfig) -> PathBuf {
        match &config.path {
            Some(path) => path.clone(),
            None => self.cache_dir.join(&config.filename),
        }
    }

    pub fn is_available(&self, config: &ModelConfig) -> bool {
        self.model_path(config).is_file()
    }

    /// Model path, downloading into the cache if needed
    pub fn ensure_model(&self, config: &ModelConfig, progress: Option<ProgressCallback>) -> Result<PathBuf> {
        let model_path = self.model_path(config);

        if model_path.is_file() {
            log::info!("Emotion model found at {:?}", model_path);
            return Ok(model_path);
        }

        // An explicit path is never downloaded over
        let url = match (&config.path, &config.download_url) {
            (None, Some(url)) => url,
            _ => return Err(AppError::ModelNotFound(model_path)),
        };

        log::info!("Downloading emotion model from {}", url);
        self.download_file(url, &model_path, progress)?;
        Ok(model_path)
    }

    fn download_file(&self, url: &str, target_path: &Path, progress: Option<ProgressCallback>) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| AppError::io(&self.cache_dir, e))?;

        let temp_path = target_path.with_extension("part");

        let response = ureq::get(url)
            .call()
            .map_err(|e| AppError::DownloadFailed(format!("{}: {}", url, e)))?;

        let content_length: Option<u64> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let downloaded = match write_body(response.into_reader(), &temp_path, content_length, &progress) {
            Ok(downloaded) => downloaded,
            Err(e) => {
                fs::remove_file(&temp_path).ok();
                return Err(e);
            }
        };

        if let Some(expected) = content_length {
            if downloaded != expected {
                fs::remove_file(&temp_path).ok();
                return Err(AppError::DownloadFailed(format!(
                    "incomplete download: expected {} bytes, got {}",
                    expected, downloaded
                )));
            }
        }

        fs::rename(&temp_path, target_path).map_err(|e| AppError::io(target_path, e))?;
        log::info!("Downloaded emotion model to {:?} ({} bytes)", target_path, downloaded);

        if let Some(cb) = progress {
            cb(1.0);
        }
        Ok(())
    }
}

/// Stream a response body into `temp_path`, returning the byte count
fn write_body(
    mut reader: impl Read,
    temp_path: &Path,
    content_length: Option<u64>,
    progress: &Option<ProgressCallback>,
) -> Result<u64> {
    let mut file = fs::File::create(temp_path).map_err(|e| AppError::io(temp_path, e))?;
    let mut buffer = [0u8; 8192];
    let mut downloaded: u64 = 0;

    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| AppError::DownloadFailed(format!("read error: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).map_err(|e| AppError::io(temp_path, e))?;
        downloaded += n as u64;

        if let (Some(cb), Some(total)) = (progress, content_length) {
            cb((downloaded as f32 / total as f32).min(0.99));
        }
    }

    file.flush().map_err(|e| AppError::io(temp_path, e))?;
    Ok(downloaded)
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! One-route HTTP server for download tests

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serve `body` with a `Content-Length` of `declared_len` to every
    /// request. Returns the model URL and a request counter.
    pub fn serve(body: Vec<u8>, declared_len: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/emotion_cnn.onnx", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    declared_len
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });

        (url, requests)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::serve;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_model_path_resolution() {
        let mgr = ModelManager::with_cache_dir("/tmp/moodline-test".into());
        let config = ModelConfig::default();
        assert_eq!(mgr.model_path(&config), PathBuf::from("/tmp/moodline-test/emotion_cnn.onnx"));

        let config = ModelConfig {
            path: Some("/models/custom.onnx".into()),
            ..Default::default()
        };
        assert_eq!(mgr.model_path(&config), PathBuf::from("/models/custom.onnx"));
    }

    #[test]
    fn test_cached_model_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::with_cache_dir(dir.path().to_path_buf());
        let config = ModelConfig::default();
        assert!(!mgr.is_available(&config));

        std::fs::write(dir.path().join(&config.filename), b"onnx").unwrap();
        assert!(mgr.is_available(&config));
        assert_eq!(mgr.ensure_model(&config, None).unwrap(), dir.path().join("emotion_cnn.onnx"));
    }

    #[test]
    fn test_missing_without_url_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::with_cache_dir(dir.path().to_path_buf());
        let err = mgr.ensure_model(&ModelConfig::default(), None).unwrap_err();
        assert!(matches!(err, AppError::ModelNotFound(_)));

        let config = ModelConfig {
            path: Some(dir.path().join("explicit.onnx")),
            download_url: Some("http://127.0.0.1:9/model.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(
            mgr.ensure_model(&config, None),
            Err(AppError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_download_into_cache() {
        let body = vec![7u8; 20_000];
        let (url, requests) = serve(body.clone(), body.len());
        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::with_cache_dir(dir.path().join("models"));
        let config = ModelConfig {
            download_url: Some(url),
            ..Default::default()
        };

        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let progress: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));

        let path = mgr.ensure_model(&config, Some(progress)).unwrap();
        assert_eq!(path, dir.path().join("models").join("emotion_cnn.onnx"));
        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert!(!path.with_extension("part").exists());
        assert_eq!(reported.lock().unwrap().last(), Some(&1.0));

        // Cached now, no second request
        mgr.ensure_model(&config, None).unwrap();
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_truncated_download_leaves_no_model() {
        let (url, _) = serve(vec![7u8; 500], 1000);
        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::with_cache_dir(dir.path().to_path_buf());
        let config = ModelConfig {
            download_url: Some(url),
            ..Default::default()
        };

        let err = mgr.ensure_model(&config, None).unwrap_err();
        assert!(matches!(err, AppError::DownloadFailed(_)), "{:?}", err);

        let target = mgr.model_path(&config);
        assert!(!target.exists());
        assert!(!target.with_extension("part").exists());
        assert!(!mgr.is_available(&config));
    }
}
