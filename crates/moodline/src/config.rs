//! Application configuration for moodline
//!
//! Stored as YAML. Default location: ~/.config/moodline/config.yaml

use std::path::{Path, PathBuf};

use moodline_core::config as core_config;
use moodline_core::AnalysisConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pipeline settings (duration limit, chunk count, batching)
    pub analysis: AnalysisConfig,
    /// Emotion model location and runtime settings
    pub model: ModelConfig,
}

impl AppConfig {
    pub fn validate(&mut self) {
        self.analysis.validate();
        self.model.validate();
    }
}

/// Emotion model configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Explicit model file; overrides the cache lookup
    pub path: Option<PathBuf>,
    /// File name inside the model cache directory
    pub filename: String,
    /// Where to fetch the model when it is not cached
    pub download_url: Option<String>,
    /// Model input name; positional input when unset
    pub input_name: Option<String>,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            filename: String::from("emotion_cnn.onnx"),
            download_url: None,
            input_name: None,
            intra_threads: 1,
        }
    }
}

impl ModelConfig {
    pub fn validate(&mut self) {
        self.intra_threads = self.intra_threads.clamp(1, 64);
        if self.filename.trim().is_empty() {
            self.filename = ModelConfig::default().filename;
        }
    }
}

/// Default config file path: `~/.config/moodline/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("moodline")
        .join("config.yaml")
}

/// Load and validate the config; defaults when missing or invalid
pub fn load_config(path: &Path) -> AppConfig {
    let mut config: AppConfig = core_config::load_config(path);
    config.validate();
    log::debug!(
        "load_config: {} chunks, max {:.0}s, model {}",
        config.analysis.num_chunks,
        config.analysis.max_duration_secs,
        config.model.filename
    );
    config
}

pub fn save_config(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    core_config::save_config(config, path)
}
