//! YAML configuration loading and saving for any serde config type

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;

/// Load a YAML config file.
///
/// A missing file yields `T::default()`. An unreadable or unparsable file is
/// logged as a warning and also yields `T::default()`, so a broken config
/// never prevents analysis from running.
///
/// ```ignore
/// let config: AppConfig = load_config(&path);
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("load_config: {:?} not found, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("load_config: Failed to read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: Loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: Invalid config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a config as YAML, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config: {:?}", path))?;

    log::info!("save_config: Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config: AnalysisConfig = load_config(&dir.path().join("absent.yaml"));
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_invalid_yaml_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "num_chunks: [not, a, number").unwrap();
        let config: AnalysisConfig = load_config(&path);
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("analysis.yaml");

        let config = AnalysisConfig {
            max_duration_secs: 60.0,
            num_chunks: 6,
            batch_inference: true,
        };
        save_config(&config, &path).unwrap();

        let loaded: AnalysisConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
