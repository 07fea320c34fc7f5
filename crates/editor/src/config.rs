use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EditorError, Result};

const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Editor model settings, loaded from an optional JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Directory receiving rendered files.
    pub output_dir: PathBuf,
    /// Period of the render progress sampler.
    pub progress_interval_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl EditorConfig {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| EditorError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| EditorError::ParseConfig {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "editor config loaded");
        Ok(config)
    }

    /// Loads `path` when given, else the per-user config file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path().filter(|path| path.is_file()) {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(EditorError::InvalidConfig {
                reason: "output_dir is empty",
            });
        }
        Ok(())
    }
}

/// `<config dir>/reel/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reel").join("config.json"))
}

fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Movies")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::EditorConfig;
    use crate::error::EditorError;

    #[test]
    fn defaults_sample_progress_every_half_second() {
        let config = EditorConfig::default();

        assert_eq!(config.progress_interval(), Duration::from_millis(500));
        assert!(!config.output_dir.as_os_str().is_empty());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "output_dir": "/srv/renders" }"#).expect("write config");

        let config = EditorConfig::load(&path).expect("load config");

        assert_eq!(config.output_dir, PathBuf::from("/srv/renders"));
        assert_eq!(config.progress_interval_ms, 500);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ output_dir: ").expect("write config");

        let result = EditorConfig::load(&path);

        assert!(matches!(result, Err(EditorError::ParseConfig { .. })));
    }

    #[test]
    fn empty_output_dir_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "output_dir": "", "progress_interval_ms": 250 }"#)
            .expect("write config");

        let result = EditorConfig::load(&path);

        assert!(matches!(result, Err(EditorError::InvalidConfig { .. })));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");

        let result = EditorConfig::load_or_default(Some(&dir.path().join("absent.json")));

        assert!(matches!(result, Err(EditorError::ReadConfig { .. })));
    }
}
