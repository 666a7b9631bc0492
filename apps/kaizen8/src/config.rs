//! Configuration for kaizen8.

use crate::session::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Config {
    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load from an explicit path. A missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Write to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "kaizen8").map(|d| d.config_dir().join("config.toml"))
    }

    pub fn log_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "kaizen8").map(|d| d.data_dir().join("kaizen8.log"))
    }

    pub fn to_session_options(&self) -> SessionOptions {
        SessionOptions {
            settle_delay: Duration::from_millis(self.study.settle_delay_ms),
            shuffle: self.study.shuffle,
            broadcasting: self.mirror.broadcast_on_start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Pause after answering before the next card shows.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

fn default_settle_delay() -> u64 { 200 }
fn default_true() -> bool { true }

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 200,
            shuffle: true,
        }
    }
}

/// Which medium carries mirror payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Unix socket, for a viewer in another terminal.
    #[default]
    Socket,
    /// In-process only.
    Local,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub broadcast_on_start: bool,
    #[serde(default)]
    pub transport: TransportKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String { "gemini-3-flash-preview".to_string() }
fn default_api_key_env() -> String { "GEMINI_API_KEY".to_string() }
fn default_timeout() -> u64 { 120 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.study.settle_delay_ms, 200);
        assert!(config.study.shuffle);
        assert!(!config.mirror.broadcast_on_start);
        assert_eq!(config.mirror.transport, TransportKind::Socket);
        assert_eq!(config.generation.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [study]
            shuffle = false

            [mirror]
            transport = "local"
            "#,
        )
        .unwrap();
        assert!(!config.study.shuffle);
        assert_eq!(config.study.settle_delay_ms, 200);
        assert_eq!(config.mirror.transport, TransportKind::Local);
        assert_eq!(config.generation, GenerationConfig::default());
    }

    #[test]
    fn test_session_options() {
        let mut config = Config::default();
        config.study.settle_delay_ms = 0;
        config.mirror.broadcast_on_start = true;
        let options = config.to_session_options();
        assert_eq!(options.settle_delay, Duration::ZERO);
        assert!(options.shuffle);
        assert!(options.broadcasting);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.generation.timeout_secs = 30;
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[study]\nshuffle = \"sometimes\"").unwrap();
        assert!(matches!(Config::load_from(&bad), Err(ConfigError::Parse(_))));
    }
}
