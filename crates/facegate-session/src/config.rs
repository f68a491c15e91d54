use std::path::{Path, PathBuf};

use facegate_core::EngineConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Session configuration: engine tuning plus the frame queue depth.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub engine: EngineConfig,
    /// Frames buffered between the camera callback and the session task.
    /// When full, new frames are dropped rather than queued.
    pub frame_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            frame_queue: 2,
        }
    }
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    ///
    /// `FACEGATE_CONFIG` names an optional TOML file applied first; the
    /// individual variables then override it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = match lookup("FACEGATE_CONFIG") {
            Some(path) => load_engine_config(Path::new(&path))?,
            None => EngineConfig::default(),
        };

        let mut config = Self {
            engine,
            ..Self::default()
        };
        config.apply_overrides(&lookup);
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = &mut self.engine;
        if let Some(v) = lookup("FACEGATE_AUTO_CAPTURE") {
            engine.auto_capture = v != "0";
        }
        engine.frame_interval_ms = parsed(lookup, "FACEGATE_FRAME_INTERVAL_MS", engine.frame_interval_ms);
        engine.countdown_secs = parsed(lookup, "FACEGATE_COUNTDOWN_SECS", engine.countdown_secs);
        engine.blink.max_duration_ms = parsed(lookup, "FACEGATE_BLINK_MAX_MS", engine.blink.max_duration_ms);
        self.frame_queue = parsed(lookup, "FACEGATE_FRAME_QUEUE", self.frame_queue).max(1);
    }
}

/// Parse an [`EngineConfig`] from a TOML file. Missing keys keep their defaults.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "engine config loaded");
    Ok(config)
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
