use facemood_core::matcher::{DEFAULT_ACCURACY_THRESHOLD, DEFAULT_MATCH_TOLERANCE};
use facemood_core::{DistanceMetric, MatchSettings, StorePolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Runtime configuration.
///
/// Layered: defaults, then an optional TOML file, then `FACEMOOD_*`
/// environment variables. Command-line flags are applied by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Captured photo; consumed (deleted) once emotion analysis runs.
    pub image_path: PathBuf,
    /// Known-face store (`[embeddings, names]` JSON).
    pub store_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Boolean match criterion.
    pub match_tolerance: f32,
    /// Maximum distance (exclusive) for accepting an identity.
    pub accuracy_threshold: f32,
    pub metric: DistanceMetric,
    /// Fail instead of continuing with no known faces when the store is unreadable.
    pub strict_store: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: facemood_core::cache_dir().join("capture.jpg"),
            store_path: facemood_core::data_dir().join("encodings.json"),
            model_dir: facemood_core::default_model_dir(),
            match_tolerance: DEFAULT_MATCH_TOLERANCE,
            accuracy_threshold: DEFAULT_ACCURACY_THRESHOLD,
            metric: DistanceMetric::default(),
            strict_store: false,
        }
    }
}

impl Config {
    /// Load from `file` (or `FACEMOOD_CONFIG`), then apply the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACEMOOD_CONFIG").ok().map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `FACEMOOD_*` variables; unparsable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEMOOD_IMAGE_PATH") {
            self.image_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEMOOD_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEMOOD_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        env_parse(&lookup, "FACEMOOD_MATCH_TOLERANCE", &mut self.match_tolerance);
        env_parse(&lookup, "FACEMOOD_ACCURACY_THRESHOLD", &mut self.accuracy_threshold);
        env_parse(&lookup, "FACEMOOD_METRIC", &mut self.metric);
        if let Some(v) = lookup("FACEMOOD_STRICT_STORE") {
            self.strict_store = v != "0" && !v.eq_ignore_ascii_case("false");
        }
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            metric: self.metric,
            tolerance: self.match_tolerance,
            accuracy_threshold: self.accuracy_threshold,
        }
    }

    pub fn store_policy(&self) -> StorePolicy {
        if self.strict_store {
            StorePolicy::Strict
        } else {
            StorePolicy::Lenient
        }
    }
}

fn env_parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable environment override"),
    }
}
