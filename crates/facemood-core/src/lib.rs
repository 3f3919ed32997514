//! facemood-core: known-face matching and emotion classification.
//!
//! Matches faces found by SCRFD + ArcFace against a precomputed store of
//! embeddings, then classifies emotion with FER+. Both models sit behind the
//! [`FaceEncoder`] and [`EmotionClassifier`] traits so the orchestration in
//! [`FacePipeline`] can run without them.

pub mod alignment;
pub mod detector;
pub mod emotion;
pub mod encoder;
pub mod matcher;
pub mod payload;
pub mod pipeline;
pub mod recognizer;
pub mod store;
pub mod types;

pub use emotion::{EmotionClassifier, EmotionError, OnnxEmotionClassifier};
pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use matcher::{DistanceMetric, MatchSettings};
pub use payload::{ResultPayload, Status};
pub use pipeline::{detect_emotion, FacePipeline, PipelineError};
pub use store::{load_known_faces, KnownFaceStore, StoreError, StorePolicy};
pub use types::{BoundingBox, DetectedFace, EmotionAnalysis, Embedding, MatchResult};

use std::path::PathBuf;

/// Model directory used when none is configured: `$XDG_DATA_HOME/facemood/models`.
pub fn default_model_dir() -> PathBuf {
    data_dir().join("models")
}

/// `$XDG_DATA_HOME/facemood`, falling back to `~/.local/share/facemood`.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share").join("facemood")
}

/// `$XDG_CACHE_HOME/facemood`, falling back to `~/.cache/facemood`.
pub fn cache_dir() -> PathBuf {
    xdg_dir("XDG_CACHE_HOME", ".cache").join("facemood")
}

fn xdg_dir(var: &str, home_suffix: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(home_suffix)
    })
}
