use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facemood_core::detector::{FaceDetector, SCRFD_MODEL_FILE};
use facemood_core::emotion::FERPLUS_MODEL_FILE;
use facemood_core::recognizer::ARCFACE_MODEL_FILE;
use facemood_core::{FacePipeline, OnnxEmotionClassifier, OnnxFaceEncoder, ResultPayload};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(
    name = "facemood",
    version,
    about = "Recognize a known face in a photo and report its emotion as JSON"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML config file (defaults to $FACEMOOD_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Captured photo to analyse
    #[arg(long, global = true)]
    image: Option<PathBuf>,

    /// Known-face store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Directory containing the ONNX models
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Treat an unreadable store as an error instead of an empty store
    #[arg(long, global = true)]
    strict_store: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Match the captured photo and print the result payload (default)
    Process,
    /// Summarize the known-face store
    Inspect,
    /// Show resolved configuration and model availability
    Status,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(image) = &self.image {
            config.image_path = image.clone();
        }
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if self.strict_store {
            config.strict_store = true;
        }
    }

    fn config(&self) -> Result<Config, config::ConfigError> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply(&mut config);
        Ok(config)
    }
}

fn main() -> Result<()> {
    // stdout carries only the result payload.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Process) {
        Commands::Process => {
            let payload = match cli.config() {
                Ok(config) => process(&config),
                Err(err) => {
                    tracing::error!(error = %err, "configuration error");
                    ResultPayload::error(err.to_string())
                }
            };
            println!("{}", payload.to_json());
        }
        Commands::Inspect => inspect(&cli.config().context("loading configuration")?)?,
        Commands::Status => status(&cli.config().context("loading configuration")?)?,
    }

    Ok(())
}

fn process(config: &Config) -> ResultPayload {
    let encoder = match OnnxFaceEncoder::load(&config.model_dir) {
        Ok(encoder) => encoder,
        Err(err) => {
            tracing::error!(error = %err, model_dir = %config.model_dir.display(), "failed to load face models");
            return ResultPayload::error(err.to_string());
        }
    };

    let classifier = load_classifier(&config.model_dir);

    FacePipeline::new(encoder, classifier)
        .with_settings(config.match_settings())
        .with_store_policy(config.store_policy())
        .process_image(&config.image_path, &config.store_path)
}

/// The emotion model is optional: without it every match degrades to
/// "emotion not detected".
fn load_classifier(model_dir: &Path) -> Option<OnnxEmotionClassifier> {
    let classifier = match OnnxEmotionClassifier::load(&model_dir.join(FERPLUS_MODEL_FILE)) {
        Ok(classifier) => classifier,
        Err(err) => {
            tracing::warn!(error = %err, "emotion model unavailable");
            return None;
        }
    };

    match FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE)) {
        Ok(detector) => Some(classifier.with_detector(detector)),
        Err(err) => {
            tracing::warn!(error = %err, "emotion classifier will analyse whole images");
            Some(classifier)
        }
    }
}

fn inspect(config: &Config) -> Result<()> {
    let store = facemood_core::load_known_faces(&config.store_path)
        .with_context(|| format!("reading {}", config.store_path.display()))?;

    if store.names.len() != store.len() {
        tracing::warn!(
            encodings = store.len(),
            names = store.names.len(),
            "store has mismatched encodings and names"
        );
    }

    let summary = serde_json::json!({
        "path": config.store_path.display().to_string(),
        "exists": config.store_path.exists(),
        "entries": store.len(),
        "names": &store.names,
        "dimensions": store.dimensions(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let model = |file: &str| config.model_dir.join(file).exists();
    let summary = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "image_path": config.image_path.display().to_string(),
        "image_present": config.image_path.exists(),
        "store_path": config.store_path.display().to_string(),
        "store_present": config.store_path.exists(),
        "model_dir": config.model_dir.display().to_string(),
        "models": {
            (SCRFD_MODEL_FILE): model(SCRFD_MODEL_FILE),
            (ARCFACE_MODEL_FILE): model(ARCFACE_MODEL_FILE),
            (FERPLUS_MODEL_FILE): model(FERPLUS_MODEL_FILE),
        },
        "match_tolerance": config.match_tolerance,
        "accuracy_threshold": config.accuracy_threshold,
        "metric": config.metric,
        "strict_store": config.strict_store,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_process() {
        let cli = Cli::try_parse_from(["facemood"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "facemood", "inspect", "--store", "/data/enc.json", "--strict-store",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Inspect)));

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.store_path, PathBuf::from("/data/enc.json"));
        assert!(config.strict_store);
        assert_eq!(config.image_path, Config::default().image_path);
    }

    #[test]
    fn missing_models_yield_error_payload() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model_dir: dir.path().join("models"),
            image_path: dir.path().join("capture.jpg"),
            store_path: dir.path().join("encodings.json"),
            ..Config::default()
        };
        let payload = process(&config);
        assert!(!payload.is_success());
        assert!(payload.message.unwrap().contains("model file not found"));
    }

    #[test]
    fn missing_emotion_model_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_classifier(dir.path()).is_none());
    }
}
