//! One-shot orchestration: store → faces → match → emotion → payload.

use crate::emotion::EmotionClassifier;
use crate::encoder::{EncodeError, FaceEncoder};
use crate::matcher::{self, MatchError, MatchSettings};
use crate::payload::{self, ResultPayload};
use crate::store::{self, StoreError, StorePolicy};
use chrono::NaiveDateTime;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::path::Path;
use thiserror::Error;

/// Failures inside the main algorithm; each becomes an error payload
/// carrying its display text.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Encode(#[from] EncodeError),
    #[error("{0}")]
    Match(#[from] MatchError),
    #[error("failed to write image for emotion analysis: {0}")]
    SaveFrame(#[from] image::ImageError),
    #[error("failed to remove {path}: {source}")]
    Cleanup {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of the `time` field.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Ask `classifier` for the dominant emotion in `image_path`.
///
/// Any failure or unexpected result shape yields `None`; the cause is logged.
pub fn detect_emotion<C: EmotionClassifier + ?Sized>(classifier: &mut C, image_path: &Path) -> Option<String> {
    if !image_path.is_file() {
        tracing::warn!(path = %image_path.display(), "image for emotion analysis does not exist");
        return None;
    }

    // A face was already located upstream, so the classifier may not refuse.
    match classifier.analyze(image_path, false) {
        Ok(results) => {
            tracing::debug!(regions = results.len(), "emotion analysis done");
            let dominant = results.into_iter().next().and_then(|r| r.dominant_emotion);
            if dominant.is_none() {
                tracing::warn!("emotion result had no dominant emotion");
            }
            dominant
        }
        Err(err) => {
            tracing::warn!(error = %err, "emotion detection failed");
            None
        }
    }
}

/// Decode by content rather than extension, keeping the detected format.
/// Write `frame` to `path`, removing whatever was written if encoding fails.
fn save_frame(
    frame: &DynamicImage,
    format: Option<ImageFormat>,
    path: &Path,
) -> Result<(), PipelineError> {
    let saved = match format {
        Some(format) => frame.save_with_format(path, format),
        None => frame.save(path),
    };
    if let Err(err) = saved {
        if path.exists() {
            if let Err(cleanup) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial frame");
            }
        }
        return Err(err.into());
    }
    Ok(())
}

fn decode_frame(path: &Path) -> Result<(DynamicImage, Option<ImageFormat>), ImageError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    Ok((reader.decode()?, format))
}

/// Matches a captured photo against the known faces and classifies emotion.
pub struct FacePipeline<E, C> {
    encoder: E,
    classifier: C,
    settings: MatchSettings,
    store_policy: StorePolicy,
    clock: Clock,
}

impl<E: FaceEncoder, C: EmotionClassifier> FacePipeline<E, C> {
    pub fn new(encoder: E, classifier: C) -> Self {
        Self {
            encoder,
            classifier,
            settings: MatchSettings::default(),
            store_policy: StorePolicy::default(),
            clock: local_now,
        }
    }

    pub fn with_settings(mut self, settings: MatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_store_policy(mut self, policy: StorePolicy) -> Self {
        self.store_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Run the pipeline once. Never fails: every outcome is a payload.
    pub fn process_image(&mut self, image_path: &Path, store_path: &Path) -> ResultPayload {
        tracing::info!(image = %image_path.display(), store = %store_path.display(), "processing image");

        if !image_path.exists() {
            return ResultPayload::error(payload::MSG_IMAGE_NOT_FOUND);
        }
        if !store_path.exists() {
            return ResultPayload::error(payload::MSG_STORE_NOT_FOUND);
        }

        let (frame, format) = match decode_frame(image_path) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(error = %err, "image decode failed");
                return ResultPayload::error(payload::MSG_IMAGE_DECODE);
            }
        };

        match self.run(&frame, format, image_path, store_path) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "processing failed");
                ResultPayload::error(err.to_string())
            }
        }
    }

    fn run(
        &mut self,
        frame: &DynamicImage,
        format: Option<ImageFormat>,
        image_path: &Path,
        store_path: &Path,
    ) -> Result<ResultPayload, PipelineError> {
        let known = store::load_with_policy(store_path, self.store_policy)?;
        let faces = self.encoder.encode(frame)?;

        if faces.is_empty() {
            return Ok(ResultPayload::error(payload::MSG_NO_FACE));
        }

        for (i, face) in faces.iter().enumerate() {
            let Some(candidate) = matcher::best_match(&known, &face.embedding, &self.settings)? else {
                tracing::info!(face = i, "no known face within tolerance");
                return Ok(ResultPayload::error(payload::MSG_NOT_RECOGNIZED));
            };

            tracing::debug!(
                face = i,
                name = %candidate.name,
                distance = candidate.distance,
                within_threshold = candidate.within_threshold,
                "best match"
            );

            if !candidate.within_threshold {
                continue;
            }

            // The classifier reads from disk, so the decoded frame is written
            // back to the capture path and removed afterwards.
            save_frame(frame, format, image_path)?;
            let emotion = detect_emotion(&mut self.classifier, image_path);
            let now = (self.clock)();

            if image_path.exists() {
                std::fs::remove_file(image_path).map_err(|source| PipelineError::Cleanup {
                    path: image_path.display().to_string(),
                    source,
                })?;
            }

            return Ok(match emotion {
                Some(emotion) => {
                    tracing::info!(name = %candidate.name, %emotion, "face recognized");
                    ResultPayload::success(candidate.name, emotion, now)
                }
                None => ResultPayload::emotion_undetected(&candidate.name),
            });
        }

        tracing::info!(faces = faces.len(), "no face matched below the accuracy threshold");
        Ok(ResultPayload::error(payload::MSG_NOT_RECOGNIZED))
    }
}
