//! Face location + embedding capability.

use crate::detector::{DetectorError, FaceDetector, SCRFD_MODEL_FILE};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_MODEL_FILE};
use crate::types::DetectedFace;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Locates faces in an image and produces one embedding per face.
///
/// Faces are returned in the locator's own order; callers must not rely on
/// any particular sort.
pub trait FaceEncoder {
    fn encode(&mut self, image: &DynamicImage) -> Result<Vec<DetectedFace>, EncodeError>;
}

/// SCRFD detection followed by ArcFace embedding extraction.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self { detector, recognizer }
    }

    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self::new(detector, recognizer))
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, image: &DynamicImage) -> Result<Vec<DetectedFace>, EncodeError> {
        let frame = image.to_rgb8();
        let boxes = self.detector.detect(&frame)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            if bbox.landmarks.is_none() {
                tracing::debug!(confidence = bbox.confidence, "skipping face without landmarks");
                continue;
            }
            let embedding = self.recognizer.extract(&frame, &bbox)?;
            faces.push(DetectedFace { bbox, embedding });
        }

        tracing::debug!(faces = faces.len(), "faces encoded");
        Ok(faces)
    }
}
