//! Emotion classification capability and the FER+ ONNX implementation.

use crate::detector::{DetectorError, FaceDetector};
use crate::types::{BoundingBox, EmotionAnalysis};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const FERPLUS_INPUT_SIZE: u32 = 64;

/// FER+ output order.
pub const EMOTION_LABELS: [&str; 8] = [
    "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
];

/// File name of the emotion model inside the model directory.
pub const FERPLUS_MODEL_FILE: &str = "emotion-ferplus-8.onnx";

#[derive(Error, Debug)]
pub enum EmotionError {
    #[error("emotion classifier unavailable")]
    Unavailable,
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("face could not be detected in {0}")]
    NoFace(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Classifies the emotion of the face(s) in an image file.
///
/// With `enforce_detection` off, implementations fall back to analysing the
/// whole image when they cannot find a face themselves.
pub trait EmotionClassifier {
    fn analyze(&mut self, image_path: &Path, enforce_detection: bool)
        -> Result<Vec<EmotionAnalysis>, EmotionError>;
}

impl<C: EmotionClassifier> EmotionClassifier for Option<C> {
    fn analyze(&mut self, image_path: &Path, enforce_detection: bool)
        -> Result<Vec<EmotionAnalysis>, EmotionError> {
        match self {
            Some(classifier) => classifier.analyze(image_path, enforce_detection),
            None => Err(EmotionError::Unavailable),
        }
    }
}

/// FER+ classifier, optionally restricted to faces found by its own detector.
pub struct OnnxEmotionClassifier {
    session: Session,
    detector: Option<FaceDetector>,
}

impl OnnxEmotionClassifier {
    /// Load the FER+ ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EmotionError> {
        if !model_path.exists() {
            return Err(EmotionError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded FER+ model");
        Ok(Self { session, detector: None })
    }

    /// Use `detector` to find the regions to classify.
    pub fn with_detector(mut self, detector: FaceDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    fn classify_region(&mut self, gray: &GrayImage) -> Result<Vec<f32>, EmotionError> {
        let input = preprocess(gray);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmotionError::InferenceFailed(format!("emotion logits: {e}")))?;

        if logits.len() != EMOTION_LABELS.len() {
            return Err(EmotionError::InferenceFailed(format!(
                "expected {} emotion scores, got {}",
                EMOTION_LABELS.len(),
                logits.len()
            )));
        }
        Ok(softmax(logits))
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn analyze(&mut self, image_path: &Path, enforce_detection: bool)
        -> Result<Vec<EmotionAnalysis>, EmotionError> {
        let image = image::open(image_path)?;

        let faces = match self.detector.as_mut() {
            Some(detector) => detector.detect(&image.to_rgb8())?,
            None => Vec::new(),
        };

        let regions: Vec<Option<BoundingBox>> = if !faces.is_empty() {
            faces.into_iter().map(Some).collect()
        } else if enforce_detection {
            return Err(EmotionError::NoFace(image_path.display().to_string()));
        } else {
            tracing::debug!(path = %image_path.display(), "no face located, classifying whole image");
            vec![None]
        };

        let gray = image.to_luma8();
        let mut analyses = Vec::with_capacity(regions.len());
        for region in regions {
            let crop = match &region {
                Some(bbox) => match crop_region(&gray, bbox) {
                    Some(crop) => crop,
                    None => continue,
                },
                None => gray.clone(),
            };

            let probs = self.classify_region(&crop)?;
            analyses.push(analysis_from_probs(&probs, region));
        }

        Ok(analyses)
    }
}

/// Build an analysis from label probabilities in [`EMOTION_LABELS`] order.
fn analysis_from_probs(probs: &[f32], region: Option<BoundingBox>) -> EmotionAnalysis {
    let dominant_emotion = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| EMOTION_LABELS[i].to_string());

    EmotionAnalysis {
        dominant_emotion,
        scores: EMOTION_LABELS
            .iter()
            .zip(probs)
            .map(|(label, p)| (label.to_string(), p * 100.0))
            .collect(),
        region,
    }
}

/// Crop `bbox` out of the frame, clamped to the image bounds.
fn crop_region(gray: &GrayImage, bbox: &BoundingBox) -> Option<GrayImage> {
    let x0 = bbox.x.max(0.0).floor() as u32;
    let y0 = bbox.y.max(0.0).floor() as u32;
    let x1 = ((bbox.x + bbox.width).ceil().max(0.0) as u32).min(gray.width());
    let y1 = ((bbox.y + bbox.height).ceil().max(0.0) as u32).min(gray.height());
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image())
}

/// Grayscale crop to the 1×1×64×64 FER+ input; raw pixel values, no scaling.
fn preprocess(gray: &GrayImage) -> Array4<f32> {
    let resized = imageops::resize(gray, FERPLUS_INPUT_SIZE, FERPLUS_INPUT_SIZE, FilterType::Triangle);
    let size = FERPLUS_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32;
    }
    tensor
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}
