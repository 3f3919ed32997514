//! Matching a probe embedding against the known-face store.
//!
//! Two stages: a boolean gate (`distance <= tolerance` for any entry) decides
//! whether the face is considered at all, then the candidate is the global
//! argmin of the distances, independent of which entries passed the gate.

use crate::store::KnownFaceStore;
use crate::types::{Embedding, MatchResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default boolean match criterion.
///
/// Both defaults are on the dlib 128-d Euclidean scale. For L2-normalized
/// ArcFace embeddings a Euclidean distance below 0.50 means cosine similarity
/// of at least 0.875, which same-person pairs rarely reach; stores built from
/// ArcFace need their own tolerance and threshold (or the cosine metric).
pub const DEFAULT_MATCH_TOLERANCE: f32 = 0.6;
/// Default maximum distance for accepting an identity (exclusive).
/// See [`DEFAULT_MATCH_TOLERANCE`] for the scale these values assume.
pub const DEFAULT_ACCURACY_THRESHOLD: f32 = 0.50;

#[derive(Error, Debug, PartialEq)]
pub enum MatchError {
    #[error("no name stored for encoding {index} ({names} names for {encodings} encodings)")]
    MissingName {
        index: usize,
        names: usize,
        encodings: usize,
    },
    #[error("encoding {index} has {found} dimensions, probe has {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Distance between two embeddings, lower = more similar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// `1 - cosine similarity`, in [0, 2].
    Cosine,
}

impl DistanceMetric {
    pub fn distance(self, a: &Embedding, b: &Embedding) -> f32 {
        match self {
            DistanceMetric::Euclidean => a.euclidean_distance(b),
            DistanceMetric::Cosine => 1.0 - a.similarity(b),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            other => Err(format!("unknown distance metric '{other}'")),
        }
    }
}

/// Thresholds and metric used by [`best_match`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    pub metric: DistanceMetric,
    /// Boolean gate: an entry "matches" when its distance is at most this.
    pub tolerance: f32,
    /// The argmin candidate is accepted when its distance is below this.
    pub accuracy_threshold: f32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            tolerance: DEFAULT_MATCH_TOLERANCE,
            accuracy_threshold: DEFAULT_ACCURACY_THRESHOLD,
        }
    }
}

/// Distance from `probe` to every known embedding, index-aligned.
///
/// Entries whose length differs from the probe get `NaN`, which never passes
/// the gate and is skipped by the argmin.
pub fn face_distance(metric: DistanceMetric, known: &[Embedding], probe: &Embedding) -> Vec<f32> {
    known
        .iter()
        .map(|k| {
            if k.len() == probe.len() {
                metric.distance(k, probe)
            } else {
                f32::NAN
            }
        })
        .collect()
}

/// Boolean match vector for precomputed distances.
pub fn compare_faces(distances: &[f32], tolerance: f32) -> Vec<bool> {
    distances.iter().map(|&d| d <= tolerance).collect()
}

/// Index of the smallest distance; the first one wins ties.
fn argmin(distances: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &d) in distances.iter().enumerate() {
        if d.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Find the candidate identity for `probe`.
///
/// Returns `Ok(None)` when no entry passes the boolean gate, and an error
/// when any stored encoding has a different length from the probe.
pub fn best_match(
    store: &KnownFaceStore,
    probe: &Embedding,
    settings: &MatchSettings,
) -> Result<Option<MatchResult>, MatchError> {
    if let Some((index, known)) =
        store.embeddings.iter().enumerate().find(|(_, k)| k.len() != probe.len())
    {
        return Err(MatchError::DimensionMismatch {
            index,
            expected: probe.len(),
            found: known.len(),
        });
    }

    let distances = face_distance(settings.metric, &store.embeddings, probe);
    let matches = compare_faces(&distances, settings.tolerance);

    if !matches.iter().any(|&m| m) {
        return Ok(None);
    }

    // A true gate implies at least one finite distance.
    let Some(index) = argmin(&distances) else {
        return Ok(None);
    };
    let distance = distances[index];

    let name = store.name(index).ok_or(MatchError::MissingName {
        index,
        names: store.names.len(),
        encodings: store.embeddings.len(),
    })?;

    Ok(Some(MatchResult {
        name: name.to_string(),
        index,
        distance,
        within_threshold: distance < settings.accuracy_threshold,
    }))
}
