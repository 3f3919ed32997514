//! Known-face store: precomputed embeddings paired with person names.
//!
//! On disk the store is the serialized pair `[embeddings, names]`, index-aligned.
//! Loading never validates the pairing; a malformed store surfaces later in
//! the matcher.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read encodings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode encodings: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What to do when the store exists but cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorePolicy {
    /// Log the cause and continue with an empty store.
    #[default]
    Lenient,
    /// Surface the failure as an error result.
    Strict,
}

/// Embeddings and names, `embeddings[i]` belongs to `names[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Vec<Embedding>, Vec<String>)", into = "(Vec<Embedding>, Vec<String>)")]
pub struct KnownFaceStore {
    pub embeddings: Vec<Embedding>,
    pub names: Vec<String>,
}

impl From<(Vec<Embedding>, Vec<String>)> for KnownFaceStore {
    fn from((embeddings, names): (Vec<Embedding>, Vec<String>)) -> Self {
        Self { embeddings, names }
    }
}

impl From<KnownFaceStore> for (Vec<Embedding>, Vec<String>) {
    fn from(store: KnownFaceStore) -> Self {
        (store.embeddings, store.names)
    }
}

impl KnownFaceStore {
    pub fn new(embeddings: Vec<Embedding>, names: Vec<String>) -> Self {
        Self { embeddings, names }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Name paired with the embedding at `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Distinct embedding dimensions present in the store, ascending.
    pub fn dimensions(&self) -> Vec<usize> {
        let mut dims: Vec<usize> = self.embeddings.iter().map(Embedding::len).collect();
        dims.sort_unstable();
        dims.dedup();
        dims
    }
}

/// Load the known-face store from `path`.
///
/// A missing file yields an empty store. Read and decode failures are
/// returned to the caller, which picks a [`StorePolicy`].
pub fn load_known_faces(path: &Path) -> Result<KnownFaceStore, StoreError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "encodings file absent, using empty store");
        return Ok(KnownFaceStore::default());
    }

    let reader = BufReader::new(File::open(path)?);
    let store: KnownFaceStore = serde_json::from_reader(reader)?;

    tracing::info!(
        path = %path.display(),
        entries = store.len(),
        names = store.names.len(),
        "loaded known faces"
    );

    Ok(store)
}

/// Load the store and apply `policy` to failures.
pub fn load_with_policy(path: &Path, policy: StorePolicy) -> Result<KnownFaceStore, StoreError> {
    match load_known_faces(path) {
        Ok(store) => Ok(store),
        Err(err) if policy == StorePolicy::Lenient => {
            tracing::warn!(path = %path.display(), error = %err, "failed to load encodings, continuing with no known faces");
            Ok(KnownFaceStore::default())
        }
        Err(err) => Err(err),
    }
}
