//! Process-wide classifier cache
//!
//! Each artifact path gets one `OnceCell`. Concurrent first requests for the
//! same path block on that cell, so the artifact is loaded exactly once.
//! A failed load leaves the cell empty and the next request retries.

use super::classifier::{load_classifier, Classifier};
use super::prediction_engine::PredictionError;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

type ModelCell = Arc<OnceCell<Arc<dyn Classifier>>>;

static SHARED_CACHE: Lazy<Arc<ModelCache>> = Lazy::new(|| Arc::new(ModelCache::new()));

/// Loaded classifiers keyed by artifact path; read-only after load
#[derive(Debug, Default)]
pub struct ModelCache {
    cells: Mutex<HashMap<PathBuf, ModelCell>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache shared by every engine in the process
    pub fn shared() -> Arc<ModelCache> {
        Arc::clone(&SHARED_CACHE)
    }

    fn cell(&self, path: &Path) -> ModelCell {
        let mut cells = self.cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(cells.entry(path.to_path_buf()).or_default())
    }

    /// Classifier for `path`, loading it on first use
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<dyn Classifier>, PredictionError> {
        self.get_or_load_with(path, load_classifier)
    }

    /// Same as [`ModelCache::get_or_load`] with a custom loader
    pub fn get_or_load_with<F>(&self, path: &Path, loader: F) -> Result<Arc<dyn Classifier>, PredictionError>
    where
        F: FnOnce(&Path) -> Result<Arc<dyn Classifier>, PredictionError>,
    {
        // The map lock is released before loading; only this path's cell blocks
        let cell = self.cell(path);
        let classifier = cell.get_or_try_init(|| {
            info!("Loading classifier from {}", path.display());
            loader(path)
        })?;
        Ok(Arc::clone(classifier))
    }

    /// Whether `path` has been loaded successfully
    pub fn is_loaded(&self, path: &Path) -> bool {
        let cells = self.cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cells.get(path).map(|cell| cell.get().is_some()).unwrap_or(false)
    }
}
