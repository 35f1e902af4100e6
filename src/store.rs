//! Persistence for finished analyses
//!
//! The whole collection lives as one JSON array under [`STORAGE_KEY`].
//! Every mutation rewrites the array; the in-memory mirror is only swapped
//! once the write went through.

mod blob;
#[cfg(test)]
pub(crate) mod testing;

pub use blob::{BlobStore, SqliteBlobStore};

use crate::model::Analysis;
use thiserror::Error;

/// Key the analysis collection is stored under
pub const STORAGE_KEY: &str = "logic-tree-analyses";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Saved analyses, newest first
pub struct AnalysisStore {
    blob: Box<dyn BlobStore>,
    analyses: Vec<Analysis>,
    last_error: Option<String>,
}

impl AnalysisStore {
    /// Wrap `blob` without reading it yet
    pub fn new(blob: Box<dyn BlobStore>) -> Self {
        Self {
            blob,
            analyses: Vec::new(),
            last_error: None,
        }
    }

    /// Wrap `blob` and load the collection
    pub fn open(blob: Box<dyn BlobStore>) -> Self {
        let mut store = Self::new(blob);
        store.load();
        store
    }

    /// Re-read the collection. Missing or unreadable data yields an empty
    /// collection.
    pub fn load(&mut self) -> &[Analysis] {
        self.analyses = match self.read() {
            Ok(analyses) => {
                self.last_error = None;
                analyses
            }
            Err(error) => {
                tracing::warn!(error = %error, "Could not load saved analyses, starting empty");
                self.last_error = Some(error.to_string());
                Vec::new()
            }
        };
        &self.analyses
    }

    /// Insert or replace by id
    pub fn save(&mut self, analysis: &Analysis) -> StoreResult<()> {
        let mut next = self.analyses.clone();
        match next.iter_mut().find(|a| a.id == analysis.id) {
            Some(slot) => slot.clone_from(analysis),
            None => next.insert(0, analysis.clone()),
        }
        self.write(next)
    }

    /// Remove by id; unknown ids are ignored
    pub fn delete(&mut self, id: &str) -> StoreResult<()> {
        if self.get_by_id(id).is_none() {
            return Ok(());
        }
        let next = self
            .analyses
            .iter()
            .filter(|a| a.id != id)
            .cloned()
            .collect();
        self.write(next)
    }

    /// Drop every saved analysis
    pub fn clear(&mut self) -> StoreResult<()> {
        let result = self.blob.remove(STORAGE_KEY);
        self.settle(result.map(|()| Vec::new()))
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Analysis> {
        self.analyses.iter().find(|a| a.id == id)
    }

    pub fn list(&self) -> &[Analysis] {
        &self.analyses
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn read(&self) -> StoreResult<Vec<Analysis>> {
        let Some(raw) = self.blob.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        let mut analyses: Vec<Analysis> = serde_json::from_str(&raw)?;
        newest_first(&mut analyses);
        Ok(analyses)
    }

    fn write(&mut self, mut next: Vec<Analysis>) -> StoreResult<()> {
        newest_first(&mut next);
        let result = serde_json::to_string(&next)
            .map_err(StoreError::from)
            .and_then(|raw| self.blob.set(STORAGE_KEY, &raw));
        self.settle(result.map(|()| next))
    }

    fn settle(&mut self, result: StoreResult<Vec<Analysis>>) -> StoreResult<()> {
        match result {
            Ok(next) => {
                self.analyses = next;
                self.last_error = None;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to write saved analyses");
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }
}

/// Stable, so equal timestamps keep their insertion order
fn newest_first(analyses: &mut [Analysis]) {
    analyses.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
