//! Merge engine for directories of per-host JSON documents
//!
//! A [`MergeBatch`] moves through `Empty → Loaded → Combined → Written`.
//! Documents are folded with a shallow update, so on a top-level key
//! collision the later document wins. Files are read in file name order.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{Span, debug, info, info_span, instrument, warn};

use crate::error::InventoryError;
use crate::file;

/// Lifecycle of a merge batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Empty,
    Loaded,
    Combined,
    Written,
}

/// Transient accumulation of JSON documents pending combination
#[derive(Debug)]
pub struct MergeBatch {
    /// Loaded documents, in fold order
    documents: Vec<Map<String, Value>>,
    /// Output of the last combine call
    merged: Option<Map<String, Value>>,
    state: BatchState,
    span: Span,
}

impl Default for MergeBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeBatch {
    /// Create an empty batch
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            merged: None,
            state: BatchState::Empty,
            span: info_span!("merge_batch"),
        }
    }

    /// Create a batch from every `.json` file in `dir`
    ///
    /// # Errors
    /// See [`load_directory`](Self::load_directory).
    pub fn read_directory(dir: &Path) -> Result<Self, InventoryError> {
        let mut batch = Self::new();
        batch.load_directory(dir)?;
        Ok(batch)
    }

    /// Append every `.json` regular file in `dir`, ordered by file name
    ///
    /// Other entries (subdirectories, `.txt` files, ...) are skipped. Returns
    /// the number of documents loaded.
    ///
    /// # Errors
    /// Returns an I/O error if `dir` cannot be listed, or `Format` naming the
    /// first file that is not a JSON object.
    #[instrument(parent = &self.span, skip_all, fields(dir = %dir.display()))]
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, InventoryError> {
        let files = json_files(dir)?;
        let mut loaded = Vec::with_capacity(files.len());

        for path in &files {
            debug!(file = %path.display(), "reading document");
            loaded.push(file::read_object(path)?);
        }

        let count = loaded.len();
        self.documents.extend(loaded);
        self.merged = None;
        self.state = BatchState::Loaded;

        info!(documents = count, "directory loaded");
        Ok(count)
    }

    /// Append an in-memory document
    pub fn push(&mut self, document: Map<String, Value>) {
        self.documents.push(document);
        self.merged = None;
        self.state = BatchState::Loaded;
    }

    /// Fold all documents into one mapping; later documents win
    ///
    /// An empty batch combines to `{}`.
    pub fn combine_flat(&mut self) -> &Map<String, Value> {
        let merged = fold(&self.documents);
        self.finish_combine(merged)
    }

    /// Fold all documents and wrap the result as `{root: merged}`
    ///
    /// An empty batch combines to `{root: {}}`.
    pub fn combine_nested(&mut self, root: &str) -> &Map<String, Value> {
        let mut wrapped = Map::new();
        wrapped.insert(root.to_string(), Value::Object(fold(&self.documents)));
        self.finish_combine(wrapped)
    }

    /// Write the combined document to `path`, overwriting it
    ///
    /// # Errors
    /// Returns `State` if no combine has happened since the last load, or an
    /// I/O error from the write.
    #[instrument(parent = &self.span, skip_all, fields(out = %path.display()))]
    pub fn write(&mut self, path: &Path) -> Result<(), InventoryError> {
        let Some(merged) = self.merged.as_ref() else {
            return Err(InventoryError::State(format!(
                "merge batch is {:?}; combine it before writing",
                self.state
            )));
        };

        file::write_json(merged, path)?;
        self.state = BatchState::Written;
        info!(keys = merged.len(), "merged document written");
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Number of loaded documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Output of the last combine call, if any
    #[must_use]
    pub fn merged(&self) -> Option<&Map<String, Value>> {
        self.merged.as_ref()
    }

    fn finish_combine(&mut self, merged: Map<String, Value>) -> &Map<String, Value> {
        let _guard = self.span.enter();
        debug!(
            documents = self.documents.len(),
            keys = merged.len(),
            "batch combined"
        );

        self.state = BatchState::Combined;
        self.merged.insert(merged)
    }
}

/// Shallow update of every document into one mapping
fn fold(documents: &[Map<String, Value>]) -> Map<String, Value> {
    let mut merged = Map::new();
    for document in documents {
        for (key, value) in document {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// `.json` regular files directly inside `dir`, sorted by file name
fn json_files(dir: &Path) -> Result<Vec<PathBuf>, InventoryError> {
    let entries = fs::read_dir(dir).map_err(|e| InventoryError::io(dir, e))?;
    let mut files = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| InventoryError::io(dir, e))?;
        let path = entry.path();

        let is_json = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".json"));
        if !is_json {
            debug!(entry = %path.display(), "skipping non-json entry");
            continue;
        }
        if !path.is_file() {
            warn!(entry = %path.display(), "skipping json entry that is not a regular file");
            continue;
        }

        files.push(path);
    }

    files.sort();
    Ok(files)
}
