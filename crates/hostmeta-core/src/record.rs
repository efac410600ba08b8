//! Per-host metadata record and snapshot types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::InventoryError;
use crate::file;

/// Hostname under which a fresh store keeps its skeleton record
pub const SKELETON_HOST: &str = "structure";

/// Category → value mapping for one host
///
/// The category set is open and values are arbitrary JSON; the shape of each
/// category is a contract between the collector and whoever reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord(Map<String, Value>);

impl MetadataRecord {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Record with the fixed default categories
    ///
    /// `network={}`, `vms=[]`, `users=[]`, `mounts=[]`,
    /// `storage={"get_info": []}`, `comment=""`, `collection_time=""`.
    #[must_use]
    pub fn skeleton() -> Self {
        let mut record = Self::new();
        record.insert("network", json!({}));
        record.insert("vms", json!([]));
        record.insert("users", json!([]));
        record.insert("mounts", json!([]));
        record.insert("storage", json!({"get_info": []}));
        record.insert("comment", json!(""));
        record.insert("collection_time", json!(""));
        record
    }

    /// Set a category, returning the previous value
    pub fn insert(&mut self, category: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(category.into(), value)
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, category: impl Into<String>, value: Value) -> Self {
        self.insert(category, value);
        self
    }

    #[must_use]
    pub fn get(&self, category: &str) -> Option<&Value> {
        self.0.get(category)
    }

    /// Category names in ascending order
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for MetadataRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for MetadataRecord {
    type Error = Value;

    /// Accepts only JSON objects; anything else is handed back unchanged.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// A single-host `{hostname: record}` document
///
/// This is what a collect run produces when it does not write into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    /// Host the record describes
    pub hostname: String,
    /// Collected categories
    pub record: MetadataRecord,
}

impl HostSnapshot {
    pub fn new(hostname: impl Into<String>, record: MetadataRecord) -> Self {
        Self {
            hostname: hostname.into(),
            record,
        }
    }

    /// Document form: one top-level key, the hostname
    #[must_use]
    pub fn to_document(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert(
            self.hostname.clone(),
            Value::Object(self.record.as_map().clone()),
        );
        doc
    }

    /// File name used when snapshots are dropped into a merge directory
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.json", self.hostname)
    }

    /// Write the snapshot to `path`, overwriting it
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), InventoryError> {
        file::write_json(&self.to_document(), path)
    }

    /// Write the snapshot as `<dir>/<hostname>.json`
    ///
    /// Refuses to replace an existing file: in a shared merge directory that
    /// file may belong to another collector run.
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the target exists, or an I/O error.
    pub fn write_into_dir(&self, dir: &Path) -> Result<PathBuf, InventoryError> {
        let path = dir.join(self.file_name());
        file::write_new_json(&self.to_document(), &path)?;
        Ok(path)
    }
}
