//! JSON-backed hostname → record store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{Span, debug, info, info_span, warn};

use crate::error::InventoryError;
use crate::file;
use crate::record::{MetadataRecord, SKELETON_HOST};

/// Result of looking up one key on every host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyLookup {
    /// Hosts that carry the key, with its value
    pub matches: BTreeMap<String, Value>,
    /// Hosts without the key, ascending
    pub misses: Vec<String>,
}

/// Inventory store
///
/// Owns the whole hostname → record mapping between load and persist. The
/// backing file is rewritten wholesale on every persist; there is no locking,
/// so two processes persisting the same path race and the last one wins.
#[derive(Debug)]
pub struct InventoryStore {
    /// Backing file
    path: PathBuf,
    /// Records by hostname
    hosts: BTreeMap<String, MetadataRecord>,
    /// Logging span for this store
    span: Span,
}

impl InventoryStore {
    /// Load the store at `path`, creating it if absent
    ///
    /// A missing file is created with the skeleton document
    /// (`{"structure": <skeleton record>}`) and then read back.
    ///
    /// # Errors
    /// Returns `Format` if the file is not a JSON object of objects, or an I/O
    /// error if it cannot be read or created.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let path = path.into();
        let span = info_span!("inventory_store", path = %path.display());
        let guard = span.enter();

        if !path.exists() {
            warn!("no inventory file found, creating a new one");
            file::write_json(&skeleton_document(), &path)?;
            info!("created inventory file");
        }

        let hosts = read_hosts(&path)?;
        debug!(hosts = hosts.len(), "inventory loaded");

        drop(guard);
        Ok(Self { path, hosts, span })
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of hosts
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    #[must_use]
    pub fn contains_host(&self, hostname: &str) -> bool {
        self.hosts.contains_key(hostname)
    }

    /// Full record for a host
    ///
    /// # Errors
    /// Returns `HostNotFound` if the host is not in the store.
    pub fn get_record(&self, hostname: &str) -> Result<&MetadataRecord, InventoryError> {
        self.hosts
            .get(hostname)
            .ok_or_else(|| InventoryError::HostNotFound(hostname.to_string()))
    }

    /// Category names stored for a host, ascending
    ///
    /// # Errors
    /// Returns `HostNotFound` if the host is not in the store.
    pub fn get_keys(&self, hostname: &str) -> Result<Vec<String>, InventoryError> {
        Ok(self.get_record(hostname)?.categories())
    }

    /// Value of one category on one host
    ///
    /// # Errors
    /// Returns `HostNotFound` or `KeyNotFound` (naming both host and key).
    pub fn get_value(&self, hostname: &str, key: &str) -> Result<&Value, InventoryError> {
        self.get_record(hostname)?
            .get(key)
            .ok_or_else(|| InventoryError::KeyNotFound {
                host: hostname.to_string(),
                key: key.to_string(),
            })
    }

    /// All hostnames, ascending
    #[must_use]
    pub fn list_hosts(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    /// Look up `key` on every host
    ///
    /// Every host ends up in exactly one of `matches` or `misses`.
    #[must_use]
    pub fn get_key_across_hosts(&self, key: &str) -> KeyLookup {
        let mut lookup = KeyLookup::default();

        for (host, record) in &self.hosts {
            match record.get(key) {
                Some(value) => {
                    lookup.matches.insert(host.clone(), value.clone());
                }
                None => lookup.misses.push(host.clone()),
            }
        }

        lookup
    }

    /// Insert or fully replace the record for `hostname`
    ///
    /// Categories of a previous record that are absent from `record` are
    /// dropped.
    pub fn add_host(&mut self, hostname: impl Into<String>, record: MetadataRecord) {
        let hostname = hostname.into();
        let _guard = self.span.enter();

        match self.hosts.insert(hostname.clone(), record) {
            Some(_) => info!(host = %hostname, "replaced host record"),
            None => info!(host = %hostname, "added host"),
        }
    }

    /// Add every top-level entry of a merged document as a host
    ///
    /// Each entry replaces any existing record for that host. The document is
    /// checked first; if any entry is not an object nothing is imported.
    ///
    /// # Errors
    /// Returns `Format` naming the first offending host.
    pub fn import(&mut self, document: &Map<String, Value>) -> Result<usize, InventoryError> {
        let _guard = self.span.enter();

        if let Some((host, value)) = document.iter().find(|(_, v)| !v.is_object()) {
            return Err(InventoryError::format(
                &self.path,
                format!(
                    "imported host `{host}` is {}, expected an object",
                    file::json_kind(value)
                ),
            ));
        }

        for (host, value) in document {
            if let Value::Object(map) = value {
                self.hosts.insert(host.clone(), MetadataRecord::from(map.clone()));
            }
        }

        info!(hosts = document.len(), "imported hosts");
        Ok(document.len())
    }

    /// Write the store back to its own file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn persist(&self) -> Result<(), InventoryError> {
        self.persist_to(&self.path)
    }

    /// Write the store to `path`, replacing it atomically
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be written.
    pub fn persist_to(&self, path: &Path) -> Result<(), InventoryError> {
        let _guard = self.span.enter();

        file::write_json(&self.hosts, path)?;
        info!(hosts = self.hosts.len(), out = %path.display(), "inventory persisted");
        Ok(())
    }
}

/// `{"structure": <skeleton record>}`
fn skeleton_document() -> BTreeMap<String, MetadataRecord> {
    BTreeMap::from([(SKELETON_HOST.to_string(), MetadataRecord::skeleton())])
}

fn read_hosts(path: &Path) -> Result<BTreeMap<String, MetadataRecord>, InventoryError> {
    let document = file::read_object(path)?;
    let mut hosts = BTreeMap::new();

    for (host, value) in document {
        let record = MetadataRecord::try_from(value).map_err(|other| {
            InventoryError::format(
                path,
                format!(
                    "record for host `{host}` is {}, expected an object",
                    file::json_kind(&other)
                ),
            )
        })?;
        hosts.insert(host, record);
    }

    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn store_with(dir: &Path, doc: Value) -> InventoryStore {
        let path = dir.join("servers.json");
        fs::write(&path, doc.to_string()).unwrap();
        InventoryStore::load(path).unwrap()
    }

    #[test]
    fn test_load_creates_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("servers.json");

        let store = InventoryStore::load(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.list_hosts(), vec!["structure"]);
        assert_eq!(
            store.get_record("structure").unwrap(),
            &MetadataRecord::skeleton()
        );

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            json!({"structure": {
                "network": {},
                "vms": [],
                "users": [],
                "mounts": [],
                "storage": {"get_info": []},
                "comment": "",
                "collection_time": ""
            }})
        );
    }

    #[test]
    fn test_load_malformed_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        fs::write(&path, "{ not json").unwrap();

        let err = InventoryStore::load(&path).unwrap_err();
        assert!(matches!(err, InventoryError::Format { .. }));
        // the broken file is left alone
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_load_rejects_non_object_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        fs::write(&path, r#"{"node01": [1, 2]}"#).unwrap();

        let err = InventoryStore::load(&path).unwrap_err();
        assert!(err.to_string().contains("node01"));
    }

    #[test]
    fn test_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            dir.path(),
            json!({
                "node02": {"cpu": "y", "users": ["bob"]},
                "node01": {"cpu": "x", "comment": "", "users": []}
            }),
        );

        assert_eq!(store.list_hosts(), vec!["node01", "node02"]);
        assert_eq!(
            store.get_keys("node01").unwrap(),
            vec!["comment", "cpu", "users"]
        );
        assert_eq!(store.get_value("node02", "cpu").unwrap(), &json!("y"));
        assert!(matches!(
            store.get_keys("node03"),
            Err(InventoryError::HostNotFound(_))
        ));
        assert!(matches!(
            store.get_value("node03", "cpu"),
            Err(InventoryError::HostNotFound(_))
        ));
    }

    #[test]
    fn test_get_value_missing_key_names_both() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), json!({"node01": {"cpu": "x"}}));

        let err = store.get_value("node01", "mpi").unwrap_err();
        match &err {
            InventoryError::KeyNotFound { host, key } => {
                assert_eq!(host, "node01");
                assert_eq!(key, "mpi");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_not_found());
    }

    #[test]
    fn test_key_across_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            dir.path(),
            json!({
                "a": {"users": ["root"]},
                "b": {"cpu": "x"},
                "c": {"users": []}
            }),
        );

        let lookup = store.get_key_across_hosts("users");

        assert_eq!(lookup.matches.len(), 2);
        assert_eq!(lookup.matches["a"], json!(["root"]));
        assert_eq!(lookup.matches["c"], json!([]));
        assert_eq!(lookup.misses, vec!["b"]);
    }

    #[test]
    fn test_add_host_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), json!({"node01": {"cpu": "x", "mpi": "4.1"}}));

        let record = MetadataRecord::new().with("comment", json!("test"));
        store.add_host("node01", record.clone());

        assert_eq!(store.get_record("node01").unwrap(), &record);
        assert!(matches!(
            store.get_value("node01", "cpu"),
            Err(InventoryError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_add_persist_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("servers.json");

        let mut store = InventoryStore::load(&path).unwrap();
        store.add_host("node01", MetadataRecord::new().with("comment", json!("test")));
        store.persist().unwrap();

        let reloaded = InventoryStore::load(&path).unwrap();
        assert_eq!(reloaded.list_hosts(), vec!["node01", "structure"]);
        assert_eq!(
            reloaded.get_value("node01", "comment").unwrap(),
            &json!("test")
        );
    }

    #[test]
    fn test_persist_to_other_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), json!({"node01": {"cpu": "x"}}));
        let out = dir.path().join("export").join("copy.json");

        store.persist_to(&out).unwrap();

        let copy = InventoryStore::load(&out).unwrap();
        assert_eq!(copy.get_value("node01", "cpu").unwrap(), &json!("x"));
    }

    #[test]
    fn test_import_merged_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), json!({"node01": {"cpu": "old", "mpi": "x"}}));

        let merged = json!({"node01": {"cpu": "new"}, "node02": {"cpu": "y"}});
        let count = store.import(merged.as_object().unwrap()).unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.get_keys("node01").unwrap(), vec!["cpu"]);
        assert_eq!(store.get_value("node02", "cpu").unwrap(), &json!("y"));
    }

    #[test]
    fn test_import_rejects_non_object_without_partial_apply() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), json!({"node01": {"cpu": "x"}}));

        let merged = json!({"node02": {"cpu": "y"}, "node03": "oops"});
        let err = store.import(merged.as_object().unwrap()).unwrap_err();

        assert!(err.to_string().contains("node03"));
        assert_eq!(store.list_hosts(), vec!["node01"]);
    }
}
