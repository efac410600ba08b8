//! JSON document file I/O
//!
//! Reads top-level JSON objects and writes documents atomically: serialize,
//! write a temp file in the target directory, fsync, rename over the target.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Serializer, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::InventoryError;

/// Read `path` and require a JSON object at the top level
///
/// # Errors
/// Returns `Io` if the file cannot be read, `Format` if it is not valid JSON
/// or the top-level value is not an object.
pub fn read_object(path: &Path) -> Result<Map<String, Value>, InventoryError> {
    let raw = fs::read_to_string(path).map_err(|e| InventoryError::io(path, e))?;

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InventoryError::format(
            path,
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
        Err(e) => Err(InventoryError::format(path, e.to_string())),
    }
}

/// Serialize `value` and atomically overwrite `path`
///
/// Output is pretty printed with four-space indentation. Object keys come out
/// sorted because `serde_json::Map` is ordered.
///
/// # Errors
/// Returns `Io` if the parent directory cannot be created or the write fails,
/// `Serialize` if the value cannot be encoded.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), InventoryError> {
    let tmp = stage(value, path)?;
    tmp.persist(path)
        .map_err(|e| InventoryError::io(path, e.error))?;

    debug!(path = %path.display(), "document written");
    Ok(())
}

/// Like [`write_json`], but fails if `path` already exists
///
/// # Errors
/// Returns `AlreadyExists` if something is already at `path`.
pub fn write_new_json<T: Serialize + ?Sized>(
    value: &T,
    path: &Path,
) -> Result<(), InventoryError> {
    if path.exists() {
        return Err(InventoryError::AlreadyExists(path.to_path_buf()));
    }

    let tmp = stage(value, path)?;
    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            InventoryError::AlreadyExists(path.to_path_buf())
        } else {
            InventoryError::io(path, e.error)
        }
    })?;

    debug!(path = %path.display(), "document created");
    Ok(())
}

/// Encode `value` into a synced temp file next to `path`
fn stage<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<NamedTempFile, InventoryError> {
    let parent = parent_dir(path);
    ensure_dir(&parent)?;

    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut ser)
        .map_err(|e| InventoryError::Serialize(e.to_string()))?;
    buf.push(b'\n');

    // Same directory as the target so the rename stays on one filesystem
    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| InventoryError::io(&parent, e))?;
    tmp.write_all(&buf)
        .map_err(|e| InventoryError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| InventoryError::io(tmp.path(), e))?;

    Ok(tmp)
}

/// Create `dir` and its ancestors if missing
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), InventoryError> {
    if dir.is_dir() {
        return Ok(());
    }

    warn!(dir = %dir.display(), "parent directory does not exist");
    fs::create_dir_all(dir).map_err(|e| InventoryError::io(dir, e))?;
    info!(dir = %dir.display(), "created directory");
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
