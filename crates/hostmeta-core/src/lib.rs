//! hostmeta-core: inventory document model, store and merge engine
//!
//! Holds the hostname → metadata record store backed by a single JSON file,
//! and the merge engine that folds directories of per-host snapshots into one
//! document.

pub mod error;
pub mod file;
pub mod merge;
pub mod record;
pub mod store;

pub use error::InventoryError;
pub use merge::{BatchState, MergeBatch};
pub use record::{HostSnapshot, MetadataRecord};
pub use store::{InventoryStore, KeyLookup};
