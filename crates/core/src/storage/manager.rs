use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::CoreError;
use crate::store::document::Document;
use crate::store::memory::MemoryStore;
use crate::store::path::CollectionPath;

use super::format;

/// Serialized form of a [`MemoryStore`]: collection path → documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub collections: BTreeMap<String, Vec<Document>>,
}

impl StoreSnapshot {
    pub fn capture(store: &MemoryStore) -> Self {
        Self {
            collections: store
                .export()
                .into_iter()
                .map(|(path, docs)| (path.to_string(), docs))
                .collect(),
        }
    }

    /// Rebuild a store. Every collection path is re-validated.
    pub fn restore(self) -> Result<MemoryStore, CoreError> {
        let mut data = BTreeMap::new();
        for (raw, docs) in self.collections {
            let path = CollectionPath::parse(&raw)
                .map_err(|e| CoreError::Deserialization(format!("snapshot: {e}")))?;
            data.insert(path, docs);
        }
        Ok(MemoryStore::import(data))
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// High-level persistence: save/load an in-memory store to/from bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// Flow: MemoryStore → StoreSnapshot → JSON → FTDS format bytes
    pub fn save_to_bytes(store: &MemoryStore) -> Result<Vec<u8>, CoreError> {
        let snapshot = StoreSnapshot::capture(store);
        let payload = serde_json::to_vec(&snapshot)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshot: {e}")))?;
        tracing::debug!(documents = snapshot.document_count(), "Store snapshot written");
        Ok(format::write_file(format::CURRENT_VERSION, &payload))
    }

    /// Flow: FTDS bytes → parse header → JSON → StoreSnapshot → MemoryStore
    pub fn load_from_bytes(data: &[u8]) -> Result<MemoryStore, CoreError> {
        let (_, payload) = format::read_file(data)?;
        let snapshot: StoreSnapshot = serde_json::from_slice(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize snapshot: {e}")))?;
        tracing::debug!(documents = snapshot.document_count(), "Store snapshot loaded");
        snapshot.restore()
    }

    /// Write via a sibling temp file and rename, so a crash never leaves a
    /// half-written snapshot in place.
    pub fn save_to_file(store: &MemoryStore, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let path = path.as_ref();
        let bytes = Self::save_to_bytes(store)?;
        let tmp = path.with_extension("ftds.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<MemoryStore, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }
}
