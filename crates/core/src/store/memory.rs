use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::errors::CoreError;
use crate::models::session::Session;

use super::document::{Document, Fields};
use super::path::{CollectionPath, DocumentPath};
use super::query::Query;
use super::traits::{DocumentStore, MonotonicClock, SnapshotStream};

/// Capacity of the change-notification channel. Watchers that fall further
/// behind than this simply re-query once.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

type Collections = BTreeMap<CollectionPath, BTreeMap<String, Document>>;

struct Inner {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<CollectionPath>,
    clock: MonotonicClock,
}

impl Inner {
    fn run_query(&self, query: &Query) -> Vec<Document> {
        let collections = self.collections.read();
        match collections.get(&query.collection) {
            Some(docs) => query.apply(docs.values()),
            None => Vec::new(),
        }
    }

    fn notify(&self, collection: &CollectionPath) {
        // No receivers is fine: nobody is watching.
        let _ = self.changes.send(collection.clone());
    }
}

/// In-process document store with push-based live watches.
///
/// Cloning is cheap and yields a handle to the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.inner.collections.read().len())
            .field("documents", &self.document_count())
            .field("watchers", &self.inner.changes.receiver_count())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(BTreeMap::new()),
                changes,
                clock: MonotonicClock::new(),
            }),
        }
    }

    /// Total number of stored documents across all collections.
    pub fn document_count(&self) -> usize {
        self.inner.collections.read().values().map(BTreeMap::len).sum()
    }

    /// Number of live watches currently attached.
    pub fn watcher_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    /// Copy of every stored document, grouped by collection.
    pub fn export(&self) -> BTreeMap<CollectionPath, Vec<Document>> {
        self.inner
            .collections
            .read()
            .iter()
            .map(|(path, docs)| (path.clone(), docs.values().cloned().collect()))
            .collect()
    }

    /// Build a store pre-populated with the given documents.
    pub fn import(data: BTreeMap<CollectionPath, Vec<Document>>) -> Self {
        let store = Self::new();
        {
            let mut collections = store.inner.collections.write();
            for (path, docs) in data {
                let entry = collections.entry(path).or_default();
                for doc in docs {
                    entry.insert(doc.id.clone(), doc);
                }
            }
        }
        store
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct WatchState {
    inner: Arc<Inner>,
    rx: broadcast::Receiver<CollectionPath>,
    query: Query,
    delivered_initial: bool,
}

impl WatchState {
    /// Wait until the watched collection changes. `false` once the store is gone.
    async fn wait_for_change(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(collection) if collection == self.query.collection => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => break,
                Err(RecvError::Closed) => return false,
            }
        }
        // Coalesce a burst of writes into one snapshot.
        loop {
            match self.rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        true
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn new_document_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    fn server_time(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    async fn get(
        &self,
        _session: &Session,
        path: &DocumentPath,
    ) -> Result<Option<Document>, CoreError> {
        let collections = self.inner.collections.read();
        Ok(collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()))
            .cloned())
    }

    async fn set(
        &self,
        _session: &Session,
        path: &DocumentPath,
        doc: Document,
    ) -> Result<(), CoreError> {
        if doc.id != path.id() {
            return Err(CoreError::InvalidPath(format!(
                "document id '{}' does not match path {path}",
                doc.id
            )));
        }
        self.inner
            .collections
            .write()
            .entry(path.collection().clone())
            .or_default()
            .insert(doc.id.clone(), doc);
        self.inner.notify(path.collection());
        Ok(())
    }

    async fn update(
        &self,
        _session: &Session,
        path: &DocumentPath,
        fields: Fields,
    ) -> Result<(), CoreError> {
        {
            let mut collections = self.inner.collections.write();
            let doc = collections
                .get_mut(path.collection())
                .and_then(|docs| docs.get_mut(path.id()))
                .ok_or_else(|| CoreError::not_found(path.collection().as_str(), path.id()))?;
            doc.merge(fields);
        }
        self.inner.notify(path.collection());
        Ok(())
    }

    async fn delete(&self, _session: &Session, path: &DocumentPath) -> Result<(), CoreError> {
        let removed = {
            let mut collections = self.inner.collections.write();
            match collections.get_mut(path.collection()) {
                Some(docs) => {
                    let removed = docs.remove(path.id()).is_some();
                    if docs.is_empty() {
                        collections.remove(path.collection());
                    }
                    removed
                }
                None => false,
            }
        };
        if removed {
            self.inner.notify(path.collection());
        }
        Ok(())
    }

    async fn query(&self, _session: &Session, query: &Query) -> Result<Vec<Document>, CoreError> {
        Ok(self.inner.run_query(query))
    }

    fn watch(&self, _session: &Session, query: Query) -> SnapshotStream {
        // Subscribe before the first snapshot so no change can slip between them.
        let state = WatchState {
            inner: Arc::clone(&self.inner),
            rx: self.inner.changes.subscribe(),
            query,
            delivered_initial: false,
        };
        futures::stream::unfold(state, |mut state| async move {
            if state.delivered_initial {
                if !state.wait_for_change().await {
                    return None;
                }
            } else {
                state.delivered_initial = true;
            }
            let snapshot = state.inner.run_query(&state.query);
            Some((Ok(snapshot), state))
        })
        .boxed()
    }
}
