use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::BoxStream;
use parking_lot::Mutex;

use crate::errors::CoreError;
use crate::models::session::Session;

use super::document::{Document, Fields};
use super::path::DocumentPath;
use super::query::Query;

/// Lazy, infinite, non-restartable sequence of full query snapshots.
/// The first item is the snapshot at subscription time.
pub type SnapshotStream = BoxStream<'static, Result<Vec<Document>, CoreError>>;

/// Trait abstraction over the backing document database.
///
/// The gateway services only ever talk to this trait, so the in-memory store
/// used in tests and the managed remote store are interchangeable.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable name of this store (for logs/errors).
    fn name(&self) -> &str;

    /// A fresh identifier, unique within any collection of this store.
    fn new_document_id(&self) -> String;

    /// Current store time. Strictly greater than any value previously
    /// returned by the same store.
    fn server_time(&self) -> DateTime<Utc>;

    async fn get(
        &self,
        session: &Session,
        path: &DocumentPath,
    ) -> Result<Option<Document>, CoreError>;

    /// Create or fully replace the document at `path`.
    async fn set(
        &self,
        session: &Session,
        path: &DocumentPath,
        doc: Document,
    ) -> Result<(), CoreError>;

    /// Merge `fields` into an existing document.
    /// Fails with `CoreError::NotFound` when the document does not exist.
    async fn update(
        &self,
        session: &Session,
        path: &DocumentPath,
        fields: Fields,
    ) -> Result<(), CoreError>;

    /// Remove the document. Deleting a missing document is not an error.
    async fn delete(&self, session: &Session, path: &DocumentPath) -> Result<(), CoreError>;

    async fn query(&self, session: &Session, query: &Query) -> Result<Vec<Document>, CoreError>;

    /// Standing query. Dropping the stream releases the watch.
    fn watch(&self, session: &Session, query: Query) -> SnapshotStream;
}

/// Wall clock that never repeats or goes backwards.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}
