use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

use crate::errors::CoreError;
use crate::store::document::Document;
use crate::store::traits::SnapshotStream;

/// A live query delivering full, typed snapshots.
///
/// The first item is the snapshot at subscription time; every later item
/// follows a change to the watched collection. Dropping the subscription (or
/// calling [`Subscription::unsubscribe`]) releases the underlying watch.
pub struct Subscription<T> {
    inner: BoxStream<'static, Result<Vec<T>, CoreError>>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Wrap a raw snapshot stream, decoding each document with `decode`.
    /// Documents that fail to decode are logged and left out of the snapshot.
    pub(crate) fn decoded<F>(raw: SnapshotStream, collection: String, decode: F) -> Self
    where
        F: Fn(&Document) -> Result<T, CoreError> + Send + Sync + 'static,
    {
        let inner = raw
            .map(move |item| item.map(|docs| decode_all(&docs, &collection, &decode)))
            .boxed();
        Self { inner }
    }

    /// Wait for the next snapshot. `None` once the source has ended.
    pub async fn next_snapshot(&mut self) -> Option<Result<Vec<T>, CoreError>> {
        self.inner.next().await
    }

    /// Stop watching. Consumes the subscription, so no further snapshot can
    /// be observed through it.
    pub fn unsubscribe(self) {}

    /// Drive this subscription on a background task, invoking `callback`
    /// with every snapshot. Must be called inside a tokio runtime.
    pub fn spawn_callback<F>(self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(Vec<T>) + Send + 'static,
    {
        SubscriptionHandle::spawn(self, callback)
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<Vec<T>, CoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Handle returned by callback-style subscriptions.
///
/// Once [`SubscriptionHandle::unsubscribe`] returns, the callback is never
/// invoked again. If the callback is running at that moment on another
/// thread, `unsubscribe` waits for it to finish; called from inside the
/// callback itself it returns at once. Dropping the handle unsubscribes too.
pub struct SubscriptionHandle {
    // Re-entrant so the callback may unsubscribe while holding the gate.
    active: Arc<ReentrantMutex<Cell<bool>>>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    fn spawn<T, F>(mut subscription: Subscription<T>, mut callback: F) -> Self
    where
        T: Send + 'static,
        F: FnMut(Vec<T>) + Send + 'static,
    {
        let active = Arc::new(ReentrantMutex::new(Cell::new(true)));
        let gate = Arc::clone(&active);

        let task = tokio::spawn(async move {
            while let Some(item) = subscription.next_snapshot().await {
                match item {
                    Ok(snapshot) => {
                        // Callback runs under the gate so unsubscribe can't race it.
                        let open = gate.lock();
                        if !open.get() {
                            break;
                        }
                        callback(snapshot);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Live subscription delivered an error");
                    }
                }
            }
        });

        Self { active, task }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().get() && !self.task.is_finished()
    }

    pub fn unsubscribe(&self) {
        self.active.lock().set(false);
        self.task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Decode a batch of documents, skipping (and logging) malformed ones.
pub(crate) fn decode_all<T, F>(docs: &[Document], collection: &str, decode: F) -> Vec<T>
where
    F: Fn(&Document) -> Result<T, CoreError>,
{
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    collection,
                    document_id = %doc.id,
                    error = %e,
                    "Skipping malformed document"
                );
                None
            }
        })
        .collect()
}
