use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::session::Session;
use crate::models::transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionPatch, DEFAULT_CURRENCY, F_CATEGORY,
    F_DATE, F_TYPE,
};
use crate::store::document::Document;
use crate::store::path::DocumentPath;
use crate::store::query::{Direction, FilterOp, Query};
use crate::store::traits::DocumentStore;

use super::subscription::{decode_all, Subscription, SubscriptionHandle};

/// Store gateway for income/expense transactions.
///
/// Every operation resolves the acting user from the passed [`Session`]
/// first and only ever addresses `users/{uid}/transactions`. No retries:
/// store failures propagate to the caller unchanged.
pub struct TransactionService {
    store: Arc<dyn DocumentStore>,
    default_currency: String,
}

impl TransactionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Currency for new transactions that do not name one.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    fn document_path(&self, session: &Session, id: &str) -> Result<DocumentPath, CoreError> {
        session.partition()?.transactions().doc(id)
    }

    /// Persist a new transaction and return it with its generated id.
    /// `createdAt` and `updatedAt` are the same store time.
    pub async fn add(
        &self,
        session: &Session,
        transaction: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        let partition = session.partition()?;
        let id = self.store.new_document_id();
        let path = partition.transactions().doc(&id)?;
        let now = self.store.server_time();

        let fields = transaction.into_fields(&self.default_currency, now)?;
        let doc = Document::new(id, fields);
        let record = Transaction::from_document(&doc)?;

        self.store
            .set(session, &path, doc)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to add transaction"))?;

        tracing::debug!(
            user_id = %partition.user_id(),
            transaction_id = %record.id,
            kind = %record.kind,
            "Transaction added"
        );
        Ok(record)
    }

    /// Merge the supplied fields and refresh `updatedAt`.
    /// Fails with `CoreError::NotFound` if the transaction does not exist.
    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        patch: TransactionPatch,
    ) -> Result<(), CoreError> {
        let path = self.document_path(session, id)?;
        let fields = patch.into_fields(self.store.server_time())?;

        self.store
            .update(session, &path, fields)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to update transaction"))?;

        tracing::debug!(%path, "Transaction updated");
        Ok(())
    }

    /// Remove a transaction. Repeating the call is safe.
    pub async fn delete(&self, session: &Session, id: &str) -> Result<(), CoreError> {
        let path = self.document_path(session, id)?;
        self.store
            .delete(session, &path)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to delete transaction"))?;
        tracing::debug!(%path, "Transaction deleted");
        Ok(())
    }

    /// Fetch a single transaction, `None` if it does not exist.
    pub async fn get(&self, session: &Session, id: &str) -> Result<Option<Transaction>, CoreError> {
        let path = self.document_path(session, id)?;
        match self.store.get(session, &path).await? {
            Some(doc) => Transaction::from_document(&doc).map(Some),
            None => Ok(None),
        }
    }

    /// All transactions of the user, newest `date` first, narrowed by `filter`.
    pub async fn get_all(
        &self,
        session: &Session,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, CoreError> {
        let query = Self::list_query(session, &filter)?;
        let docs = self
            .store
            .query(session, &query)
            .await
            .inspect_err(|e| {
                tracing::warn!(collection = %query.collection, error = %e, "Failed to list transactions")
            })?;
        Ok(decode_all(&docs, query.collection.as_str(), Transaction::from_document))
    }

    /// Live query over all transactions, same ordering as `get_all`.
    pub fn watch(&self, session: &Session) -> Result<Subscription<Transaction>, CoreError> {
        let query = Self::list_query(session, &TransactionFilter::default())?;
        let collection = query.collection.to_string();
        tracing::debug!(%collection, "Opening transaction watch");
        let raw = self.store.watch(session, query);
        Ok(Subscription::decoded(raw, collection, Transaction::from_document))
    }

    /// Callback form of [`TransactionService::watch`]: `callback` receives
    /// the current snapshot right away and again after every change.
    /// Must be called inside a tokio runtime.
    pub fn subscribe_to_updates<F>(
        &self,
        session: &Session,
        callback: F,
    ) -> Result<SubscriptionHandle, CoreError>
    where
        F: FnMut(Vec<Transaction>) + Send + 'static,
    {
        Ok(self.watch(session)?.spawn_callback(callback))
    }

    fn list_query(session: &Session, filter: &TransactionFilter) -> Result<Query, CoreError> {
        let mut query =
            Query::new(session.partition()?.transactions()).order_by(F_DATE, Direction::Descending);
        if let Some(kind) = filter.kind {
            query = query.where_eq(F_TYPE, kind.as_str());
        }
        if let Some(category) = &filter.category {
            query = query.where_eq(F_CATEGORY, category.label());
        }
        if let Some(from) = filter.from {
            query = query.filter(F_DATE, FilterOp::Gte, from);
        }
        if let Some(to) = filter.to {
            query = query.filter(F_DATE, FilterOp::Lte, to);
        }
        Ok(query)
    }
}
