use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::investment::{
    Investment, InvestmentPatch, InvestmentStats, InvestmentWithTransactions, NewInvestment,
};
use crate::models::investment_transaction::{
    sort_newest_first, InvestmentTransaction, NewInvestmentTransaction,
};
use crate::models::session::Session;
use crate::models::transaction::F_UPDATED_AT;
use crate::store::document::Document;
use crate::store::path::{DocumentPath, UserPartition};
use crate::store::query::{Direction, Query};
use crate::store::traits::DocumentStore;

use super::subscription::decode_all;

/// Store gateway for investments and their buy/sell lots.
///
/// Investments live at `users/{uid}/investments/{id}`; lots live in the
/// sub-collection `users/{uid}/investments/{id}/transactions`, not inside the
/// parent document. Deleting a parent therefore does not touch its lots
/// unless [`InvestmentService::delete_cascade`] is used.
pub struct InvestmentService {
    store: Arc<dyn DocumentStore>,
}

impl InvestmentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn investment_path(partition: &UserPartition, id: &str) -> Result<DocumentPath, CoreError> {
        partition.investments().doc(id)
    }

    // ── Investments ─────────────────────────────────────────────────

    /// Persist a new investment. Its lot list always starts empty.
    pub async fn add(
        &self,
        session: &Session,
        investment: NewInvestment,
    ) -> Result<Investment, CoreError> {
        let partition = session.partition()?;
        let id = self.store.new_document_id();
        let path = Self::investment_path(&partition, &id)?;

        let fields = investment.into_fields(self.store.server_time())?;
        let doc = Document::new(id, fields);
        let record = Investment::from_document(&doc)?;

        self.store
            .set(session, &path, doc)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to add investment"))?;

        tracing::debug!(
            user_id = %partition.user_id(),
            investment_id = %record.id,
            symbol = %record.symbol,
            "Investment added"
        );
        Ok(record)
    }

    /// Merge the supplied fields and refresh `updatedAt`. The patch type has
    /// no lot list, so lot history cannot be replaced through this path.
    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        patch: InvestmentPatch,
    ) -> Result<(), CoreError> {
        let path = Self::investment_path(&session.partition()?, id)?;
        let fields = patch.into_fields(self.store.server_time())?;
        self.store
            .update(session, &path, fields)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to update investment"))?;
        tracing::debug!(%path, "Investment updated");
        Ok(())
    }

    /// Remove the investment record only. Its lots stay addressable under
    /// the old id.
    pub async fn delete(&self, session: &Session, id: &str) -> Result<(), CoreError> {
        let path = Self::investment_path(&session.partition()?, id)?;
        self.store
            .delete(session, &path)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to delete investment"))?;
        tracing::debug!(%path, "Investment deleted (lots kept)");
        Ok(())
    }

    /// Remove every lot, then the investment. Not atomic: a failure part-way
    /// leaves the remaining documents in place and the call can be repeated.
    pub async fn delete_cascade(&self, session: &Session, id: &str) -> Result<usize, CoreError> {
        let partition = session.partition()?;
        let lots_collection = partition.investment_transactions(id)?;
        let lots = self
            .store
            .query(session, &Query::new(lots_collection.clone()))
            .await?;

        let deletions = lots
            .iter()
            .map(|lot| lots_collection.doc(&lot.id))
            .collect::<Result<Vec<_>, _>>()?;
        futures::future::try_join_all(
            deletions.iter().map(|path| self.store.delete(session, path)),
        )
        .await?;

        self.delete(session, id).await?;
        tracing::debug!(investment_id = %id, lots = lots.len(), "Investment deleted with lots");
        Ok(lots.len())
    }

    /// All investments of the user, most recently updated first.
    pub async fn get_all(&self, session: &Session) -> Result<Vec<Investment>, CoreError> {
        let query = Query::new(session.partition()?.investments())
            .order_by(F_UPDATED_AT, Direction::Descending);
        let docs = self.store.query(session, &query).await?;
        Ok(decode_all(&docs, query.collection.as_str(), Investment::from_document))
    }

    pub async fn get(&self, session: &Session, id: &str) -> Result<Option<Investment>, CoreError> {
        let path = Self::investment_path(&session.partition()?, id)?;
        match self.store.get(session, &path).await? {
            Some(doc) => Investment::from_document(&doc).map(Some),
            None => Ok(None),
        }
    }

    // ── Lots ────────────────────────────────────────────────────────

    /// Record a lot under `investment_id`. The parent is not checked for
    /// existence before the write.
    pub async fn add_transaction(
        &self,
        session: &Session,
        investment_id: &str,
        lot: NewInvestmentTransaction,
    ) -> Result<InvestmentTransaction, CoreError> {
        let collection = session.partition()?.investment_transactions(investment_id)?;
        let id = self.store.new_document_id();
        let path = collection.doc(&id)?;

        let fields = lot.into_fields(investment_id, self.store.server_time())?;
        let doc = Document::new(id, fields);
        let record = InvestmentTransaction::from_document(investment_id, &doc)?;

        self.store
            .set(session, &path, doc)
            .await
            .inspect_err(|e| tracing::warn!(%path, error = %e, "Failed to add lot"))?;

        tracing::debug!(%path, kind = %record.kind, "Lot added");
        Ok(record)
    }

    /// Lots of one investment, in no particular order.
    pub async fn get_transactions(
        &self,
        session: &Session,
        investment_id: &str,
    ) -> Result<Vec<InvestmentTransaction>, CoreError> {
        let query = Query::new(session.partition()?.investment_transactions(investment_id)?);
        let docs = self.store.query(session, &query).await?;
        Ok(decode_all(&docs, query.collection.as_str(), |doc| {
            InvestmentTransaction::from_document(investment_id, doc)
        }))
    }

    /// The investment and its lots, newest lot first.
    ///
    /// Parent and lots are fetched concurrently. Fails with `NotFound` when
    /// the parent is missing, whether or not lots exist under its id.
    pub async fn get_with_transactions(
        &self,
        session: &Session,
        investment_id: &str,
    ) -> Result<InvestmentWithTransactions, CoreError> {
        let partition = session.partition()?;
        let path = Self::investment_path(&partition, investment_id)?;
        let lots_query = Query::new(partition.investment_transactions(investment_id)?);

        let (parent, lot_docs) = futures::try_join!(
            self.store.get(session, &path),
            self.store.query(session, &lots_query),
        )?;

        let parent = parent.ok_or_else(|| {
            CoreError::not_found(partition.investments().as_str(), investment_id)
        })?;
        let investment = Investment::from_document(&parent)?;

        let mut transactions = decode_all(&lot_docs, lots_query.collection.as_str(), |doc| {
            InvestmentTransaction::from_document(investment_id, doc)
        });
        sort_newest_first(&mut transactions);

        Ok(InvestmentWithTransactions {
            investment,
            transactions,
        })
    }

    /// Recompute position figures from the lots at the stored current
    /// price, write them back and return the refreshed investment.
    pub async fn refresh_stats(
        &self,
        session: &Session,
        investment_id: &str,
    ) -> Result<Investment, CoreError> {
        let combined = self.get_with_transactions(session, investment_id).await?;
        let stats = InvestmentStats::from_lots(
            &combined.transactions,
            combined.investment.current_price,
        );

        let path = Self::investment_path(&session.partition()?, investment_id)?;
        self.store
            .update(session, &path, stats.into_fields(self.store.server_time()))
            .await?;
        tracing::debug!(%path, quantity = stats.quantity, "Investment stats refreshed");

        self.get(session, investment_id)
            .await?
            .ok_or_else(|| CoreError::not_found(path.collection().as_str(), investment_id))
    }
}
