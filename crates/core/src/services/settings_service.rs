use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::session::Session;
use crate::models::settings::{SelectedCurrency, F_ORDER};
use crate::store::document::{Document, Fields, Value};
use crate::store::query::{Direction, Query};
use crate::store::traits::DocumentStore;

use super::subscription::decode_all;

/// Store gateway for per-user preferences.
///
/// The pinned currency list lives at `users/{uid}/selectedCurrency`, one
/// document per code, keyed by the code itself.
pub struct SettingsService {
    store: Arc<dyn DocumentStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Pinned currencies in display order.
    pub async fn get_selected_currencies(
        &self,
        session: &Session,
    ) -> Result<Vec<SelectedCurrency>, CoreError> {
        let query = Query::new(session.partition()?.selected_currencies())
            .order_by(F_ORDER, Direction::Ascending);
        let docs = self
            .store
            .query(session, &query)
            .await
            .inspect_err(|e| {
                tracing::warn!(collection = %query.collection, error = %e, "Failed to load selected currencies")
            })?;
        Ok(decode_all(&docs, query.collection.as_str(), SelectedCurrency::from_document))
    }

    /// Replace the whole pinned list with `currencies`.
    ///
    /// Entries missing from the new list are deleted, the rest are written
    /// over. Not atomic: on failure part of the old list may remain and the
    /// call can be repeated.
    pub async fn save_selected_currencies(
        &self,
        session: &Session,
        currencies: &[SelectedCurrency],
    ) -> Result<(), CoreError> {
        let collection = session.partition()?.selected_currencies();

        let mut seen = HashSet::new();
        for currency in currencies {
            currency.validate()?;
            if !seen.insert(currency.code.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "currency '{}' listed twice",
                    currency.code
                )));
            }
        }
        let writes = currencies
            .iter()
            .map(|c| collection.doc(&c.code).map(|path| (path, c)))
            .collect::<Result<Vec<_>, CoreError>>()?;

        let existing = self.store.query(session, &Query::new(collection.clone())).await?;
        let stale = existing
            .iter()
            .filter(|doc| !seen.contains(doc.id.as_str()))
            .map(|doc| collection.doc(&doc.id))
            .collect::<Result<Vec<_>, _>>()?;
        futures::future::try_join_all(stale.iter().map(|path| self.store.delete(session, path)))
            .await?;

        futures::future::try_join_all(writes.iter().map(|(path, currency)| {
            self.store
                .set(session, path, Document::new(currency.code.clone(), currency.to_fields()))
        }))
        .await
        .inspect_err(|e| tracing::warn!(%collection, error = %e, "Failed to save selected currencies"))?;

        tracing::debug!(%collection, count = currencies.len(), removed = stale.len(), "Selected currencies saved");
        Ok(())
    }

    /// Pin one currency. Without an explicit `order` it goes after the
    /// current last entry.
    pub async fn add_selected_currency(
        &self,
        session: &Session,
        code: &str,
        order: Option<i64>,
    ) -> Result<SelectedCurrency, CoreError> {
        let collection = session.partition()?.selected_currencies();
        let order = match order {
            Some(order) => order,
            None => {
                let current = self.get_selected_currencies(session).await?;
                current.iter().map(|c| c.order).max().map_or(0, |max| max + 1)
            }
        };

        let currency = SelectedCurrency::new(code, order);
        currency.validate()?;
        let path = collection.doc(&currency.code)?;
        self.store
            .set(session, &path, Document::new(currency.code.clone(), currency.to_fields()))
            .await?;
        tracing::debug!(%path, order, "Currency pinned");
        Ok(currency)
    }

    /// Unpin one currency. Repeating the call is safe.
    pub async fn remove_selected_currency(&self, session: &Session, code: &str) -> Result<(), CoreError> {
        let path = session.partition()?.selected_currencies().doc(code)?;
        self.store.delete(session, &path).await?;
        tracing::debug!(%path, "Currency unpinned");
        Ok(())
    }

    /// Move existing entries to new positions. Fails with `NotFound` for a
    /// code that is not pinned; earlier entries of the batch stay updated.
    pub async fn update_currency_order(
        &self,
        session: &Session,
        orders: &[(String, i64)],
    ) -> Result<(), CoreError> {
        let collection = session.partition()?.selected_currencies();
        for (code, order) in orders {
            let path = collection.doc(code)?;
            let mut fields = Fields::new();
            fields.insert(F_ORDER.into(), Value::Integer(*order));
            self.store.update(session, &path, fields).await?;
        }
        tracing::debug!(%collection, count = orders.len(), "Currency order updated");
        Ok(())
    }
}
