use crate::errors::CoreError;
use crate::models::session::Session;
use crate::models::transaction::{Transaction, TransactionFilter};
use crate::services::subscription::Subscription;
use crate::services::transaction_service::TransactionService;

use super::messages::{Locale, Messages};

/// Blocking yes/no confirmation shown before a destructive action.
pub trait ConfirmPrompt {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// Headless state of the transaction list.
///
/// The displayed collection is only ever replaced wholesale: by the initial
/// fetch on mount and then by each snapshot of the live watch, in delivery
/// order. Deletes are never applied locally; the watch reflects them.
pub struct TransactionList {
    transactions: Vec<Transaction>,
    subscription: Option<Subscription<Transaction>>,
    loading: bool,
    error: Option<&'static str>,
    messages: &'static Messages,
}

impl std::fmt::Debug for TransactionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionList")
            .field("transactions", &self.transactions.len())
            .field("mounted", &self.is_mounted())
            .field("loading", &self.loading)
            .field("error", &self.error)
            .finish()
    }
}

impl TransactionList {
    pub fn new(locale: Locale) -> Self {
        Self {
            transactions: Vec::new(),
            subscription: None,
            loading: false,
            error: None,
            messages: Messages::for_locale(locale),
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// Initial paint from one `get_all`, then open the live watch.
    ///
    /// A failed initial fetch is reported but does not prevent the watch
    /// from being opened; its first snapshot will fill the list.
    pub async fn mount(
        &mut self,
        service: &TransactionService,
        session: &Session,
    ) -> Result<(), CoreError> {
        self.unmount();
        self.loading = true;
        self.error = None;

        match service.get_all(session, TransactionFilter::default()).await {
            Ok(transactions) => self.transactions = transactions,
            Err(e) => {
                tracing::error!(error = %e, "Initial transaction fetch failed");
                self.error = Some(self.messages.load_failed);
            }
        }

        let watched = service.watch(session);
        self.loading = false;
        match watched {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Opening transaction watch failed");
                self.error = Some(self.messages.load_failed);
                Err(e)
            }
        }
    }

    /// Wait for the next snapshot and replace the collection with it.
    ///
    /// Returns `false` when not mounted or the watch has ended. A snapshot
    /// error keeps the last-known collection.
    pub async fn next_update(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.next_snapshot().await {
            Some(Ok(snapshot)) => {
                self.transactions = snapshot;
                self.error = None;
                true
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Live transaction update failed");
                self.error = Some(self.messages.load_failed);
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }

    /// Release the live watch. Safe to call when not mounted.
    pub fn unmount(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::debug!("Transaction list unmounted");
        }
    }

    /// Ask for confirmation, then delete through the gateway.
    ///
    /// Returns `Ok(false)` when the user declined. The row stays on screen
    /// until the watch delivers a snapshot without it.
    pub async fn delete(
        &mut self,
        service: &TransactionService,
        session: &Session,
        id: &str,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<bool, CoreError> {
        if !prompt.confirm(self.messages.confirm_delete) {
            return Ok(false);
        }
        match service.delete(session, id).await {
            Ok(()) => {
                self.error = None;
                Ok(true)
            }
            Err(e) => {
                tracing::error!(transaction_id = %id, error = %e, "Deleting transaction failed");
                self.error = Some(self.messages.delete_failed);
                Err(e)
            }
        }
    }
}

impl Drop for TransactionList {
    fn drop(&mut self) {
        self.unmount();
    }
}
