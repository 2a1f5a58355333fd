pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod storage;
pub mod store;
pub mod view;

use std::sync::Arc;

use config::TrackerConfig;
use errors::CoreError;
use models::report::{MonthComparison, MonthlyReport};
use models::session::Session;
use models::transaction::{Transaction, TransactionFilter};
use services::{
    investment_service::InvestmentService, report_service::ReportService,
    settings_service::SettingsService, transaction_service::TransactionService,
};
use storage::manager::StorageManager;
use store::{firestore::FirestoreStore, memory::MemoryStore, traits::DocumentStore};
use view::{transaction_form::TransactionForm, transaction_list::TransactionList};

/// Main entry point for the Finance Tracker core library.
/// Holds the backing store, configuration and the gateways built on them.
#[must_use]
pub struct FinanceTracker {
    config: TrackerConfig,
    store: Arc<dyn DocumentStore>,
    /// Set when the store is in-process, so it can be persisted.
    memory: Option<MemoryStore>,
    transaction_service: TransactionService,
    investment_service: InvestmentService,
    settings_service: SettingsService,
    report_service: ReportService,
}

impl std::fmt::Debug for FinanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceTracker")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

impl FinanceTracker {
    /// Empty in-process store with default settings.
    pub fn in_memory() -> Self {
        Self::with_memory_store(MemoryStore::new(), TrackerConfig::default())
    }

    pub fn with_memory_store(store: MemoryStore, config: TrackerConfig) -> Self {
        let mut tracker = Self::build(Arc::new(store.clone()), config);
        tracker.memory = Some(store);
        tracker
    }

    /// Use any store implementation.
    pub fn with_store(store: Arc<dyn DocumentStore>, config: TrackerConfig) -> Self {
        Self::build(store, config)
    }

    /// Pick the store from configuration:
    /// - a remote project when `firestore_project` is set
    /// - otherwise an in-memory store, restored from `snapshot_path` if that file exists
    pub fn from_config(config: TrackerConfig) -> Result<Self, CoreError> {
        if let Some(project) = &config.firestore_project {
            let mut store =
                FirestoreStore::new(project.clone()).with_poll_interval(config.watch_poll_interval);
            if let Some(url) = &config.firestore_base_url {
                store = store.with_base_url(url.clone());
            }
            if let Some(key) = &config.firestore_api_key {
                store = store.with_api_key(key.clone());
            }
            tracing::info!(project = %project, "Using remote document store");
            return Ok(Self::with_store(Arc::new(store), config));
        }

        let memory = match &config.snapshot_path {
            Some(path) if path.exists() => {
                let store = StorageManager::load_from_file(path)?;
                tracing::info!(path = %path.display(), documents = store.document_count(), "Restored snapshot");
                store
            }
            _ => MemoryStore::new(),
        };
        Ok(Self::with_memory_store(memory, config))
    }

    /// Read configuration from the environment and build accordingly.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_config(TrackerConfig::from_env()?)
    }

    // ── Gateways ────────────────────────────────────────────────────

    pub fn transactions(&self) -> &TransactionService {
        &self.transaction_service
    }

    pub fn investments(&self) -> &InvestmentService {
        &self.investment_service
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings_service
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    // ── View controllers ────────────────────────────────────────────

    /// Empty entry form using the configured locale and default currency.
    pub fn transaction_form(&self) -> TransactionForm {
        TransactionForm::with_default_currency(self.config.locale, self.config.default_currency.clone())
    }

    /// Unmounted list using the configured locale.
    pub fn transaction_list(&self) -> TransactionList {
        TransactionList::new(self.config.locale)
    }

    // ── Reports ─────────────────────────────────────────────────────

    /// Monthly income/expense totals in the default currency, newest month first.
    pub async fn monthly_report(&self, session: &Session) -> Result<Vec<MonthlyReport>, CoreError> {
        let transactions = self.all_transactions(session).await?;
        Ok(self
            .report_service
            .monthly(&transactions, &self.config.default_currency))
    }

    /// Latest month against the one before it, in the default currency.
    pub async fn month_comparison(
        &self,
        session: &Session,
    ) -> Result<Option<MonthComparison>, CoreError> {
        let transactions = self.all_transactions(session).await?;
        Ok(self
            .report_service
            .compare_latest(&transactions, &self.config.default_currency))
    }

    async fn all_transactions(&self, session: &Session) -> Result<Vec<Transaction>, CoreError> {
        self.transaction_service
            .get_all(session, TransactionFilter::default())
            .await
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Write the in-memory store to `snapshot_path`.
    /// Returns `false` when there is nothing to do (remote store or no path).
    pub fn save_snapshot(&self) -> Result<bool, CoreError> {
        match (&self.memory, &self.config.snapshot_path) {
            (Some(store), Some(path)) => {
                StorageManager::save_to_file(store, path)?;
                tracing::info!(path = %path.display(), "Snapshot saved");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn build(store: Arc<dyn DocumentStore>, config: TrackerConfig) -> Self {
        let transaction_service = TransactionService::new(Arc::clone(&store))
            .with_default_currency(config.default_currency.clone());
        let investment_service = InvestmentService::new(Arc::clone(&store));
        let settings_service = SettingsService::new(Arc::clone(&store));
        Self {
            config,
            store,
            memory: None,
            transaction_service,
            investment_service,
            settings_service,
            report_service: ReportService::new(),
        }
    }
}
