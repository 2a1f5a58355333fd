use std::path::PathBuf;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::transaction::{normalize_currency, DEFAULT_CURRENCY};
use crate::store::firestore::DEFAULT_POLL_INTERVAL;
use crate::view::messages::Locale;

const ENV_PREFIX: &str = "FINANCE_TRACKER_";

/// Runtime configuration for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Currency applied to new transactions that do not name one (e.g., "TRY").
    pub default_currency: String,

    /// Language of user-facing messages.
    pub locale: Locale,

    /// Project of the managed document store. `None` means in-memory only.
    pub firestore_project: Option<String>,

    /// Optional API key sent with every remote store request.
    pub firestore_api_key: Option<String>,

    /// Endpoint override, e.g. a local emulator.
    pub firestore_base_url: Option<String>,

    /// How often a remote live watch re-runs its query.
    pub watch_poll_interval: Duration,

    /// Where the in-memory store is persisted between runs.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_currency: DEFAULT_CURRENCY.to_string(),
            locale: Locale::Tr,
            firestore_project: None,
            firestore_api_key: None,
            firestore_base_url: None,
            watch_poll_interval: DEFAULT_POLL_INTERVAL,
            snapshot_path: None,
        }
    }
}

impl TrackerConfig {
    /// Read `FINANCE_TRACKER_*` variables (after loading a `.env` file if one
    /// exists). Unset variables keep their defaults.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `FINANCE_TRACKER_DEFAULT_CURRENCY` | three-letter code |
    /// | `FINANCE_TRACKER_LOCALE` | `tr` or `en` |
    /// | `FINANCE_TRACKER_FIRESTORE_PROJECT` | remote project id |
    /// | `FINANCE_TRACKER_FIRESTORE_API_KEY` | remote API key |
    /// | `FINANCE_TRACKER_FIRESTORE_BASE_URL` | endpoint override |
    /// | `FINANCE_TRACKER_WATCH_POLL_MS` | poll interval in milliseconds |
    /// | `FINANCE_TRACKER_SNAPSHOT_PATH` | snapshot file path |
    pub fn from_env() -> Result<Self, CoreError> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (keys include the prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(currency) = get("DEFAULT_CURRENCY") {
            config.default_currency = normalize_currency(&currency)
                .map_err(|e| CoreError::Config(format!("DEFAULT_CURRENCY: {e}")))?;
        }
        if let Some(locale) = get("LOCALE") {
            config.locale = locale
                .parse()
                .map_err(|e| CoreError::Config(format!("LOCALE: {e}")))?;
        }
        config.firestore_project = get("FIRESTORE_PROJECT");
        config.firestore_api_key = get("FIRESTORE_API_KEY");
        config.firestore_base_url = get("FIRESTORE_BASE_URL");
        if let Some(ms) = get("WATCH_POLL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| CoreError::Config(format!("WATCH_POLL_MS: '{ms}' is not a number")))?;
            if ms == 0 {
                return Err(CoreError::Config("WATCH_POLL_MS must be greater than zero".into()));
            }
            config.watch_poll_interval = Duration::from_millis(ms);
        }
        config.snapshot_path = get("SNAPSHOT_PATH").map(PathBuf::from);

        Ok(config)
    }
}
