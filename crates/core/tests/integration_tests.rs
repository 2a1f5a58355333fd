// ═══════════════════════════════════════════════════════════════════
// Integration Tests: FinanceTracker facade, configuration, logging
// ═══════════════════════════════════════════════════════════════════

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use finance_tracker_core::config::TrackerConfig;
use finance_tracker_core::errors::CoreError;
use finance_tracker_core::logging::{init_logging, LoggingConfig};
use finance_tracker_core::models::investment::{InvestmentKind, NewInvestment};
use finance_tracker_core::models::investment_transaction::NewInvestmentTransaction;
use finance_tracker_core::models::session::Session;
use finance_tracker_core::models::settings::SelectedCurrency;
use finance_tracker_core::models::transaction::{
    Category, NewTransaction, TransactionFilter, TransactionKind,
};
use finance_tracker_core::view::messages::Locale;
use finance_tracker_core::FinanceTracker;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (format!("FINANCE_TRACKER_{k}"), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

// ═══════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════

mod config {
    use super::*;

    #[test]
    fn defaults() {
        let c = TrackerConfig::default();
        assert_eq!(c.default_currency, "TRY");
        assert_eq!(c.locale, Locale::Tr);
        assert_eq!(c.watch_poll_interval, Duration::from_secs(2));
        assert!(c.firestore_project.is_none());
        assert!(c.snapshot_path.is_none());
    }

    #[test]
    fn empty_lookup_gives_defaults() {
        let c = TrackerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(c, TrackerConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let c = TrackerConfig::from_lookup(lookup(&[
            ("DEFAULT_CURRENCY", "usd"),
            ("LOCALE", "en"),
            ("FIRESTORE_PROJECT", "my-project"),
            ("FIRESTORE_API_KEY", "key-123"),
            ("FIRESTORE_BASE_URL", "http://localhost:8080/v1"),
            ("WATCH_POLL_MS", "500"),
            ("SNAPSHOT_PATH", "/tmp/tracker.ftds"),
        ]))
        .unwrap();
        assert_eq!(c.default_currency, "USD");
        assert_eq!(c.locale, Locale::En);
        assert_eq!(c.firestore_project.as_deref(), Some("my-project"));
        assert_eq!(c.firestore_api_key.as_deref(), Some("key-123"));
        assert_eq!(c.firestore_base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(c.watch_poll_interval, Duration::from_millis(500));
        assert_eq!(c.snapshot_path, Some(PathBuf::from("/tmp/tracker.ftds")));
    }

    #[test]
    fn blank_values_are_unset() {
        let c = TrackerConfig::from_lookup(lookup(&[("FIRESTORE_PROJECT", "   ")])).unwrap();
        assert!(c.firestore_project.is_none());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for (key, value) in [
            ("DEFAULT_CURRENCY", "lira"),
            ("LOCALE", "fr"),
            ("WATCH_POLL_MS", "soon"),
            ("WATCH_POLL_MS", "0"),
        ] {
            let err = TrackerConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(matches!(err, CoreError::Config(_)), "{key}={value}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Logging
// ═══════════════════════════════════════════════════════════════════

#[test]
fn init_logging_is_idempotent() {
    let config = LoggingConfig {
        log_level: "warn".into(),
        with_target: false,
    };
    init_logging(config.clone());
    assert!(!init_logging(config));
}

#[test]
fn logging_config_defaults_to_info() {
    assert_eq!(LoggingConfig::default().log_level, "info");
}

// ═══════════════════════════════════════════════════════════════════
// FinanceTracker facade
// ═══════════════════════════════════════════════════════════════════

mod facade {
    use super::*;

    #[tokio::test]
    async fn in_memory_end_to_end() {
        let tracker = FinanceTracker::in_memory();
        assert_eq!(tracker.store_name(), "memory");
        let s = Session::new("alice");

        let tx = tracker
            .transactions()
            .add(&s, NewTransaction::new(TransactionKind::Expense, 150.0, Category::Market))
            .await
            .unwrap();
        assert_eq!(tx.currency, "TRY");

        let inv = tracker
            .investments()
            .add(&s, NewInvestment::new("ASELS", "Aselsan", InvestmentKind::Stock).current_price(60.0))
            .await
            .unwrap();
        tracker
            .investments()
            .add_transaction(&s, &inv.id, NewInvestmentTransaction::buy(100.0, 50.0))
            .await
            .unwrap();
        let refreshed = tracker.investments().refresh_stats(&s, &inv.id).await.unwrap();
        assert_eq!(refreshed.profit_loss, 1000.0);

        tracker.transactions().delete(&s, &tx.id).await.unwrap();
        assert!(tracker
            .transactions()
            .get_all(&s, TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn form_and_list_use_configured_locale_and_currency() {
        let config = TrackerConfig {
            default_currency: "EUR".into(),
            locale: Locale::En,
            ..TrackerConfig::default()
        };
        let tracker = FinanceTracker::from_config(config).unwrap();
        let s = Session::new("alice");

        let mut form = tracker.transaction_form();
        assert_eq!(form.currency, "EUR");
        form.set_field("amount", "20").unwrap();
        form.set_field("category", "Giyim").unwrap();
        let tx = form.submit(tracker.transactions(), &s).await.unwrap();
        assert_eq!(tx.currency, "EUR");

        let mut list = tracker.transaction_list();
        list.mount(tracker.transactions(), &s).await.unwrap();
        assert_eq!(list.transactions().len(), 1);
    }

    #[tokio::test]
    async fn monthly_report_and_comparison() {
        let tracker = FinanceTracker::in_memory();
        let s = Session::new("alice");
        let t = tracker.transactions();
        for (kind, amount, month) in [
            (TransactionKind::Income, 1000.0, 1),
            (TransactionKind::Expense, 400.0, 1),
            (TransactionKind::Income, 1500.0, 2),
            (TransactionKind::Expense, 300.0, 2),
        ] {
            let date = Utc.with_ymd_and_hms(2024, month, 10, 9, 0, 0).unwrap();
            t.add(&s, NewTransaction::new(kind, amount, Category::Other).date(date))
                .await
                .unwrap();
        }

        let reports = tracker.monthly_report(&s).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].month, "2024-02");
        assert_eq!(reports[0].net_income, 1200.0);
        assert_eq!(reports[1].savings_rate(), 60.0);

        let cmp = tracker.month_comparison(&s).await.unwrap().unwrap();
        assert_eq!(cmp.income_change_pct, 50.0);
        assert_eq!(cmp.expense_change_pct, -25.0);
    }

    #[tokio::test]
    async fn reports_require_identity() {
        let tracker = FinanceTracker::in_memory();
        let err = tracker.monthly_report(&Session::new("")).await.unwrap_err();
        assert!(err.is_not_authenticated());
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig {
            snapshot_path: Some(dir.path().join("data.ftds")),
            ..TrackerConfig::default()
        };
        let s = Session::new("alice");

        let first = FinanceTracker::from_config(config.clone()).unwrap();
        first
            .transactions()
            .add(&s, NewTransaction::new(TransactionKind::Income, 42.0, Category::Other))
            .await
            .unwrap();
        assert!(first.save_snapshot().unwrap());

        let second = FinanceTracker::from_config(config).unwrap();
        let all = second
            .transactions()
            .get_all(&s, TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].amount, 42.0);
    }

    #[tokio::test]
    async fn pinned_currencies_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig {
            snapshot_path: Some(dir.path().join("data.ftds")),
            ..TrackerConfig::default()
        };
        let s = Session::new("alice");

        let first = FinanceTracker::from_config(config.clone()).unwrap();
        first
            .settings()
            .save_selected_currencies(
                &s,
                &[SelectedCurrency::new("USD", 0), SelectedCurrency::new("EUR", 1)],
            )
            .await
            .unwrap();
        assert!(first.save_snapshot().unwrap());

        let second = FinanceTracker::from_config(config).unwrap();
        let pinned = second.settings().get_selected_currencies(&s).await.unwrap();
        assert_eq!(pinned, vec![SelectedCurrency::new("USD", 0), SelectedCurrency::new("EUR", 1)]);
    }

    #[test]
    fn save_snapshot_without_path_is_noop() {
        let tracker = FinanceTracker::in_memory();
        assert!(!tracker.save_snapshot().unwrap());
    }

    #[test]
    fn corrupt_snapshot_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ftds");
        std::fs::write(&path, b"definitely not a snapshot").unwrap();
        let config = TrackerConfig {
            snapshot_path: Some(path),
            ..TrackerConfig::default()
        };
        let err = FinanceTracker::from_config(config).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFileFormat(_)));
    }

    #[test]
    fn project_selects_remote_store() {
        let config = TrackerConfig {
            firestore_project: Some("demo".into()),
            firestore_base_url: Some("http://localhost:8080/v1".into()),
            ..TrackerConfig::default()
        };
        let tracker = FinanceTracker::from_config(config).unwrap();
        assert_eq!(tracker.store_name(), "firestore");
        assert!(!tracker.save_snapshot().unwrap());
    }
}
