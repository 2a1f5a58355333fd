// ═══════════════════════════════════════════════════════════════════
// Storage Tests: FTDS file format, StorageManager snapshots
// ═══════════════════════════════════════════════════════════════════

use std::sync::Arc;

use finance_tracker_core::errors::CoreError;
use finance_tracker_core::models::investment::{InvestmentKind, NewInvestment};
use finance_tracker_core::models::investment_transaction::NewInvestmentTransaction;
use finance_tracker_core::models::session::Session;
use finance_tracker_core::models::transaction::{
    Category, NewTransaction, TransactionFilter, TransactionKind,
};
use finance_tracker_core::services::investment_service::InvestmentService;
use finance_tracker_core::services::transaction_service::TransactionService;
use finance_tracker_core::storage::format::{self, CURRENT_VERSION, MAGIC, MIN_HEADER_SIZE};
use finance_tracker_core::storage::manager::{StorageManager, StoreSnapshot};
use finance_tracker_core::store::memory::MemoryStore;

async fn populated_store() -> MemoryStore {
    let store = MemoryStore::new();
    let transactions = TransactionService::new(Arc::new(store.clone()));
    let investments = InvestmentService::new(Arc::new(store.clone()));
    let s = Session::new("u1");

    transactions
        .add(&s, NewTransaction::new(TransactionKind::Expense, 150.0, Category::Market).description("Süt"))
        .await
        .unwrap();
    transactions
        .add(&s, NewTransaction::new(TransactionKind::Income, 9000.0, Category::Other))
        .await
        .unwrap();
    let inv = investments
        .add(&s, NewInvestment::new("BTC", "Bitcoin", InvestmentKind::Crypto).current_price(60_000.0))
        .await
        .unwrap();
    investments
        .add_transaction(&s, &inv.id, NewInvestmentTransaction::buy(0.1, 55_000.0).notes("DCA"))
        .await
        .unwrap();
    store
}

// ═══════════════════════════════════════════════════════════════════
// File format
// ═══════════════════════════════════════════════════════════════════

mod file_format {
    use super::*;

    #[test]
    fn header_layout() {
        let bytes = format::write_file(CURRENT_VERSION, b"{}");
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), CURRENT_VERSION);
        assert_eq!(bytes.len(), MIN_HEADER_SIZE + 2);

        let (header, payload) = format::read_file(&bytes).unwrap();
        assert_eq!(header.version, CURRENT_VERSION);
        assert_eq!(header.payload_len, 2);
        assert_eq!(payload, b"{}");
    }

    #[test]
    fn too_small() {
        let err = format::read_file(b"FTDS").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFileFormat(_)));
    }

    #[test]
    fn wrong_magic() {
        let mut bytes = format::write_file(CURRENT_VERSION, b"{}");
        bytes[0] = b'X';
        let err = format::read_file(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn version_zero_and_future_rejected() {
        let zero = format::write_file(0, b"{}");
        assert!(matches!(format::read_file(&zero), Err(CoreError::UnsupportedVersion(0))));
        let future = format::write_file(CURRENT_VERSION + 1, b"{}");
        assert!(matches!(
            format::read_file(&future),
            Err(CoreError::UnsupportedVersion(v)) if v == CURRENT_VERSION + 1
        ));
    }

    #[test]
    fn truncated_payload() {
        let mut bytes = format::write_file(CURRENT_VERSION, b"{\"collections\":{}}");
        bytes.truncate(bytes.len() - 3);
        let err = format::read_file(&bytes).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = format::write_file(CURRENT_VERSION, b"abc");
        bytes.extend_from_slice(b"garbage");
        let (_, payload) = format::read_file(&bytes).unwrap();
        assert_eq!(payload, b"abc");
    }
}

// ═══════════════════════════════════════════════════════════════════
// StorageManager
// ═══════════════════════════════════════════════════════════════════

mod manager {
    use super::*;

    #[tokio::test]
    async fn bytes_roundtrip_preserves_every_document() {
        let store = populated_store().await;
        let bytes = StorageManager::save_to_bytes(&store).unwrap();
        let restored = StorageManager::load_from_bytes(&bytes).unwrap();

        assert_eq!(restored.document_count(), 4);
        assert_eq!(restored.export(), store.export());
    }

    #[tokio::test]
    async fn restored_store_serves_queries() {
        let store = populated_store().await;
        let bytes = StorageManager::save_to_bytes(&store).unwrap();
        let restored = StorageManager::load_from_bytes(&bytes).unwrap();

        let service = TransactionService::new(Arc::new(restored));
        let all = service
            .get_all(&Session::new("u1"), TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|t| t.description.as_deref() == Some("Süt")));
    }

    #[tokio::test]
    async fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.ftds");
        let store = populated_store().await;

        StorageManager::save_to_file(&store, &path).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("tracker.ftds.tmp").exists());

        let restored = StorageManager::load_from_file(&path).unwrap();
        assert_eq!(restored.export(), store.export());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageManager::load_from_file(dir.path().join("absent.ftds")).unwrap_err();
        assert!(matches!(err, CoreError::FileIO(_)));
    }

    #[test]
    fn corrupt_payload_is_deserialization_error() {
        let bytes = format::write_file(CURRENT_VERSION, b"not json");
        let err = StorageManager::load_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn invalid_collection_path_rejected_on_restore() {
        let payload = br#"{"collections":{"users/u1":[]}}"#;
        let bytes = format::write_file(CURRENT_VERSION, payload);
        let err = StorageManager::load_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn empty_store_roundtrip() {
        let bytes = StorageManager::save_to_bytes(&MemoryStore::new()).unwrap();
        let restored = StorageManager::load_from_bytes(&bytes).unwrap();
        assert_eq!(restored.document_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_groups_by_collection_path() {
        let store = populated_store().await;
        let snapshot = StoreSnapshot::capture(&store);
        assert_eq!(snapshot.document_count(), 4);
        assert_eq!(snapshot.collections["users/u1/transactions"].len(), 2);
        assert_eq!(snapshot.collections["users/u1/investments"].len(), 1);
        assert!(snapshot
            .collections
            .keys()
            .any(|k| k.starts_with("users/u1/investments/") && k.ends_with("/transactions")));
    }
}
