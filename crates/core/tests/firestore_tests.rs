// ═══════════════════════════════════════════════════════════════════
// Firestore Tests: REST store against a local HTTP stub
// ═══════════════════════════════════════════════════════════════════

use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{json, Value as Json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use futures::StreamExt;

use finance_tracker_core::errors::CoreError;
use finance_tracker_core::models::session::Session;
use finance_tracker_core::models::transaction::{
    Category, NewTransaction, TransactionFilter, TransactionKind, TransactionPatch,
};
use finance_tracker_core::services::transaction_service::TransactionService;
use finance_tracker_core::store::document::{Document, Fields, Value};
use finance_tracker_core::store::firestore::FirestoreStore;
use finance_tracker_core::store::path::{CollectionPath, UserPartition};
use finance_tracker_core::store::query::Query;
use finance_tracker_core::store::traits::{DocumentStore, SnapshotStream};

// ═══════════════════════════════════════════════════════════════════
// HTTP stub
// ═══════════════════════════════════════════════════════════════════

/// One request as seen on the wire.
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    /// Request target exactly as sent: encoded path plus query string.
    target: String,
    head: String,
    body: String,
}

impl Recorded {
    fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }

    fn query(&self) -> &str {
        self.target.split_once('?').map_or("", |(_, q)| q)
    }
}

type Responder = dyn Fn(&Recorded) -> (u16, String) + Send + Sync;

struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let respond: Arc<Responder> = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let respond = Arc::clone(&respond);
                tokio::spawn(serve(socket, log, respond));
            }
        });

        Self {
            base_url: format!("http://{addr}/v1"),
            requests,
        }
    }

    fn store(&self) -> FirestoreStore {
        let client = Client::builder().no_proxy().build().unwrap();
        FirestoreStore::new("demo")
            .with_client(client)
            .with_base_url(self.base_url.clone())
            .with_poll_interval(Duration::from_millis(10))
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    fn last(&self) -> Recorded {
        self.requests().pop().unwrap()
    }
}

async fn serve(mut socket: TcpStream, log: Arc<Mutex<Vec<Recorded>>>, respond: Arc<Responder>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);

    let mut request_line = head.lines().next().unwrap_or("").split_whitespace();
    let recorded = Recorded {
        method: request_line.next().unwrap_or("").to_string(),
        target: request_line.next().unwrap_or("").to_string(),
        body: String::from_utf8_lossy(&buf[header_end..body_end]).to_string(),
        head,
    };
    let (status, body) = respond(&recorded);
    log.lock().push(recorded);

    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn resource(path: &str, amount: f64) -> Json {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/{path}"),
        "fields": { "amount": { "doubleValue": amount } },
    })
}

fn rows(docs: &[Json]) -> String {
    let rows: Vec<Json> = docs
        .iter()
        .map(|d| json!({ "document": d, "readTime": "2024-06-01T00:00:00Z" }))
        .collect();
    Json::Array(rows).to_string()
}

fn ok(body: impl Into<String>) -> (u16, String) {
    (200, body.into())
}

fn status(code: u16) -> (u16, String) {
    (code, json!({ "error": { "code": code } }).to_string())
}

async fn next_snapshot(stream: &mut SnapshotStream) -> Option<Result<Vec<Document>, CoreError>> {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
}

fn bob() -> Session {
    Session::new("bob")
}

fn bob_transactions() -> CollectionPath {
    UserPartition::new("bob").unwrap().transactions()
}

const ROOT: &str = "/v1/projects/demo/databases/(default)/documents";

// ═══════════════════════════════════════════════════════════════════
// Document operations
// ═══════════════════════════════════════════════════════════════════

mod documents {
    use super::*;

    #[tokio::test]
    async fn get_decodes_resource() {
        let server =
            StubServer::start(|_| ok(resource("users/bob/transactions/t1", 12.5).to_string())).await;
        let path = bob_transactions().doc("t1").unwrap();

        let doc = server.store().get(&bob(), &path).await.unwrap().unwrap();
        assert_eq!(doc.id, "t1");
        assert_eq!(doc.get("amount"), Some(&Value::Double(12.5)));

        let req = server.last();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), format!("{ROOT}/users/bob/transactions/t1"));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let server = StubServer::start(|_| status(404)).await;
        let path = bob_transactions().doc("gone").unwrap();
        assert!(server.store().get(&bob(), &path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_sends_encoded_fields() {
        let server = StubServer::start(|r| ok(r.body.clone())).await;
        let path = bob_transactions().doc("t1").unwrap();
        let mut fields = Fields::new();
        fields.insert("amount".into(), Value::Double(3.0));

        server
            .store()
            .set(&bob(), &path, Document::new("t1", fields))
            .await
            .unwrap();

        let req = server.last();
        assert_eq!(req.method, "PATCH");
        let body: Json = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["fields"]["amount"]["doubleValue"], 3.0);
        assert_eq!(body["fields"]["id"]["stringValue"], "t1");
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let server = StubServer::start(|_| status(404)).await;
        let path = bob_transactions().doc("t1").unwrap();
        let mut fields = Fields::new();
        fields.insert("description".into(), Value::from("x"));

        let err = server.store().update(&bob(), &path, fields).await.unwrap_err();
        match err {
            CoreError::NotFound { collection, id } => {
                assert_eq!(collection, "users/bob/transactions");
                assert_eq!(id, "t1");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }

        let req = server.last();
        assert_eq!(req.method, "PATCH");
        assert!(req.query().contains("currentDocument.exists=true"));
        assert!(req.query().contains("updateMask.fieldPaths=description"));
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let server = StubServer::start(|_| status(404)).await;
        let path = bob_transactions().doc("t1").unwrap();
        server.store().delete(&bob(), &path).await.unwrap();
        assert_eq!(server.last().method, "DELETE");
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = StubServer::start(|_| status(503)).await;
        let path = bob_transactions().doc("t1").unwrap();
        let err = server.store().delete(&bob(), &path).await.unwrap_err();
        assert!(matches!(err, CoreError::TransientStoreFailure(_)));
    }

    #[tokio::test]
    async fn rejected_credentials_are_not_authenticated() {
        let server = StubServer::start(|_| status(403)).await;
        let path = bob_transactions().doc("t1").unwrap();
        let err = server.store().get(&bob(), &path).await.unwrap_err();
        assert!(err.is_not_authenticated());
    }

    #[tokio::test]
    async fn token_and_api_key_are_sent() {
        let server = StubServer::start(|_| status(404)).await;
        let store = server.store().with_api_key("AIza-test");
        let path = bob_transactions().doc("t1").unwrap();
        store
            .get(&Session::with_token("bob", "tok-1"), &path)
            .await
            .unwrap();

        let req = server.last();
        assert!(req.head.to_ascii_lowercase().contains("authorization: bearer tok-1"));
        assert!(req.query().contains("key=AIza-test"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Queries and watches
// ═══════════════════════════════════════════════════════════════════

mod queries {
    use super::*;

    #[tokio::test]
    async fn rows_without_document_are_skipped() {
        let body = json!([
            { "readTime": "2024-06-01T00:00:00Z" },
            { "document": resource("users/bob/transactions/t1", 1.0), "readTime": "2024-06-01T00:00:00Z" },
        ])
        .to_string();
        let server = StubServer::start(move |_| ok(body.clone())).await;

        let docs = server
            .store()
            .query(&bob(), &Query::new(bob_transactions()))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "t1");

        let req = server.last();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path(), format!("{ROOT}/users/bob:runQuery"));
        let body: Json = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["structuredQuery"]["from"][0]["collectionId"], "transactions");
    }

    #[tokio::test]
    async fn watch_polls_and_skips_unchanged_snapshots() {
        let a = resource("users/bob/transactions/a", 1.0);
        let b = resource("users/bob/transactions/b", 2.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let server = StubServer::start(move |_| match counter.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => ok(rows(&[a.clone()])),
            2 => ok(rows(&[a.clone(), b.clone()])),
            3 => status(500),
            _ => ok(rows(&[a.clone(), b.clone()])),
        })
        .await;

        let mut stream = server.store().watch(&bob(), Query::new(bob_transactions()));
        let first = next_snapshot(&mut stream).await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        // The repeated single-document poll is not delivered.
        let second = next_snapshot(&mut stream).await.unwrap().unwrap();
        assert_eq!(second.len(), 2);

        let third = next_snapshot(&mut stream).await.unwrap();
        assert!(matches!(third, Err(CoreError::TransientStoreFailure(_))));

        assert!(calls.load(Ordering::SeqCst) >= 4);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Partition addressing through the gateway
// ═══════════════════════════════════════════════════════════════════

mod addressing {
    use super::*;

    #[tokio::test]
    async fn update_targets_exact_document() {
        let server = StubServer::start(|_| ok("{}")).await;
        let service = TransactionService::new(Arc::new(server.store()));

        service
            .update(&bob(), "t1#x", TransactionPatch::new().description(Some("x".into())))
            .await
            .unwrap();

        let req = server.last();
        assert_eq!(req.path(), format!("{ROOT}/users/bob/transactions/t1%23x"));
        assert!(req.query().contains("currentDocument.exists=true"));
    }

    #[tokio::test]
    async fn get_and_delete_keep_query_characters_in_the_id() {
        let server = StubServer::start(|_| status(404)).await;
        let service = TransactionService::new(Arc::new(server.store()));

        assert!(service.get(&bob(), "t?1").await.unwrap().is_none());
        service.delete(&bob(), "t?1").await.unwrap();

        for req in server.requests() {
            assert_eq!(req.path(), format!("{ROOT}/users/bob/transactions/t%3F1"));
            assert!(req.query().is_empty());
        }
    }

    #[tokio::test]
    async fn list_stays_inside_own_partition() {
        let server = StubServer::start(|_| ok("[]")).await;
        let service = TransactionService::new(Arc::new(server.store()));

        let all = service
            .get_all(&Session::new("alice#"), TransactionFilter::default())
            .await
            .unwrap();
        assert!(all.is_empty());
        assert_eq!(server.last().path(), format!("{ROOT}/users/alice%23:runQuery"));
    }

    #[tokio::test]
    async fn add_writes_under_own_partition() {
        let server = StubServer::start(|r| ok(r.body.clone())).await;
        let service = TransactionService::new(Arc::new(server.store()));

        let tx = service
            .add(
                &Session::new("alice?"),
                NewTransaction::new(TransactionKind::Expense, 9.0, Category::Market),
            )
            .await
            .unwrap();

        let req = server.last();
        assert_eq!(req.method, "PATCH");
        assert_eq!(
            req.path(),
            format!("{ROOT}/users/alice%3F/transactions/{}", tx.id)
        );
    }
}
