use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::session::Session;

use super::document::{Document, Fields};
use super::firestore_codec::{decode_document, encode_fields, encode_value};
use super::path::{CollectionPath, DocumentPath};
use super::query::{Direction, FilterOp, Query};
use super::traits::{DocumentStore, MonotonicClock, SnapshotStream};

const BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Default interval between polls of a live watch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Managed cloud document database, reached over its REST API.
///
/// - **Auth**: the session's ID token is sent as a bearer token; an optional
///   project API key travels as the `key` query parameter.
/// - **Timestamps**: stamped from a local monotonic clock.
/// - **Watches**: the REST surface has no push channel, so a watch re-runs
///   its query every `poll_interval` and yields only changed snapshots.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    project_id: String,
    api_key: Option<String>,
    poll_interval: Duration,
    clock: Arc<MonotonicClock>,
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: BASE_URL.to_string(),
            project_id: project_id.into(),
            api_key: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Replace the HTTP client, e.g. to change timeouts or proxy handling.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Point at a different endpoint, e.g. a local emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Root of the document tree: `.../projects/{p}/databases/(default)/documents`.
    pub fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.project_id
        )
    }

    pub fn document_url(&self, path: &DocumentPath) -> Result<Url, CoreError> {
        self.endpoint(path.segments(), None)
    }

    /// `runQuery` endpoint for a collection: issued against its parent document.
    pub fn run_query_url(&self, collection: &CollectionPath) -> Result<Url, CoreError> {
        let segments: Vec<&str> = collection.segments().collect();
        let parent = segments.split_last().map_or(&[][..], |(_, parent)| parent);
        self.endpoint(parent.iter().copied(), Some("runQuery"))
    }

    /// URL under the documents root. Each path segment is percent-encoded
    /// on its own, so ids can never reshape the request path or query.
    fn endpoint<'p>(
        &self,
        path: impl Iterator<Item = &'p str>,
        verb: Option<&str>,
    ) -> Result<Url, CoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CoreError::Config(format!("invalid store URL '{}': {e}", self.base_url)))?;

        let root = ["projects", self.project_id.as_str(), "databases", "(default)", "documents"];
        let mut segments: Vec<String> = root
            .into_iter()
            .map(str::to_string)
            .chain(path.map(str::to_string))
            .collect();
        if let (Some(verb), Some(last)) = (verb, segments.last_mut()) {
            last.push(':');
            last.push_str(verb);
        }

        url.path_segments_mut()
            .map_err(|_| CoreError::Config(format!("store URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        let req = match &session.id_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        match &self.api_key {
            Some(key) => req.query(&[("key", key)]),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder, context: &str) -> Result<Response, CoreError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, context, &body))
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub fn status_error(status: StatusCode, context: &str, body: &str) -> CoreError {
    match status {
        StatusCode::NOT_FOUND => match context.rsplit_once('/') {
            Some((collection, id)) => CoreError::not_found(collection, id),
            None => CoreError::not_found(context, ""),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoreError::NotAuthenticated,
        _ => CoreError::TransientStoreFailure(format!(
            "{context}: HTTP {}: {}",
            status.as_u16(),
            body.chars().take(200).collect::<String>()
        )),
    }
}

/// Quote a field path segment when it is not a plain identifier.
fn field_path(field: &str) -> String {
    let plain = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        field.to_string()
    } else {
        format!("`{}`", field.replace('`', "\\`"))
    }
}

/// Build the `structuredQuery` body for a [`Query`].
pub fn structured_query(query: &Query) -> Json {
    let mut sq = json!({
        "from": [{ "collectionId": query.collection.collection_id() }],
    });

    let filters: Vec<Json> = query
        .filters
        .iter()
        .map(|f| {
            let op = match f.op {
                FilterOp::Eq => "EQUAL",
                FilterOp::Gte => "GREATER_THAN_OR_EQUAL",
                FilterOp::Lte => "LESS_THAN_OR_EQUAL",
            };
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(&f.field) },
                    "op": op,
                    "value": encode_value(&f.value),
                }
            })
        })
        .collect();

    match filters.len() {
        0 => {}
        1 => sq["where"] = filters[0].clone(),
        _ => {
            sq["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            })
        }
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        sq["orderBy"] = json!([{ "field": { "fieldPath": field_path(field) }, "direction": direction }]);
    }

    json!({ "structuredQuery": sq })
}

struct PollState {
    store: FirestoreStore,
    session: Session,
    query: Query,
    last: Option<Vec<Document>>,
    first: bool,
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    fn new_document_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    fn server_time(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn get(
        &self,
        session: &Session,
        path: &DocumentPath,
    ) -> Result<Option<Document>, CoreError> {
        let req = self.authorize(self.client.get(self.document_url(path)?), session);
        match self.execute(req, &path.to_string()).await {
            Ok(resp) => {
                let raw: Json = resp.json().await?;
                decode_document(&raw).map(Some)
            }
            Err(CoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set(
        &self,
        session: &Session,
        path: &DocumentPath,
        doc: Document,
    ) -> Result<(), CoreError> {
        let body = json!({ "fields": encode_fields(&doc.fields) });
        let req = self.authorize(self.client.patch(self.document_url(path)?), session).json(&body);
        self.execute(req, &path.to_string()).await?;
        Ok(())
    }

    async fn update(
        &self,
        session: &Session,
        path: &DocumentPath,
        fields: Fields,
    ) -> Result<(), CoreError> {
        let mut params: Vec<(&str, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", field_path(k)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));

        let body = json!({ "fields": encode_fields(&fields) });
        let req = self
            .authorize(self.client.patch(self.document_url(path)?), session)
            .query(&params)
            .json(&body);
        self.execute(req, &path.to_string()).await?;
        Ok(())
    }

    async fn delete(&self, session: &Session, path: &DocumentPath) -> Result<(), CoreError> {
        let req = self.authorize(self.client.delete(self.document_url(path)?), session);
        match self.execute(req, &path.to_string()).await {
            Ok(_) | Err(CoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, session: &Session, query: &Query) -> Result<Vec<Document>, CoreError> {
        let req = self
            .authorize(self.client.post(self.run_query_url(&query.collection)?), session)
            .json(&structured_query(query));
        let resp = self.execute(req, query.collection.as_str()).await?;
        let items: Vec<Json> = resp.json().await?;
        // Result rows without a `document` only carry a read time.
        items
            .iter()
            .filter_map(|item| item.get("document"))
            .map(decode_document)
            .collect()
    }

    fn watch(&self, session: &Session, query: Query) -> SnapshotStream {
        let state = PollState {
            store: self.clone(),
            session: session.clone(),
            query,
            last: None,
            first: true,
        };
        futures::stream::unfold(state, |mut state| async move {
            loop {
                if !state.first {
                    tokio::time::sleep(state.store.poll_interval).await;
                }
                state.first = false;
                match state.store.query(&state.session, &state.query).await {
                    Ok(snapshot) => {
                        if state.last.as_ref() == Some(&snapshot) {
                            continue;
                        }
                        state.last = Some(snapshot.clone());
                        return Some((Ok(snapshot), state));
                    }
                    Err(e) => {
                        tracing::warn!(
                            collection = %state.query.collection,
                            error = %e,
                            "Live watch poll failed"
                        );
                        return Some((Err(e), state));
                    }
                }
            }
        })
        .boxed()
    }
}
