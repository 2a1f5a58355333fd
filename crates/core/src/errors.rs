use thiserror::Error;

/// Unified error type for the entire finance-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Identity / Store ────────────────────────────────────────────
    #[error("Not authenticated: no user identity in session")]
    NotAuthenticated,

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Store failure: {0}")]
    TransientStoreFailure(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    // ── Records ─────────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Snapshot files ──────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Whether this error came from the identity check rather than the store.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, CoreError::NotAuthenticated)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; API keys travel in the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::TransientStoreFailure(sanitized)
    }
}
