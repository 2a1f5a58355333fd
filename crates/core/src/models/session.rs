use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::store::path::UserPartition;

/// The acting user's identity, passed explicitly into every gateway call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Identifier of the signed-in user; every storage path is scoped under it.
    #[serde(rename = "uid")]
    pub user_id: String,

    /// Bearer token for the remote store, when one is in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

// Hand-written so the token never ends up in logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            id_token: None,
        }
    }

    pub fn with_token(user_id: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            id_token: Some(id_token.into()),
        }
    }

    /// Parse a persisted session blob, e.g. `{"uid": "abc", "idToken": "..."}`.
    ///
    /// Anything that does not carry a non-empty `uid` is `NotAuthenticated`,
    /// including malformed JSON.
    pub fn from_blob(blob: &str) -> Result<Self, CoreError> {
        let session: Session =
            serde_json::from_str(blob).map_err(|_| CoreError::NotAuthenticated)?;
        session.partition()?;
        Ok(session)
    }

    /// Resolve the user's storage partition, failing with `NotAuthenticated`
    /// when no usable identity is present.
    pub fn partition(&self) -> Result<UserPartition, CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::NotAuthenticated);
        }
        UserPartition::new(&self.user_id).map_err(|_| CoreError::NotAuthenticated)
    }
}
