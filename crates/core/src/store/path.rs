use std::fmt;

use crate::errors::CoreError;

const USERS: &str = "users";
const TRANSACTIONS: &str = "transactions";
const INVESTMENTS: &str = "investments";
const SELECTED_CURRENCY: &str = "selectedCurrency";

/// Slash-separated path of a collection, e.g. `users/u1/transactions`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

/// Slash-separated path of a single document, e.g. `users/u1/transactions/t1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

fn validate_segment(segment: &str) -> Result<(), CoreError> {
    if segment.is_empty() {
        return Err(CoreError::InvalidPath("empty path segment".into()));
    }
    if segment.contains('/') {
        return Err(CoreError::InvalidPath(format!(
            "path segment '{segment}' must not contain '/'"
        )));
    }
    if segment == "." || segment == ".." {
        return Err(CoreError::InvalidPath(format!(
            "path segment '{segment}' is reserved"
        )));
    }
    Ok(())
}

impl CollectionPath {
    /// Parse a raw collection path. Collections sit at odd segment counts
    /// (`users`, `users/u1/transactions`, ...).
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let segments: Vec<&str> = raw.split('/').collect();
        for segment in &segments {
            validate_segment(segment)?;
        }
        if segments.len() % 2 == 0 {
            return Err(CoreError::InvalidPath(format!(
                "'{raw}' names a document, not a collection"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment (collection id), e.g. `transactions`.
    pub fn collection_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of the document owning this collection, if nested.
    pub fn parent_document(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Raw path segments, left to right.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn doc(&self, id: &str) -> Result<DocumentPath, CoreError> {
        validate_segment(id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.collection.segments().chain(std::iter::once(self.id.as_str()))
    }

    /// Collection nested under this document.
    pub fn subcollection(&self, name: &str) -> Result<CollectionPath, CoreError> {
        validate_segment(name)?;
        Ok(CollectionPath(format!("{self}/{name}")))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Storage subtree of one user. The only way to build paths, so every
/// address the gateway touches is scoped under `users/{user_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPartition {
    user_id: String,
}

impl UserPartition {
    pub fn new(user_id: &str) -> Result<Self, CoreError> {
        validate_segment(user_id)?;
        Ok(Self {
            user_id: user_id.to_string(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn selected_currencies(&self) -> CollectionPath {
        CollectionPath(format!("{USERS}/{}/{SELECTED_CURRENCY}", self.user_id))
    }

    pub fn transactions(&self) -> CollectionPath {
        CollectionPath(format!("{USERS}/{}/{TRANSACTIONS}", self.user_id))
    }

    pub fn investments(&self) -> CollectionPath {
        CollectionPath(format!("{USERS}/{}/{INVESTMENTS}", self.user_id))
    }

    /// Lots of one investment: `users/{uid}/investments/{iid}/transactions`.
    pub fn investment_transactions(&self, investment_id: &str) -> Result<CollectionPath, CoreError> {
        self.investments()
            .doc(investment_id)?
            .subcollection(TRANSACTIONS)
    }
}
