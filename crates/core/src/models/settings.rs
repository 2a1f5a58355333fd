use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::store::document::{Document, Fields, Value};

pub(crate) const F_CODE: &str = "code";
pub(crate) const F_ORDER: &str = "order";

/// One entry of the user's pinned currency list. Stored under
/// `users/{uid}/selectedCurrency/{code}`, so a code appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedCurrency {
    pub code: String,
    /// Display position, ascending.
    pub order: i64,
}

impl SelectedCurrency {
    pub fn new(code: impl Into<String>, order: i64) -> Self {
        Self {
            code: code.into(),
            order,
        }
    }

    /// Map a stored entry. A missing `code` falls back to the document key,
    /// a missing `order` to zero.
    pub fn from_document(doc: &Document) -> Result<Self, CoreError> {
        let code = doc.optional_str(F_CODE).unwrap_or_else(|| doc.id.clone());
        let order = match doc.get(F_ORDER) {
            Some(Value::Integer(i)) => *i,
            Some(other) => other.as_f64().map_or(0, |v| v as i64),
            None => 0,
        };
        Ok(Self { code, order })
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        if self.code.trim().is_empty() {
            return Err(CoreError::ValidationError("currency code is required".into()));
        }
        if self.code.trim() != self.code {
            return Err(CoreError::ValidationError(format!(
                "currency code '{}' has surrounding whitespace",
                self.code
            )));
        }
        Ok(())
    }

    pub(crate) fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(F_CODE.into(), Value::String(self.code.clone()));
        fields.insert(F_ORDER.into(), Value::Integer(self.order));
        fields
    }
}
