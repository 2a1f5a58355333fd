use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;
use crate::store::document::{Document, Fields, Value};

/// Currency used when a transaction does not name one.
pub const DEFAULT_CURRENCY: &str = "TRY";

// Wire field names.
pub(crate) const F_TYPE: &str = "type";
pub(crate) const F_AMOUNT: &str = "amount";
pub(crate) const F_CATEGORY: &str = "category";
pub(crate) const F_DESCRIPTION: &str = "description";
pub(crate) const F_CURRENCY: &str = "currency";
pub(crate) const F_DATE: &str = "date";
pub(crate) const F_CREATED_AT: &str = "createdAt";
pub(crate) const F_UPDATED_AT: &str = "updatedAt";

/// Direction of a money movement. The amount is always a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(CoreError::ValidationError(format!(
                "unknown transaction type '{other}' (expected income or expense)"
            ))),
        }
    }
}

/// Spending/earning category. The fixed labels are the ones offered by the
/// entry form; anything else is kept verbatim as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Market,
    Bills,
    Rent,
    Transport,
    Entertainment,
    Clothing,
    Health,
    Other,
    Custom(String),
}

impl Category {
    /// The fixed label set, in form display order.
    pub const FIXED: [Category; 8] = [
        Category::Market,
        Category::Bills,
        Category::Rent,
        Category::Transport,
        Category::Entertainment,
        Category::Clothing,
        Category::Health,
        Category::Other,
    ];

    /// Stored label.
    pub fn label(&self) -> &str {
        match self {
            Category::Market => "Market",
            Category::Bills => "Fatura",
            Category::Rent => "Kira",
            Category::Transport => "Ulaşım",
            Category::Entertainment => "Eğlence",
            Category::Clothing => "Giyim",
            Category::Health => "Sağlık",
            Category::Other => "Diğer",
            Category::Custom(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::FIXED
            .iter()
            .find(|c| c.label() == label)
            .cloned()
            .unwrap_or_else(|| Category::Custom(label.to_string()))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Category::Custom(_))
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::from_label(&s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.label().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One persisted money movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Store-assigned, immutable.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: Category,
    #[serde(default)]
    pub description: Option<String>,
    pub currency: String,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every update.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Map a stored document back into a record, rejecting malformed ones.
    pub fn from_document(doc: &Document) -> Result<Self, CoreError> {
        Ok(Self {
            id: doc.id.clone(),
            kind: doc.require_str(F_TYPE)?.parse()?,
            amount: doc.require_f64(F_AMOUNT)?,
            category: Category::from_label(doc.require_str(F_CATEGORY)?),
            description: doc.optional_str(F_DESCRIPTION),
            currency: doc
                .optional_str(F_CURRENCY)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            date: doc.require_timestamp(F_DATE)?,
            created_at: doc.require_timestamp(F_CREATED_AT)?,
            updated_at: doc.require_timestamp(F_UPDATED_AT)?,
        })
    }

    /// Signed view of the amount: income positive, expense negative.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// Input for creating a transaction; identifier and timestamps are assigned
/// by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: Category,
    pub description: Option<String>,
    /// `None` uses the configured default currency.
    pub currency: Option<String>,
    /// `None` uses the creation time.
    pub date: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn new(kind: TransactionKind, amount: f64, category: Category) -> Self {
        Self {
            kind,
            amount,
            category,
            description: None,
            currency: None,
            date: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_amount(self.amount)?;
        validate_category(&self.category)?;
        if let Some(currency) = &self.currency {
            normalize_currency(currency)?;
        }
        Ok(())
    }

    /// Document body for a freshly created record.
    pub(crate) fn into_fields(
        self,
        default_currency: &str,
        now: DateTime<Utc>,
    ) -> Result<Fields, CoreError> {
        self.validate()?;
        let currency = normalize_currency(self.currency.as_deref().unwrap_or(default_currency))?;

        let mut fields = Fields::new();
        fields.insert(F_TYPE.into(), self.kind.as_str().into());
        fields.insert(F_AMOUNT.into(), self.amount.into());
        fields.insert(F_CATEGORY.into(), self.category.label().into());
        if let Some(description) = self.description.filter(|d| !d.is_empty()) {
            fields.insert(F_DESCRIPTION.into(), description.into());
        }
        fields.insert(F_CURRENCY.into(), currency.into());
        fields.insert(F_DATE.into(), self.date.unwrap_or(now).into());
        fields.insert(F_CREATED_AT.into(), now.into());
        fields.insert(F_UPDATED_AT.into(), now.into());
        Ok(fields)
    }
}

/// Partial update: `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub kind: Option<TransactionKind>,
    pub amount: Option<f64>,
    pub category: Option<Category>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub currency: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Only the supplied fields, plus a refreshed `updatedAt`.
    pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Result<Fields, CoreError> {
        let mut fields = Fields::new();
        if let Some(kind) = self.kind {
            fields.insert(F_TYPE.into(), kind.as_str().into());
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
            fields.insert(F_AMOUNT.into(), amount.into());
        }
        if let Some(category) = self.category {
            validate_category(&category)?;
            fields.insert(F_CATEGORY.into(), category.label().into());
        }
        if let Some(description) = self.description {
            let value = description.filter(|d| !d.is_empty()).map(Value::String);
            fields.insert(F_DESCRIPTION.into(), value.unwrap_or(Value::Null));
        }
        if let Some(currency) = self.currency {
            fields.insert(F_CURRENCY.into(), normalize_currency(&currency)?.into());
        }
        if let Some(date) = self.date {
            fields.insert(F_DATE.into(), date.into());
        }
        fields.insert(F_UPDATED_AT.into(), now.into());
        Ok(fields)
    }
}

/// Narrowing for `get_all`. All supplied predicates must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub category: Option<Category>,
    /// Inclusive lower bound on `date`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `date`.
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

fn validate_amount(amount: f64) -> Result<(), CoreError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "amount must be a non-negative number, got {amount}"
        )));
    }
    Ok(())
}

fn validate_category(category: &Category) -> Result<(), CoreError> {
    if category.label().trim().is_empty() {
        return Err(CoreError::ValidationError("category must not be empty".into()));
    }
    Ok(())
}

/// Upper-cased three-letter currency code.
pub fn normalize_currency(code: &str) -> Result<String, CoreError> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::ValidationError(format!(
            "currency must be a three-letter code, got '{code}'"
        )));
    }
    Ok(code)
}
