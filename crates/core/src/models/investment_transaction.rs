use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;
use crate::store::document::{Document, Fields};

use super::investment::validate_non_negative;
use super::transaction::{F_CREATED_AT, F_DATE, F_TYPE};

pub(crate) const F_QUANTITY: &str = "quantity";
pub(crate) const F_PRICE: &str = "price";
pub(crate) const F_TOTAL_AMOUNT: &str = "totalAmount";
pub(crate) const F_FEE: &str = "fee";
pub(crate) const F_NOTES: &str = "notes";
pub(crate) const F_INVESTMENT_ID: &str = "investmentId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotKind {
    Buy,
    Sell,
}

impl LotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotKind::Buy => "buy",
            LotKind::Sell => "sell",
        }
    }
}

impl std::fmt::Display for LotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LotKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(LotKind::Buy),
            "sell" => Ok(LotKind::Sell),
            other => Err(CoreError::ValidationError(format!(
                "unknown lot type '{other}' (expected buy or sell)"
            ))),
        }
    }
}

/// One buy/sell lot against an investment. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentTransaction {
    pub id: String,
    pub investment_id: String,
    #[serde(rename = "type")]
    pub kind: LotKind,
    pub quantity: f64,
    pub price: f64,
    pub total_amount: f64,
    pub fee: f64,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    /// `None` when the stored value cannot be read as a point in time.
    pub created_at: Option<DateTime<Utc>>,
}

impl InvestmentTransaction {
    /// Map a stored lot. The timestamps are coerced leniently: an unreadable
    /// value becomes `None` instead of failing the whole fetch.
    pub fn from_document(investment_id: &str, doc: &Document) -> Result<Self, CoreError> {
        Ok(Self {
            id: doc.id.clone(),
            investment_id: investment_id.to_string(),
            kind: doc.require_str(F_TYPE)?.parse()?,
            quantity: doc.require_f64(F_QUANTITY)?,
            price: doc.f64_or_zero(F_PRICE),
            total_amount: doc.f64_or_zero(F_TOTAL_AMOUNT),
            fee: doc.f64_or_zero(F_FEE),
            date: doc.optional_timestamp(F_DATE),
            notes: doc.optional_str(F_NOTES),
            created_at: doc.optional_timestamp(F_CREATED_AT),
        })
    }
}

/// Order lots by creation time, most recent first. Lots whose creation time
/// is unknown count as the earliest possible time and sort last.
pub fn sort_newest_first(lots: &mut [InvestmentTransaction]) {
    // `None < Some(_)`, so reversing the natural order puts `None` at the end.
    lots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Input for recording a lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvestmentTransaction {
    pub kind: LotKind,
    pub quantity: f64,
    pub price: f64,
    /// `None` computes `quantity * price`.
    pub total_amount: Option<f64>,
    pub fee: f64,
    /// `None` uses the creation time.
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewInvestmentTransaction {
    pub fn new(kind: LotKind, quantity: f64, price: f64) -> Self {
        Self {
            kind,
            quantity,
            price,
            total_amount: None,
            fee: 0.0,
            date: None,
            notes: None,
        }
    }

    pub fn buy(quantity: f64, price: f64) -> Self {
        Self::new(LotKind::Buy, quantity, price)
    }

    pub fn sell(quantity: f64, price: f64) -> Self {
        Self::new(LotKind::Sell, quantity, price)
    }

    pub fn total_amount(mut self, total: f64) -> Self {
        self.total_amount = Some(total);
        self
    }

    pub fn fee(mut self, fee: f64) -> Self {
        self.fee = fee;
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "lot quantity must be positive, got {}",
                self.quantity
            )));
        }
        validate_non_negative("price", self.price)?;
        validate_non_negative("fee", self.fee)?;
        if let Some(total) = self.total_amount {
            validate_non_negative("total amount", total)?;
        }
        Ok(())
    }

    pub(crate) fn into_fields(
        self,
        investment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Fields, CoreError> {
        self.validate()?;
        let total = self.total_amount.unwrap_or(self.quantity * self.price);

        let mut fields = Fields::new();
        fields.insert(F_INVESTMENT_ID.into(), investment_id.into());
        fields.insert(F_TYPE.into(), self.kind.as_str().into());
        fields.insert(F_QUANTITY.into(), self.quantity.into());
        fields.insert(F_PRICE.into(), self.price.into());
        fields.insert(F_TOTAL_AMOUNT.into(), total.into());
        fields.insert(F_FEE.into(), self.fee.into());
        fields.insert(F_DATE.into(), self.date.unwrap_or(now).into());
        if let Some(notes) = self.notes.filter(|n| !n.is_empty()) {
            fields.insert(F_NOTES.into(), notes.into());
        }
        fields.insert(F_CREATED_AT.into(), now.into());
        Ok(fields)
    }
}
