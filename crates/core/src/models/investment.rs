use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::store::document::{Document, Fields, Value};

use super::investment_transaction::{InvestmentTransaction, LotKind};
use super::transaction::{F_CREATED_AT, F_TYPE, F_UPDATED_AT};

pub(crate) const F_SYMBOL: &str = "symbol";
pub(crate) const F_NAME: &str = "name";
pub(crate) const F_QUANTITY: &str = "quantity";
pub(crate) const F_AVERAGE_PRICE: &str = "averagePrice";
pub(crate) const F_CURRENT_PRICE: &str = "currentPrice";
pub(crate) const F_TOTAL_VALUE: &str = "totalValue";
pub(crate) const F_PROFIT_LOSS: &str = "profitLoss";
pub(crate) const F_PROFIT_LOSS_PCT: &str = "profitLossPercentage";
/// Lot list kept in the parent document body. Always written empty; lots
/// live in their own sub-collection.
pub(crate) const F_TRANSACTIONS: &str = "transactions";

/// What kind of position this is. Unknown kinds are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvestmentKind {
    Stock,
    Crypto,
    Forex,
    Currency,
    Gold,
    PreciousMetal,
    Fund,
    Other(String),
}

impl InvestmentKind {
    pub fn as_str(&self) -> &str {
        match self {
            InvestmentKind::Stock => "stock",
            InvestmentKind::Crypto => "crypto",
            InvestmentKind::Forex => "forex",
            InvestmentKind::Currency => "currency",
            InvestmentKind::Gold => "gold",
            InvestmentKind::PreciousMetal => "preciousMetal",
            InvestmentKind::Fund => "fund",
            InvestmentKind::Other(s) => s,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "stock" => InvestmentKind::Stock,
            "crypto" => InvestmentKind::Crypto,
            "forex" => InvestmentKind::Forex,
            "currency" => InvestmentKind::Currency,
            "gold" => InvestmentKind::Gold,
            "preciousMetal" | "metal" => InvestmentKind::PreciousMetal,
            "fund" => InvestmentKind::Fund,
            other => InvestmentKind::Other(other.to_string()),
        }
    }
}

impl From<String> for InvestmentKind {
    fn from(s: String) -> Self {
        InvestmentKind::from_label(&s)
    }
}

impl From<InvestmentKind> for String {
    fn from(k: InvestmentKind) -> Self {
        k.as_str().to_string()
    }
}

impl std::fmt::Display for InvestmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked position. Lots are stored separately, keyed by this id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InvestmentKind,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub total_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Investment {
    pub fn from_document(doc: &Document) -> Result<Self, CoreError> {
        Ok(Self {
            id: doc.id.clone(),
            symbol: doc.require_str(F_SYMBOL)?.to_string(),
            name: doc.optional_str(F_NAME).unwrap_or_default(),
            kind: InvestmentKind::from_label(doc.require_str(F_TYPE)?),
            quantity: doc.f64_or_zero(F_QUANTITY),
            average_price: doc.f64_or_zero(F_AVERAGE_PRICE),
            current_price: doc.f64_or_zero(F_CURRENT_PRICE),
            total_value: doc.f64_or_zero(F_TOTAL_VALUE),
            profit_loss: doc.f64_or_zero(F_PROFIT_LOSS),
            profit_loss_percentage: doc.f64_or_zero(F_PROFIT_LOSS_PCT),
            created_at: doc.require_timestamp(F_CREATED_AT)?,
            updated_at: doc.require_timestamp(F_UPDATED_AT)?,
        })
    }
}

/// Input for creating an investment. There is deliberately no lot list:
/// a new investment always starts with none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvestment {
    pub symbol: String,
    pub name: String,
    pub kind: InvestmentKind,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
}

impl NewInvestment {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, kind: InvestmentKind) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            kind,
            quantity: 0.0,
            average_price: 0.0,
            current_price: 0.0,
        }
    }

    pub fn position(mut self, quantity: f64, average_price: f64) -> Self {
        self.quantity = quantity;
        self.average_price = average_price;
        self
    }

    pub fn current_price(mut self, price: f64) -> Self {
        self.current_price = price;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::ValidationError("symbol must not be empty".into()));
        }
        validate_non_negative("quantity", self.quantity)?;
        validate_non_negative("average price", self.average_price)?;
        validate_non_negative("current price", self.current_price)?;
        Ok(())
    }

    pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Result<Fields, CoreError> {
        self.validate()?;
        let total_value = self.quantity * self.current_price;
        let cost = self.quantity * self.average_price;
        let profit_loss = total_value - cost;

        let mut fields = Fields::new();
        fields.insert(F_SYMBOL.into(), self.symbol.trim().to_uppercase().into());
        fields.insert(F_NAME.into(), self.name.into());
        fields.insert(F_TYPE.into(), self.kind.as_str().into());
        fields.insert(F_QUANTITY.into(), self.quantity.into());
        fields.insert(F_AVERAGE_PRICE.into(), self.average_price.into());
        fields.insert(F_CURRENT_PRICE.into(), self.current_price.into());
        fields.insert(F_TOTAL_VALUE.into(), total_value.into());
        fields.insert(F_PROFIT_LOSS.into(), profit_loss.into());
        fields.insert(F_PROFIT_LOSS_PCT.into(), percentage(profit_loss, cost).into());
        fields.insert(F_TRANSACTIONS.into(), Value::Array(Vec::new()));
        fields.insert(F_CREATED_AT.into(), now.into());
        fields.insert(F_UPDATED_AT.into(), now.into());
        Ok(fields)
    }
}

/// Partial update of an investment. Carries no lot list, so this path can
/// never overwrite lot history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPatch {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub kind: Option<InvestmentKind>,
    pub current_price: Option<f64>,
}

impl InvestmentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: InvestmentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn current_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }

    pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Result<Fields, CoreError> {
        let mut fields = Fields::new();
        if let Some(symbol) = self.symbol {
            if symbol.trim().is_empty() {
                return Err(CoreError::ValidationError("symbol must not be empty".into()));
            }
            fields.insert(F_SYMBOL.into(), symbol.trim().to_uppercase().into());
        }
        if let Some(name) = self.name {
            fields.insert(F_NAME.into(), name.into());
        }
        if let Some(kind) = self.kind {
            fields.insert(F_TYPE.into(), kind.as_str().into());
        }
        if let Some(price) = self.current_price {
            validate_non_negative("current price", price)?;
            fields.insert(F_CURRENT_PRICE.into(), price.into());
        }
        fields.insert(F_UPDATED_AT.into(), now.into());
        Ok(fields)
    }
}

/// An investment together with its lots, newest lot first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentWithTransactions {
    pub investment: Investment,
    pub transactions: Vec<InvestmentTransaction>,
}

/// Position figures derived from the lot history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvestmentStats {
    pub quantity: f64,
    pub average_price: f64,
    pub total_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
}

impl InvestmentStats {
    /// Net quantity and cost over all lots, valued at `current_price`.
    /// Sells reduce both quantity and cost by their own totals.
    pub fn from_lots(lots: &[InvestmentTransaction], current_price: f64) -> Self {
        let (quantity, cost) = lots.iter().fold((0.0, 0.0), |(q, c), lot| match lot.kind {
            LotKind::Buy => (q + lot.quantity, c + lot.total_amount),
            LotKind::Sell => (q - lot.quantity, c - lot.total_amount),
        });
        let total_value = quantity * current_price;
        let profit_loss = total_value - cost;
        Self {
            quantity,
            average_price: if quantity > 0.0 { cost / quantity } else { 0.0 },
            total_value,
            profit_loss,
            profit_loss_percentage: percentage(profit_loss, cost),
        }
    }

    pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(F_QUANTITY.into(), self.quantity.into());
        fields.insert(F_AVERAGE_PRICE.into(), self.average_price.into());
        fields.insert(F_TOTAL_VALUE.into(), self.total_value.into());
        fields.insert(F_PROFIT_LOSS.into(), self.profit_loss.into());
        fields.insert(F_PROFIT_LOSS_PCT.into(), self.profit_loss_percentage.into());
        fields.insert(F_UPDATED_AT.into(), now.into());
        fields
    }
}

fn percentage(profit_loss: f64, cost: f64) -> f64 {
    if cost > 0.0 {
        profit_loss / cost * 100.0
    } else {
        0.0
    }
}

pub(crate) fn validate_non_negative(what: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "{what} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}
