use crate::errors::CoreError;
use crate::models::session::Session;
use crate::models::transaction::{Category, NewTransaction, Transaction, TransactionKind, DEFAULT_CURRENCY};
use crate::services::transaction_service::TransactionService;

use super::messages::{Locale, Messages};

/// Headless state of the "add transaction" form.
///
/// Holds the uncommitted input as typed by the user. A successful submit
/// resets every field; a failed one keeps them and exposes one generic,
/// localized message.
#[derive(Debug, Clone)]
pub struct TransactionForm {
    pub kind: TransactionKind,
    pub amount: String,
    pub category: String,
    pub description: String,
    pub currency: String,
    default_currency: String,
    submitting: bool,
    error: Option<&'static str>,
    messages: &'static Messages,
}

impl TransactionForm {
    pub fn new(locale: Locale) -> Self {
        Self::with_default_currency(locale, DEFAULT_CURRENCY)
    }

    pub fn with_default_currency(locale: Locale, currency: impl Into<String>) -> Self {
        let default_currency = currency.into();
        Self {
            kind: TransactionKind::Expense,
            amount: String::new(),
            category: String::new(),
            description: String::new(),
            currency: default_currency.clone(),
            default_currency,
            submitting: false,
            error: None,
            messages: Messages::for_locale(locale),
        }
    }

    /// Set a field by its form name (`type`, `amount`, `category`,
    /// `description`, `currency`).
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        match name {
            "type" => self.kind = value.parse()?,
            "amount" => self.amount = value.to_string(),
            "category" => self.category = value.to_string(),
            "description" => self.description = value.to_string(),
            "currency" => self.currency = value.to_string(),
            other => {
                return Err(CoreError::ValidationError(format!("unknown form field '{other}'")))
            }
        }
        Ok(())
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Message to display, if the last submit failed.
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// Validate the input and mark the form as in flight.
    ///
    /// Refuses while a previous submission has not finished, so one form
    /// can never issue two concurrent adds.
    pub fn begin_submit(&mut self) -> Result<NewTransaction, CoreError> {
        if self.submitting {
            return Err(CoreError::ValidationError("submission already in progress".into()));
        }
        self.error = None;

        let amount = match parse_amount(&self.amount) {
            Some(amount) => amount,
            None => {
                self.error = Some(self.messages.invalid_amount);
                return Err(CoreError::ValidationError(format!(
                    "invalid amount '{}'",
                    self.amount
                )));
            }
        };
        if self.category.trim().is_empty() {
            self.error = Some(self.messages.category_required);
            return Err(CoreError::ValidationError("category is required".into()));
        }

        let mut tx = NewTransaction::new(self.kind, amount, Category::from_label(&self.category));
        if !self.description.trim().is_empty() {
            tx = tx.description(self.description.trim());
        }
        if !self.currency.trim().is_empty() {
            tx = tx.currency(self.currency.trim());
        }

        self.submitting = true;
        Ok(tx)
    }

    /// Record the outcome of an in-flight submission.
    pub fn finish_submit(&mut self, result: &Result<Transaction, CoreError>) {
        self.submitting = false;
        match result {
            Ok(_) => self.reset(),
            Err(e) => {
                tracing::error!(error = %e, "Adding transaction failed");
                self.error = Some(self.messages.add_failed);
            }
        }
    }

    /// Validate, add through the gateway, then reset or keep the input.
    pub async fn submit(
        &mut self,
        service: &TransactionService,
        session: &Session,
    ) -> Result<Transaction, CoreError> {
        let tx = self.begin_submit()?;
        let guard = InFlight { form: self };
        let result = service.add(session, tx).await;
        guard.form.finish_submit(&result);
        result
    }

    /// Back to defaults.
    pub fn reset(&mut self) {
        self.kind = TransactionKind::Expense;
        self.amount.clear();
        self.category.clear();
        self.description.clear();
        self.currency = self.default_currency.clone();
        self.error = None;
    }
}

/// Clears the in-flight flag even when a submit future is dropped before
/// the add completes.
struct InFlight<'a> {
    form: &'a mut TransactionForm,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.form.submitting = false;
    }
}

/// Parse a user-typed decimal amount. Accepts a comma as the decimal
/// separator when no dot is present ("150,50").
pub fn parse_amount(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replace(',', ".")
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
