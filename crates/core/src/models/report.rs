use serde::{Deserialize, Serialize};

/// Income/expense totals for one calendar month in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    /// Month key, `YYYY-MM`
    pub month: String,

    /// Currency all amounts are expressed in
    pub currency: String,

    /// Sum of income amounts
    pub income: f64,

    /// Sum of expense amounts
    pub expenses: f64,

    /// income - expenses
    pub net_income: f64,

    /// Number of transactions that fell into this month
    pub transaction_count: usize,
}

impl MonthlyReport {
    /// Share of income kept, in percent. Zero when there was no income.
    pub fn savings_rate(&self) -> f64 {
        if self.income > 0.0 {
            self.net_income / self.income * 100.0
        } else {
            0.0
        }
    }
}

/// Month-over-month comparison of the two most recent months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthComparison {
    pub current: MonthlyReport,
    pub previous: MonthlyReport,
    pub income_change_pct: f64,
    pub expense_change_pct: f64,
    pub net_income_change_pct: f64,
}
