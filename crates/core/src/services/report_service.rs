use chrono::Datelike;
use std::collections::BTreeMap;

use crate::models::report::{MonthComparison, MonthlyReport};
use crate::models::transaction::{Transaction, TransactionKind};

/// Builds monthly income/expense reports from transaction lists.
///
/// Pure computation over already-fetched records: no store access.
/// Only transactions in the requested currency are counted; amounts in
/// other currencies are never mixed in.
pub struct ReportService;

impl ReportService {
    pub fn new() -> Self {
        Self
    }

    /// One report per calendar month (by transaction `date`), newest month first.
    pub fn monthly(&self, transactions: &[Transaction], currency: &str) -> Vec<MonthlyReport> {
        let currency = currency.to_uppercase();
        let mut months: BTreeMap<(i32, u32), MonthlyReport> = BTreeMap::new();

        for tx in transactions.iter().filter(|t| t.currency == currency) {
            let key = (tx.date.year(), tx.date.month());
            let report = months.entry(key).or_insert_with(|| MonthlyReport {
                month: format!("{:04}-{:02}", key.0, key.1),
                currency: currency.clone(),
                income: 0.0,
                expenses: 0.0,
                net_income: 0.0,
                transaction_count: 0,
            });
            match tx.kind {
                TransactionKind::Income => report.income += tx.amount,
                TransactionKind::Expense => report.expenses += tx.amount,
            }
            report.net_income = report.income - report.expenses;
            report.transaction_count += 1;
        }

        months.into_values().rev().collect()
    }

    /// Compare the two most recent months. `None` with fewer than two months.
    pub fn compare_latest(&self, transactions: &[Transaction], currency: &str) -> Option<MonthComparison> {
        let mut reports = self.monthly(transactions, currency).into_iter();
        let current = reports.next()?;
        let previous = reports.next()?;
        Some(MonthComparison {
            income_change_pct: change_percent(previous.income, current.income),
            expense_change_pct: change_percent(previous.expenses, current.expenses),
            net_income_change_pct: change_percent(previous.net_income, current.net_income),
            current,
            previous,
        })
    }
}

impl Default for ReportService {
    fn default() -> Self {
        Self::new()
    }
}

/// Relative change from `previous` to `current` in percent; zero when
/// there is no baseline.
pub fn change_percent(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous.abs() * 100.0
}
