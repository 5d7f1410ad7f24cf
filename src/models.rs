//! Domain types shared by the engine, the stores and the sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A financial transaction as delivered by the upstream transport.
///
/// Amounts are signed: negative for expenses, positive for income. The same event
/// may be delivered more than once with an identical `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Unique transaction identifier, stable across redeliveries
    pub id: String,
    /// Owner of the account
    pub user_id: String,
    /// Account the money moved through
    pub account_id: String,
    /// Spending category
    pub category_id: String,
    /// Negative for expenses, positive for income
    pub amount: f64,
    /// Free-text description from the bank
    pub description: String,
    /// When the transaction happened
    pub timestamp: DateTime<Utc>,
}

impl TransactionEvent {
    /// Only expenses count against a budget.
    #[must_use]
    pub fn is_expense(&self) -> bool {
        self.amount.is_finite() && self.amount < 0.0
    }

    /// Magnitude of the expense, in the budget's currency.
    #[must_use]
    pub fn spend(&self) -> f64 {
        self.amount.abs()
    }
}

/// A user's spending ceiling for one category over one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Unique budget identifier
    pub id: String,
    /// Owner of the budget
    pub user_id: String,
    /// Category the budget tracks
    pub category_id: String,
    /// Inclusive start of the budget window
    pub period_start: DateTime<Utc>,
    /// Inclusive end of the budget window
    pub period_end: DateTime<Utc>,
    /// Spending ceiling, positive
    pub limit: f64,
    /// Spend accumulated from processed transactions
    pub current_spending: f64,
    /// Threshold fractions in (0, 1], e.g. `[0.5, 0.8, 1.0]`
    pub thresholds: Vec<f64>,
    /// Highest threshold already alerted, 0 when none
    pub last_alerted_threshold: f64,
}

impl Budget {
    /// Whether `at` falls inside `[period_start, period_end]`.
    #[must_use]
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.period_start <= at && at <= self.period_end
    }
}

/// A rendered alert handed to an [`AlertSink`](crate::sink::AlertSink).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAlert {
    /// Recipient of the alert
    pub user_id: String,
    /// Budget that crossed the threshold
    pub budget_id: String,
    /// Human-readable alert text
    pub message: String,
    /// Spend at the time of the alert
    pub current_spending: f64,
    /// Budget spending ceiling
    pub limit: f64,
    /// Crossed threshold fraction
    pub threshold: f64,
}
