//! Observability surface of the engine.
//!
//! The engine never logs through a global directly. Every notable step is handed to an
//! injected [`Reporter`]; [`TracingReporter`] turns those into structured `tracing` events.

use tracing::{debug, error, info, warn};

/// Something worth reporting that happened while processing an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Amount was zero, positive or not a number, nothing to track
    SkippedNonExpense {
        /// Upstream transaction identifier
        transaction_id: String,
        /// Signed amount as delivered
        amount: f64,
    },
    /// No budget covers this user and category at the event timestamp
    NoBudgetsMatched {
        /// Upstream transaction identifier
        transaction_id: String,
        /// Owner of the budget
        user_id: String,
        /// Spending category
        category_id: String,
    },
    /// Store returned a budget whose window does not contain the event
    OutsideBudgetWindow {
        /// Upstream transaction identifier
        transaction_id: String,
        /// Budget concerned
        budget_id: String,
    },
    /// Spend update committed
    SpendApplied {
        /// Upstream transaction identifier
        transaction_id: String,
        /// Budget concerned
        budget_id: String,
        /// Spend before this transaction
        old_spending: f64,
        /// Spend after this transaction
        new_spending: f64,
        /// Budget spending ceiling
        limit: f64,
    },
    /// Spend update was already committed by an earlier delivery
    DuplicateTransaction {
        /// Upstream transaction identifier
        transaction_id: String,
        /// Budget concerned
        budget_id: String,
    },
    /// A threshold was crossed by this event
    ThresholdCrossed {
        /// Budget concerned
        budget_id: String,
        /// Threshold fraction, e.g. 0.8
        threshold: f64,
    },
    /// Sink accepted the alert
    AlertDelivered {
        /// Budget concerned
        budget_id: String,
        /// Owner of the budget
        user_id: String,
        /// Threshold fraction, e.g. 0.8
        threshold: f64,
    },
    /// Sink rejected the alert
    AlertFailed {
        /// Budget concerned
        budget_id: String,
        /// Owner of the budget
        user_id: String,
        /// Threshold fraction, e.g. 0.8
        threshold: f64,
        /// Error description
        reason: String,
    },
    /// Watermark persisted
    WatermarkAdvanced {
        /// Budget concerned
        budget_id: String,
        /// Previous watermark
        from: f64,
        /// New watermark
        to: f64,
    },
    /// Watermark write failed after at least one delivered alert
    WatermarkFailed {
        /// Budget concerned
        budget_id: String,
        /// New watermark
        to: f64,
        /// Error description
        reason: String,
    },
    /// Store call failed; `budget_id` is `None` when the lookup itself failed
    StoreFailed {
        /// Upstream transaction identifier
        transaction_id: String,
        /// Budget concerned
        budget_id: Option<String>,
        /// Error description
        reason: String,
    },
    /// Budget data is broken and the budget was skipped
    InvalidBudget {
        /// Budget concerned
        budget_id: String,
        /// Error description
        reason: String,
    },
}

/// Capability injected into the engine to surface what it is doing.
pub trait Reporter: Send + Sync {
    /// Records one engine event.
    fn report(&self, event: &EngineEvent);
}

/// Default reporter: one structured `tracing` event per [`EngineEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &EngineEvent) {
        match event {
            EngineEvent::SkippedNonExpense {
                transaction_id,
                amount,
            } => debug!(%transaction_id, amount, "skipped: not an expense"),
            EngineEvent::NoBudgetsMatched {
                transaction_id,
                user_id,
                category_id,
            } => info!(
                %transaction_id,
                %user_id,
                %category_id,
                "no active budgets matched, transaction not tracked"
            ),
            EngineEvent::OutsideBudgetWindow {
                transaction_id,
                budget_id,
            } => warn!(
                %transaction_id,
                %budget_id,
                "transaction is outside the budget period, skipping budget"
            ),
            EngineEvent::SpendApplied {
                transaction_id,
                budget_id,
                old_spending,
                new_spending,
                limit,
            } => info!(
                %transaction_id,
                %budget_id,
                old_spending,
                new_spending,
                limit,
                "spend applied"
            ),
            EngineEvent::DuplicateTransaction {
                transaction_id,
                budget_id,
            } => info!(%transaction_id, %budget_id, "spend update was a duplicate"),
            EngineEvent::ThresholdCrossed {
                budget_id,
                threshold,
            } => info!(%budget_id, threshold, "threshold crossed"),
            EngineEvent::AlertDelivered {
                budget_id,
                user_id,
                threshold,
            } => info!(%budget_id, %user_id, threshold, "alert delivered"),
            EngineEvent::AlertFailed {
                budget_id,
                user_id,
                threshold,
                reason,
            } => error!(%budget_id, %user_id, threshold, %reason, "alert failed"),
            EngineEvent::WatermarkAdvanced {
                budget_id,
                from,
                to,
            } => info!(%budget_id, from, to, "watermark advanced"),
            EngineEvent::WatermarkFailed {
                budget_id,
                to,
                reason,
            } => error!(%budget_id, to, %reason, "failed to advance watermark"),
            EngineEvent::StoreFailed {
                transaction_id,
                budget_id,
                reason,
            } => error!(
                %transaction_id,
                budget_id = budget_id.as_deref().unwrap_or("-"),
                %reason,
                "budget store call failed"
            ),
            EngineEvent::InvalidBudget { budget_id, reason } => {
                error!(%budget_id, %reason, "invalid budget configuration, budget skipped");
            }
        }
    }
}
