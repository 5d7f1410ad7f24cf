//! Budget updater - applies one transaction to every budget it affects.
//!
//! Each matched budget is handled independently: a store failure or a broken budget is
//! reported and the remaining budgets are still attempted. Idempotency is delegated to
//! [`BudgetStore::apply_spend_if_new`](crate::store::BudgetStore::apply_spend_if_new);
//! threshold evaluation only runs when that call actually applied the spend.

use super::{
    EngineContext,
    alert::dispatch_alerts,
    threshold::{crossed_thresholds, validate_budget},
};
use crate::{
    models::{Budget, TransactionEvent},
    report::EngineEvent,
    store::ApplyOutcome,
};

/// Outcome of applying one event, aggregated over its budgets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventSummary {
    /// Event was not an expense and was ignored
    pub skipped: bool,
    /// Budget lookup failed, no budget was attempted
    pub lookup_failed: bool,
    /// Budgets returned by the store
    pub matched: usize,
    /// Spend updates committed
    pub applied: usize,
    /// Spend updates already committed by an earlier delivery
    pub duplicates: usize,
    /// Spend updates that failed in the store
    pub failed: usize,
    /// Budgets skipped because their window does not contain the event
    pub out_of_window: usize,
    /// Budgets skipped because their limit or thresholds are broken
    pub invalid: usize,
    /// Alerts accepted by the sink
    pub alerts_delivered: usize,
    /// Alerts rejected by the sink
    pub alerts_failed: usize,
}

enum BudgetOutcome {
    OutOfWindow,
    Invalid,
    Failed,
    Duplicate,
    Applied { delivered: usize, failed: usize },
}

/// Applies transaction events to budgets.
#[derive(Debug, Clone)]
pub struct BudgetUpdater {
    ctx: EngineContext,
}

impl BudgetUpdater {
    /// Creates an updater over the given collaborators.
    #[must_use]
    pub const fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Applies `event` to every active budget for its user and category.
    ///
    /// Never fails: every problem is reported through the context's reporter and counted in
    /// the returned summary.
    pub async fn apply(&self, event: &TransactionEvent) -> EventSummary {
        let mut summary = EventSummary::default();

        if !event.is_expense() {
            self.ctx.reporter.report(&EngineEvent::SkippedNonExpense {
                transaction_id: event.id.clone(),
                amount: event.amount,
            });
            summary.skipped = true;
            return summary;
        }

        let budgets = match self
            .ctx
            .bounded(
                "budget lookup",
                self.ctx
                    .store
                    .find_active_budgets(
                        &event.user_id,
                        &event.category_id,
                        event.timestamp,
                        &self.ctx.cancel,
                    ),
            )
            .await
        {
            Ok(budgets) => budgets,
            Err(e) => {
                self.ctx.reporter.report(&EngineEvent::StoreFailed {
                    transaction_id: event.id.clone(),
                    budget_id: None,
                    reason: e.to_string(),
                });
                summary.lookup_failed = true;
                return summary;
            }
        };

        if budgets.is_empty() {
            self.ctx.reporter.report(&EngineEvent::NoBudgetsMatched {
                transaction_id: event.id.clone(),
                user_id: event.user_id.clone(),
                category_id: event.category_id.clone(),
            });
            return summary;
        }

        summary.matched = budgets.len();
        for budget in &budgets {
            match self.apply_to_budget(event, budget).await {
                BudgetOutcome::OutOfWindow => summary.out_of_window += 1,
                BudgetOutcome::Invalid => summary.invalid += 1,
                BudgetOutcome::Failed => summary.failed += 1,
                BudgetOutcome::Duplicate => summary.duplicates += 1,
                BudgetOutcome::Applied { delivered, failed } => {
                    summary.applied += 1;
                    summary.alerts_delivered += delivered;
                    summary.alerts_failed += failed;
                }
            }
        }
        summary
    }

    async fn apply_to_budget(&self, event: &TransactionEvent, budget: &Budget) -> BudgetOutcome {
        // The store may return a superset of the active budgets
        if !budget.is_active_at(event.timestamp) {
            self.ctx.reporter.report(&EngineEvent::OutsideBudgetWindow {
                transaction_id: event.id.clone(),
                budget_id: budget.id.clone(),
            });
            return BudgetOutcome::OutOfWindow;
        }

        if let Err(e) = validate_budget(budget) {
            self.report_invalid(budget, &e);
            return BudgetOutcome::Invalid;
        }

        let old_spending = budget.current_spending;
        let new_spending = old_spending + event.spend();

        let applied = self
            .ctx
            .bounded(
                "spend update",
                self.ctx
                    .store
                    .apply_spend_if_new(&budget.id, &event.id, new_spending, &self.ctx.cancel),
            )
            .await;

        match applied {
            Ok(ApplyOutcome::Applied) => {
                self.ctx.reporter.report(&EngineEvent::SpendApplied {
                    transaction_id: event.id.clone(),
                    budget_id: budget.id.clone(),
                    old_spending,
                    new_spending,
                    limit: budget.limit,
                });
            }
            Ok(ApplyOutcome::Duplicate) => {
                self.ctx.reporter.report(&EngineEvent::DuplicateTransaction {
                    transaction_id: event.id.clone(),
                    budget_id: budget.id.clone(),
                });
                return BudgetOutcome::Duplicate;
            }
            Err(e) => {
                self.ctx.reporter.report(&EngineEvent::StoreFailed {
                    transaction_id: event.id.clone(),
                    budget_id: Some(budget.id.clone()),
                    reason: e.to_string(),
                });
                return BudgetOutcome::Failed;
            }
        }

        let crossed = match crossed_thresholds(
            old_spending,
            new_spending,
            budget.limit,
            &budget.thresholds,
            budget.last_alerted_threshold,
        ) {
            Ok(crossed) => crossed,
            Err(e) => {
                self.report_invalid(budget, &e);
                return BudgetOutcome::Applied {
                    delivered: 0,
                    failed: 0,
                };
            }
        };

        if crossed.is_empty() {
            return BudgetOutcome::Applied {
                delivered: 0,
                failed: 0,
            };
        }

        let dispatched = dispatch_alerts(&self.ctx, budget, new_spending, &crossed).await;
        BudgetOutcome::Applied {
            delivered: dispatched.delivered,
            failed: dispatched.failed,
        }
    }

    fn report_invalid(&self, budget: &Budget, error: &crate::errors::Error) {
        self.ctx.reporter.report(&EngineEvent::InvalidBudget {
            budget_id: budget.id.clone(),
            reason: error.to_string(),
        });
    }
}
