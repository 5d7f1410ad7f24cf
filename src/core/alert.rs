//! Alert dispatch - renders one alert per crossed threshold and advances the watermark.
//!
//! The watermark moves to the highest threshold whose delivery succeeded, even when a lower
//! threshold in the same pass failed. That lower alert is then never sent by this engine;
//! only an out-of-band reconciliation could deliver it.

use super::{EngineContext, threshold::percent};
use crate::{
    models::{Budget, BudgetAlert},
    report::EngineEvent,
};

/// What happened while dispatching alerts for one budget.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DispatchOutcome {
    /// Alerts the sink accepted
    pub delivered: usize,
    /// Alerts the sink rejected or timed out on
    pub failed: usize,
    /// Watermark persisted by this pass, if any
    pub watermark: Option<f64>,
}

/// Builds the user-facing alert for `threshold` on `budget` at `current_spending`.
#[must_use]
pub fn render_alert(budget: &Budget, current_spending: f64, threshold: f64) -> BudgetAlert {
    let message = format!(
        "Budget alert! You have reached {} of your budget for category '{}'. Current spending: {:.2} / {:.2}",
        percent(threshold),
        budget.category_id,
        current_spending,
        budget.limit
    );

    BudgetAlert {
        user_id: budget.user_id.clone(),
        budget_id: budget.id.clone(),
        message,
        current_spending,
        limit: budget.limit,
        threshold,
    }
}

/// Sends one alert per threshold in `crossed` (ascending) and persists the new watermark.
///
/// `budget` is the pre-update snapshot; its `last_alerted_threshold` is the watermark the
/// evaluation ran against.
pub async fn dispatch_alerts(
    ctx: &EngineContext,
    budget: &Budget,
    current_spending: f64,
    crossed: &[f64],
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    let mut highest_delivered = budget.last_alerted_threshold;

    for &threshold in crossed {
        ctx.reporter.report(&EngineEvent::ThresholdCrossed {
            budget_id: budget.id.clone(),
            threshold,
        });

        let alert = render_alert(budget, current_spending, threshold);
        match ctx
            .bounded("alert delivery", ctx.sink.send(&alert, &ctx.cancel))
            .await
        {
            Ok(()) => {
                outcome.delivered += 1;
                highest_delivered = highest_delivered.max(threshold);
                ctx.reporter.report(&EngineEvent::AlertDelivered {
                    budget_id: budget.id.clone(),
                    user_id: budget.user_id.clone(),
                    threshold,
                });
            }
            Err(e) => {
                outcome.failed += 1;
                ctx.reporter.report(&EngineEvent::AlertFailed {
                    budget_id: budget.id.clone(),
                    user_id: budget.user_id.clone(),
                    threshold,
                    reason: e.to_string(),
                });
            }
        }
    }

    if highest_delivered <= budget.last_alerted_threshold {
        return outcome;
    }

    match ctx
        .bounded(
            "watermark update",
            ctx.store.advance_watermark(&budget.id, highest_delivered, &ctx.cancel),
        )
        .await
    {
        Ok(()) => {
            outcome.watermark = Some(highest_delivered);
            ctx.reporter.report(&EngineEvent::WatermarkAdvanced {
                budget_id: budget.id.clone(),
                from: budget.last_alerted_threshold,
                to: highest_delivered,
            });
        }
        Err(e) => ctx.reporter.report(&EngineEvent::WatermarkFailed {
            budget_id: budget.id.clone(),
            to: highest_delivered,
            reason: e.to_string(),
        }),
    }

    outcome
}
