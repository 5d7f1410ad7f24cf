//! Threshold evaluation - decides which alert thresholds a spend change newly crosses.
//!
//! This is a pure function with no I/O. A threshold `t` is newly crossed when the spend ratio
//! moved from strictly below `t` to at or above it, and `t` is above the budget's watermark.
//! Several thresholds can be crossed by one large transaction; all of them are returned.

use crate::{
    errors::{Error, Result},
    models::Budget,
};

/// Returns every threshold newly crossed by moving from `old_spending` to `new_spending`,
/// ascending and deduplicated.
///
/// # Errors
/// [`Error::InvalidBudget`] when `limit` is not a positive finite number or when a threshold
/// is not a finite fraction in (0, 1].
pub fn crossed_thresholds(
    old_spending: f64,
    new_spending: f64,
    limit: f64,
    thresholds: &[f64],
    watermark: f64,
) -> Result<Vec<f64>> {
    if !limit.is_finite() || limit <= 0.0 {
        return Err(Error::InvalidBudget {
            message: format!("limit must be positive, got {limit}"),
        });
    }

    let ordered = normalize_thresholds(thresholds)?;
    let old_ratio = old_spending / limit;
    let new_ratio = new_spending / limit;

    Ok(ordered
        .into_iter()
        .filter(|&t| old_ratio < t && new_ratio >= t && t > watermark)
        .collect())
}

/// Checks that a budget's limit and thresholds can be evaluated at all.
///
/// # Errors
/// The same [`Error::InvalidBudget`] cases as [`crossed_thresholds`].
pub fn validate_budget(budget: &Budget) -> Result<()> {
    crossed_thresholds(0.0, 0.0, budget.limit, &budget.thresholds, 0.0).map(|_| ())
}

/// Sorts ascending and removes duplicates, rejecting anything outside (0, 1].
///
/// # Errors
/// [`Error::InvalidBudget`] for a non-finite or out-of-range threshold.
pub fn normalize_thresholds(thresholds: &[f64]) -> Result<Vec<f64>> {
    if let Some(bad) = thresholds
        .iter()
        .find(|t| !t.is_finite() || **t <= 0.0 || **t > 1.0)
    {
        return Err(Error::InvalidBudget {
            message: format!("threshold {bad} is outside (0, 1]"),
        });
    }

    let mut ordered = thresholds.to_vec();
    ordered.sort_by(f64::total_cmp);
    ordered.dedup();
    Ok(ordered)
}

/// Formats a fraction as a whole percentage, e.g. `0.8` -> `"80%"`.
#[must_use]
pub fn percent(threshold: f64) -> String {
    format!("{:.0}%", threshold * 100.0)
}
