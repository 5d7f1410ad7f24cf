//! Budget seed definitions loaded from config.toml.
//!
//! Creating budgets is not the engine's job; seeding exists so the binary can be run
//! against a fresh database. Each `[[budgets]]` entry becomes a row on first start and
//! is left alone afterwards.

use crate::{
    core::threshold::normalize_thresholds,
    errors::{Error, Result},
    models::Budget,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Configuration for a single budget
#[derive(Debug, Deserialize, Clone)]
pub struct BudgetConfig {
    /// Stable identifier; a UUID is generated when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Owner of the budget
    pub user_id: String,
    /// Category the budget tracks
    pub category_id: String,
    /// Inclusive window start, RFC 3339 string
    pub period_start: DateTime<Utc>,
    /// Inclusive window end, RFC 3339 string
    pub period_end: DateTime<Utc>,
    /// Spending ceiling
    pub limit: f64,
    /// Alert thresholds as fractions of the limit
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f64>,
}

fn default_thresholds() -> Vec<f64> {
    vec![0.5, 0.8, 1.0]
}

impl BudgetConfig {
    /// Builds a fresh budget (zero spend, no alerts yet) from this entry.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for a non-positive limit, an inverted window or
    /// thresholds outside (0, 1].
    pub fn to_budget(&self) -> Result<Budget> {
        if !self.limit.is_finite() || self.limit <= 0.0 {
            return Err(self.invalid(format!("limit must be positive, got {}", self.limit)));
        }
        if self.period_end < self.period_start {
            return Err(self.invalid("period_end is before period_start".to_string()));
        }
        let thresholds =
            normalize_thresholds(&self.thresholds).map_err(|e| self.invalid(e.to_string()))?;

        Ok(Budget {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: self.user_id.clone(),
            category_id: self.category_id.clone(),
            period_start: self.period_start,
            period_end: self.period_end,
            limit: self.limit,
            current_spending: 0.0,
            thresholds,
            last_alerted_threshold: 0.0,
        })
    }

    fn invalid(&self, reason: String) -> Error {
        Error::Config {
            message: format!(
                "budget for user '{}' category '{}': {reason}",
                self.user_id, self.category_id
            ),
        }
    }
}
