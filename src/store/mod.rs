//! Budget store contract and the adapters that implement it.
//!
//! The store owns all persisted state. The one primitive the engine relies on for
//! correctness is [`BudgetStore::apply_spend_if_new`]: an atomic conditional write keyed
//! by (budget id, transaction id) that turns redelivered transactions into no-ops.
//!
//! Every call receives the engine's cancellation token. Adapters with slow I/O should give
//! up with [`Error::Cancelled`](crate::errors::Error::Cancelled) once it fires; a cancelled
//! call must leave the pair either fully applied or untouched.

/// SeaORM-backed store (SQLite in the shipped binary)
pub mod database;
/// In-memory store guarded by per-budget locks
pub mod memory;

use crate::{errors::Result, models::Budget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

pub use database::SeaOrmBudgetStore;
pub use memory::InMemoryBudgetStore;

/// Result of a conditional spend update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The new spend was written and the marker recorded
    Applied,
    /// A marker for this (budget, transaction) pair already existed, nothing changed
    Duplicate,
}

impl ApplyOutcome {
    /// Shorthand for `matches!(self, ApplyOutcome::Applied)`.
    #[must_use]
    pub const fn was_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Persistent state consumed by the engine.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Budgets owned by `user_id` for `category_id` whose window contains `at`.
    async fn find_active_budgets(
        &self,
        user_id: &str,
        category_id: &str,
        at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Budget>>;

    /// Sets the budget's spend to `new_spending` unless `transaction_id` was already
    /// applied to it, in which case nothing changes and [`ApplyOutcome::Duplicate`]
    /// is returned. Must be atomic per (budget, transaction) pair.
    async fn apply_spend_if_new(
        &self,
        budget_id: &str,
        transaction_id: &str,
        new_spending: f64,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome>;

    /// Raises the alert watermark. A value at or below the stored one is ignored.
    async fn advance_watermark(
        &self,
        budget_id: &str,
        watermark: f64,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
