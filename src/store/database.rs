//! SeaORM budget store.
//!
//! Idempotency comes from the composite primary key on `processed_transactions`: the marker
//! is inserted with `ON CONFLICT DO NOTHING` and the spend is only written when that insert
//! actually added a row, all inside one database transaction. Every call gives up with
//! [`Error::Cancelled`] once the engine's token fires; an abandoned spend update is rolled
//! back, so the transaction stays unapplied and can be redelivered.

use super::{ApplyOutcome, BudgetStore};
use crate::{
    entities::{
        Budget, BudgetColumn, ProcessedTransaction, ProcessedTransactionColumn, budget,
        processed_transaction,
    },
    errors::{Error, Result},
    models,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// [`BudgetStore`] over a SeaORM connection.
#[derive(Debug, Clone)]
pub struct SeaOrmBudgetStore {
    db: DatabaseConnection,
}

impl SeaOrmBudgetStore {
    /// Wraps an open connection. Tables must already exist, see
    /// [`create_tables`](crate::config::database::create_tables).
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Inserts a new budget row.
    pub async fn insert_budget(&self, budget: &models::Budget) -> Result<()> {
        let now = Utc::now();
        let model = budget::ActiveModel {
            id: Set(budget.id.clone()),
            user_id: Set(budget.user_id.clone()),
            category_id: Set(budget.category_id.clone()),
            period_start: Set(budget.period_start),
            period_end: Set(budget.period_end),
            spending_limit: Set(budget.limit),
            current_spending: Set(budget.current_spending),
            thresholds: Set(serde_json::to_string(&budget.thresholds)?),
            last_alerted_threshold: Set(budget.last_alerted_threshold),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Budget::insert(model).exec_without_returning(&self.db).await?;
        Ok(())
    }

    /// Inserts the budget unless a row with the same id exists. Returns whether it was inserted.
    pub async fn insert_budget_if_missing(&self, budget: &models::Budget) -> Result<bool> {
        if Budget::find_by_id(budget.id.clone())
            .one(&self.db)
            .await?
            .is_some()
        {
            return Ok(false);
        }
        self.insert_budget(budget).await?;
        Ok(true)
    }

    /// Loads one budget by id.
    pub async fn get_budget(&self, budget_id: &str) -> Result<Option<models::Budget>> {
        Budget::find_by_id(budget_id.to_string())
            .one(&self.db)
            .await?
            .map(models::Budget::try_from)
            .transpose()
    }

    /// Whether a spend marker exists for the pair.
    pub async fn is_processed(&self, budget_id: &str, transaction_id: &str) -> Result<bool> {
        Ok(
            ProcessedTransaction::find_by_id((budget_id.to_string(), transaction_id.to_string()))
                .one(&self.db)
                .await?
                .is_some(),
        )
    }
}

#[async_trait]
impl BudgetStore for SeaOrmBudgetStore {
    async fn find_active_budgets(
        &self,
        user_id: &str,
        category_id: &str,
        at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<models::Budget>> {
        let query = Budget::find()
            .filter(BudgetColumn::UserId.eq(user_id))
            .filter(BudgetColumn::CategoryId.eq(category_id))
            .filter(BudgetColumn::PeriodStart.lte(at))
            .filter(BudgetColumn::PeriodEnd.gte(at))
            .order_by_asc(BudgetColumn::Id)
            .all(&self.db);
        let rows = until_cancelled(cancel, "budget lookup", query).await?;

        let mut budgets = Vec::with_capacity(rows.len());
        for row in rows {
            match models::Budget::try_from(row) {
                Ok(budget) => budgets.push(budget),
                // One corrupt row must not hide the user's other budgets
                Err(e) => error!("Skipping unreadable budget row: {e}"),
            }
        }
        Ok(budgets)
    }

    async fn apply_spend_if_new(
        &self,
        budget_id: &str,
        transaction_id: &str,
        new_spending: f64,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome> {
        // Dropping an uncommitted transaction rolls it back, so cancelling leaves the pair untouched
        until_cancelled(
            cancel,
            "spend update",
            self.apply_spend_in_transaction(budget_id, transaction_id, new_spending),
        )
        .await
    }

    async fn advance_watermark(
        &self,
        budget_id: &str,
        watermark: f64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let update = Budget::update_many()
            .col_expr(BudgetColumn::LastAlertedThreshold, Expr::value(watermark))
            .col_expr(BudgetColumn::UpdatedAt, Expr::value(Utc::now()))
            .filter(BudgetColumn::Id.eq(budget_id))
            .filter(BudgetColumn::LastAlertedThreshold.lt(watermark))
            .exec(&self.db);
        let result = until_cancelled(cancel, "watermark update", update).await?;

        // Zero rows is fine when the stored watermark is already higher
        if result.rows_affected == 0 && self.get_budget(budget_id).await?.is_none() {
            return Err(Error::BudgetNotFound {
                budget_id: budget_id.to_string(),
            });
        }
        Ok(())
    }
}

impl SeaOrmBudgetStore {
    async fn apply_spend_in_transaction(
        &self,
        budget_id: &str,
        transaction_id: &str,
        new_spending: f64,
    ) -> Result<ApplyOutcome> {
        if Budget::find_by_id(budget_id.to_string())
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(Error::BudgetNotFound {
                budget_id: budget_id.to_string(),
            });
        }

        // The marker insert is the first statement so SQLite takes the write lock before any
        // read inside the transaction; competing writers then wait on the busy timeout.
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let marker = processed_transaction::ActiveModel {
            budget_id: Set(budget_id.to_string()),
            transaction_id: Set(transaction_id.to_string()),
            processed_at: Set(now),
        };
        let inserted = ProcessedTransaction::insert(marker)
            .on_conflict(
                OnConflict::columns([
                    ProcessedTransactionColumn::BudgetId,
                    ProcessedTransactionColumn::TransactionId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if inserted == 0 {
            txn.rollback().await?;
            debug!(budget_id, transaction_id, "transaction already processed for budget");
            return Ok(ApplyOutcome::Duplicate);
        }

        let updated = Budget::update_many()
            .col_expr(BudgetColumn::CurrentSpending, Expr::value(new_spending))
            .col_expr(BudgetColumn::UpdatedAt, Expr::value(now))
            .filter(BudgetColumn::Id.eq(budget_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Err(Error::BudgetNotFound {
                budget_id: budget_id.to_string(),
            });
        }

        txn.commit().await?;
        Ok(ApplyOutcome::Applied)
    }
}

/// Races a database call against the engine's shutdown signal.
async fn until_cancelled<T, E>(
    cancel: &CancellationToken,
    operation: &'static str,
    call: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    Error: From<E>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled { operation }),
        result = call => result.map_err(Error::from),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{config::database::create_tables, test_utils::*};
    use std::sync::Arc;

    async fn setup_store() -> Result<SeaOrmBudgetStore> {
        Ok(SeaOrmBudgetStore::new(setup_test_db().await?))
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_insert_and_get_budget() -> Result<()> {
        let store = setup_store().await?;
        let budget = test_budget("b1", 250.0);
        store.insert_budget(&budget).await?;

        let loaded = store.get_budget("b1").await?.unwrap();
        assert_eq!(loaded, budget);
        assert!(store.get_budget("missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_budget_if_missing_keeps_existing_row() -> Result<()> {
        let store = setup_store().await?;
        let budget = test_budget("b1", 100.0);
        assert!(store.insert_budget_if_missing(&budget).await?);

        store.apply_spend_if_new("b1", "tx-1", 40.0, &live()).await?;
        assert!(!store.insert_budget_if_missing(&budget).await?);
        assert_eq!(store.get_budget("b1").await?.unwrap().current_spending, 40.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_spend_if_new_is_idempotent() -> Result<()> {
        let store = setup_store().await?;
        store.insert_budget(&test_budget("b1", 100.0)).await?;

        let first = store.apply_spend_if_new("b1", "tx-1", 30.0, &live()).await?;
        let second = store.apply_spend_if_new("b1", "tx-1", 60.0, &live()).await?;

        assert_eq!(first, ApplyOutcome::Applied);
        assert_eq!(second, ApplyOutcome::Duplicate);
        assert_eq!(store.get_budget("b1").await?.unwrap().current_spending, 30.0);
        assert!(store.is_processed("b1", "tx-1").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_spend_for_unknown_budget_fails() -> Result<()> {
        let store = setup_store().await?;
        let result = store.apply_spend_if_new("missing", "tx-1", 10.0, &live()).await;
        assert!(matches!(result, Err(Error::BudgetNotFound { .. })));
        assert!(!store.is_processed("missing", "tx-1").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_active_budgets_respects_window() -> Result<()> {
        let store = setup_store().await?;
        store.insert_budget(&test_budget("b1", 100.0)).await?;

        let mut other_category = test_budget("b2", 100.0);
        other_category.category_id = "travel".to_string();
        store.insert_budget(&other_category).await?;

        let found = store
            .find_active_budgets(TEST_USER, TEST_CATEGORY, in_period(), &live())
            .await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b1");
        assert_eq!(found[0].thresholds, vec![0.5, 0.8, 1.0]);

        let before = store
            .find_active_budgets(TEST_USER, TEST_CATEGORY, before_period(), &live())
            .await?;
        assert!(before.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_advance_watermark_only_moves_up() -> Result<()> {
        let store = setup_store().await?;
        store.insert_budget(&test_budget("b1", 100.0)).await?;

        store.advance_watermark("b1", 0.8, &live()).await?;
        store.advance_watermark("b1", 0.5, &live()).await?;
        assert_eq!(
            store.get_budget("b1").await?.unwrap().last_alerted_threshold,
            0.8
        );

        let missing = store.advance_watermark("missing", 0.5, &live()).await;
        assert!(matches!(missing, Err(Error::BudgetNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_spend_update_leaves_pair_unapplied() -> Result<()> {
        let store = setup_store().await?;
        store.insert_budget(&test_budget("b1", 100.0)).await?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = store.apply_spend_if_new("b1", "tx-1", 30.0, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert!(!store.is_processed("b1", "tx-1").await?);
        assert_eq!(store.get_budget("b1").await?.unwrap().current_spending, 0.0);

        // A redelivery after restart still applies
        let retried = store.apply_spend_if_new("b1", "tx-1", 30.0, &live()).await?;
        assert_eq!(retried, ApplyOutcome::Applied);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_lookup_returns_cancelled() -> Result<()> {
        let store = setup_store().await?;
        store.insert_budget(&test_budget("b1", 100.0)).await?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = store
            .find_active_budgets(TEST_USER, TEST_CATEGORY, in_period(), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled { .. })));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deliveries_of_one_pair_apply_once() -> Result<()> {
        // File-backed so the pool really opens several connections
        let path =
            std::env::temp_dir().join(format!("budget-tracker-{}.sqlite", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = sea_orm::Database::connect(&url).await?;
        create_tables(&db).await?;
        let store = Arc::new(SeaOrmBudgetStore::new(db));
        store.insert_budget(&test_budget("b1", 100.0)).await?;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .apply_spend_if_new("b1", "tx-1", 30.0, &CancellationToken::new())
                        .await
                })
            })
            .collect();

        let mut applied = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap()? {
                ApplyOutcome::Applied => applied += 1,
                ApplyOutcome::Duplicate => duplicates += 1,
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(store.get_budget("b1").await?.unwrap().current_spending, 30.0);

        drop(store);
        let _ = std::fs::remove_file(&path);
        Ok(())
    }
}
