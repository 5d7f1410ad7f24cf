//! In-memory budget store for single-instance deployments, demos and tests.
//!
//! Each budget lives behind its own lock so the read-modify-write of a spend update is
//! atomic per budget without serialising unrelated budgets. Calls only wait on those locks,
//! so the cancellation token is not consulted.

use super::{ApplyOutcome, BudgetStore};
use crate::{
    errors::{Error, Result},
    models::Budget,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct BudgetSlot {
    budget: Budget,
    processed: HashSet<String>,
}

/// Map-backed [`BudgetStore`].
#[derive(Debug, Default)]
pub struct InMemoryBudgetStore {
    budgets: RwLock<HashMap<String, Arc<Mutex<BudgetSlot>>>>,
}

impl InMemoryBudgetStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a budget and returns its id. An empty id is replaced by a fresh UUID.
    pub async fn insert_budget(&self, mut budget: Budget) -> String {
        if budget.id.is_empty() {
            budget.id = uuid::Uuid::new_v4().to_string();
        }
        let id = budget.id.clone();
        let slot = BudgetSlot {
            budget,
            processed: HashSet::new(),
        };
        self.budgets
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(slot)));
        id
    }

    /// Snapshot of a stored budget.
    pub async fn get_budget(&self, budget_id: &str) -> Option<Budget> {
        let slot = self.slot(budget_id).await.ok()?;
        let guard = slot.lock().await;
        Some(guard.budget.clone())
    }

    /// Whether a marker exists for the pair.
    pub async fn is_processed(&self, budget_id: &str, transaction_id: &str) -> bool {
        match self.slot(budget_id).await {
            Ok(slot) => slot.lock().await.processed.contains(transaction_id),
            Err(_) => false,
        }
    }

    async fn slot(&self, budget_id: &str) -> Result<Arc<Mutex<BudgetSlot>>> {
        self.budgets
            .read()
            .await
            .get(budget_id)
            .cloned()
            .ok_or_else(|| Error::BudgetNotFound {
                budget_id: budget_id.to_string(),
            })
    }
}

#[async_trait]
impl BudgetStore for InMemoryBudgetStore {
    async fn find_active_budgets(
        &self,
        user_id: &str,
        category_id: &str,
        at: DateTime<Utc>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Budget>> {
        let slots: Vec<Arc<Mutex<BudgetSlot>>> =
            self.budgets.read().await.values().cloned().collect();

        let mut active = Vec::new();
        for slot in slots {
            let guard = slot.lock().await;
            let budget = &guard.budget;
            if budget.user_id == user_id && budget.category_id == category_id && budget.is_active_at(at)
            {
                active.push(budget.clone());
            }
        }
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn apply_spend_if_new(
        &self,
        budget_id: &str,
        transaction_id: &str,
        new_spending: f64,
        _cancel: &CancellationToken,
    ) -> Result<ApplyOutcome> {
        let slot = self.slot(budget_id).await?;
        let mut guard = slot.lock().await;

        if !guard.processed.insert(transaction_id.to_string()) {
            debug!(budget_id, transaction_id, "transaction already processed for budget");
            return Ok(ApplyOutcome::Duplicate);
        }
        guard.budget.current_spending = new_spending;
        Ok(ApplyOutcome::Applied)
    }

    async fn advance_watermark(
        &self,
        budget_id: &str,
        watermark: f64,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        let slot = self.slot(budget_id).await?;
        let mut guard = slot.lock().await;
        if watermark > guard.budget.last_alerted_threshold {
            guard.budget.last_alerted_threshold = watermark;
        }
        Ok(())
    }
}
