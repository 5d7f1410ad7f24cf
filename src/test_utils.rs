//! Shared test utilities for the budget tracker.
//!
//! Provides fixture builders, an in-memory `SQLite` setup, and collaborator doubles:
//! a recording sink with injectable failures, a recording reporter, and stores that
//! misbehave in controlled ways.

#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use crate::{
    core::EngineContext,
    errors::{Error, Result},
    models::{Budget, BudgetAlert, TransactionEvent},
    report::{EngineEvent, Reporter},
    sink::AlertSink,
    store::{ApplyOutcome, BudgetStore},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub const TEST_USER: &str = "alice";
pub const TEST_CATEGORY: &str = "groceries";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

pub fn period_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

pub fn period_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap()
}

pub fn in_period() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

pub fn before_period() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 27, 9, 0, 0).unwrap()
}

pub fn after_period() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap()
}

/// Budget for [`TEST_USER`] / [`TEST_CATEGORY`] over March 2026 with thresholds 50/80/100%.
pub fn test_budget(id: &str, limit: f64) -> Budget {
    Budget {
        id: id.to_string(),
        user_id: TEST_USER.to_string(),
        category_id: TEST_CATEGORY.to_string(),
        period_start: period_start(),
        period_end: period_end(),
        limit,
        current_spending: 0.0,
        thresholds: vec![0.5, 0.8, 1.0],
        last_alerted_threshold: 0.0,
    }
}

/// Transaction for [`TEST_USER`] / [`TEST_CATEGORY`] inside the test period.
pub fn expense(id: &str, amount: f64) -> TransactionEvent {
    TransactionEvent {
        id: id.to_string(),
        user_id: TEST_USER.to_string(),
        account_id: "checking".to_string(),
        category_id: TEST_CATEGORY.to_string(),
        amount,
        description: format!("test transaction {id}"),
        timestamp: in_period(),
    }
}

pub fn test_context(
    store: Arc<dyn BudgetStore>,
    sink: Arc<dyn AlertSink>,
    reporter: Arc<dyn Reporter>,
) -> EngineContext {
    EngineContext::new(store, sink)
        .with_reporter(reporter)
        .with_call_timeout(Duration::from_secs(2))
}

/// Sink that remembers delivered alerts and fails for chosen thresholds.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<BudgetAlert>>,
    failing: Vec<f64>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(thresholds: &[f64]) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            failing: thresholds.to_vec(),
        }
    }

    pub fn alerts(&self) -> Vec<BudgetAlert> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn thresholds(&self) -> Vec<f64> {
        self.alerts().iter().map(|a| a.threshold).collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, alert: &BudgetAlert, _cancel: &CancellationToken) -> Result<()> {
        if self.failing.contains(&alert.threshold) {
            return Err(Error::AlertDelivery {
                message: format!("simulated outage for {}", alert.threshold),
            });
        }
        self.delivered.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Store that ignores the lookup filters and returns its budget for any query.
#[derive(Debug)]
pub struct SupersetStore {
    budget: Budget,
    writes: Mutex<usize>,
}

impl SupersetStore {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            writes: Mutex::new(0),
        }
    }

    pub fn spend_writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl BudgetStore for SupersetStore {
    async fn find_active_budgets(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
        _: &CancellationToken,
    ) -> Result<Vec<Budget>> {
        Ok(vec![self.budget.clone()])
    }

    async fn apply_spend_if_new(
        &self,
        _: &str,
        _: &str,
        _: f64,
        _: &CancellationToken,
    ) -> Result<ApplyOutcome> {
        *self.writes.lock().unwrap() += 1;
        Ok(ApplyOutcome::Applied)
    }

    async fn advance_watermark(&self, _: &str, _: f64, _: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

/// In-memory store whose calls fail for one budget, or for every lookup.
#[derive(Debug)]
pub struct FlakyStore {
    inner: crate::store::InMemoryBudgetStore,
    budgets: Vec<Budget>,
    failing_budget: Option<String>,
    fail_lookups: bool,
}

impl FlakyStore {
    pub fn failing_for(budgets: Vec<Budget>, budget_id: &str) -> Self {
        Self {
            inner: crate::store::InMemoryBudgetStore::new(),
            budgets,
            failing_budget: Some(budget_id.to_string()),
            fail_lookups: false,
        }
    }

    pub fn failing_lookups() -> Self {
        Self {
            inner: crate::store::InMemoryBudgetStore::new(),
            budgets: Vec::new(),
            failing_budget: None,
            fail_lookups: true,
        }
    }

    async fn seed(&self) {
        for budget in &self.budgets {
            if self.inner.get_budget(&budget.id).await.is_none() {
                self.inner.insert_budget(budget.clone()).await;
            }
        }
    }

    fn unavailable() -> Error {
        Error::Store {
            message: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl BudgetStore for FlakyStore {
    async fn find_active_budgets(
        &self,
        user_id: &str,
        category_id: &str,
        at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Budget>> {
        if self.fail_lookups {
            return Err(Self::unavailable());
        }
        self.seed().await;
        self.inner
            .find_active_budgets(user_id, category_id, at, cancel)
            .await
    }

    async fn apply_spend_if_new(
        &self,
        budget_id: &str,
        transaction_id: &str,
        new_spending: f64,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome> {
        if self.failing_budget.as_deref() == Some(budget_id) {
            return Err(Self::unavailable());
        }
        self.inner
            .apply_spend_if_new(budget_id, transaction_id, new_spending, cancel)
            .await
    }

    async fn advance_watermark(
        &self,
        budget_id: &str,
        watermark: f64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.inner.advance_watermark(budget_id, watermark, cancel).await
    }
}

/// Store whose spend update parks until [`BlockingStore::release`] is called.
#[derive(Debug)]
pub struct BlockingStore {
    budget: Budget,
    entered: Notify,
    gate: Semaphore,
    applied: Mutex<Vec<String>>,
}

impl BlockingStore {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            entered: Notify::new(),
            gate: Semaphore::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn applied_transactions(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl BudgetStore for BlockingStore {
    async fn find_active_budgets(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
        _: &CancellationToken,
    ) -> Result<Vec<Budget>> {
        Ok(vec![self.budget.clone()])
    }

    async fn apply_spend_if_new(
        &self,
        _budget_id: &str,
        transaction_id: &str,
        _new_spending: f64,
        _cancel: &CancellationToken,
    ) -> Result<ApplyOutcome> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await.map_err(|e| Error::Store {
            message: e.to_string(),
        })?;
        self.applied.lock().unwrap().push(transaction_id.to_string());
        Ok(ApplyOutcome::Applied)
    }

    async fn advance_watermark(&self, _: &str, _: f64, _: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

/// Sink that never delivers by itself and gives up once the engine cancels.
#[derive(Debug, Default)]
pub struct StallingSink {
    entered: Notify,
    attempts: Mutex<usize>,
}

impl StallingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl AlertSink for StallingSink {
    async fn send(&self, _alert: &BudgetAlert, cancel: &CancellationToken) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        self.entered.notify_one();
        cancel.cancelled().await;
        Err(Error::Cancelled {
            operation: "alert delivery",
        })
    }
}

/// Reporter that panics as soon as a spend is applied.
#[derive(Debug, Default)]
pub struct PanickingReporter;

impl Reporter for PanickingReporter {
    fn report(&self, event: &EngineEvent) {
        assert!(
            !matches!(event, EngineEvent::SpendApplied { .. }),
            "reporter crashed"
        );
    }
}
