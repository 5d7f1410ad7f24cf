//! Core engine logic - framework-agnostic event processing.
//!
//! The pieces, leaves first: [`threshold`] decides which thresholds a spend change crosses,
//! [`alert`] renders and delivers alerts and advances the watermark, [`updater`] applies one
//! transaction to every matching budget, and [`consumer`] owns the processing loop.

/// Alert rendering and dispatch
pub mod alert;
/// Event consumer and lifecycle controller
pub mod consumer;
/// Pure threshold crossing evaluation
pub mod threshold;
/// Applies a transaction to its budgets
pub mod updater;

use crate::{
    errors::{Error, Result},
    report::{Reporter, TracingReporter},
    sink::AlertSink,
    store::BudgetStore,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

pub use consumer::{BudgetTrackingEngine, EngineState, EngineStats, RunSummary, StopReason};
pub use updater::{BudgetUpdater, EventSummary};

/// Default bound on a single store or sink call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators and limits shared by everything that processes an event.
///
/// `cancel` is handed to every store and sink call. The engine replaces it with a child of
/// whatever token the context was built with, so cancelling that parent also stops the engine.
#[derive(Clone)]
pub struct EngineContext {
    pub(crate) store: Arc<dyn BudgetStore>,
    pub(crate) sink: Arc<dyn AlertSink>,
    pub(crate) reporter: Arc<dyn Reporter>,
    pub(crate) call_timeout: Duration,
    pub(crate) cancel: CancellationToken,
}

impl EngineContext {
    /// Context with the tracing reporter and the default call timeout.
    pub fn new(store: Arc<dyn BudgetStore>, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            store,
            sink,
            reporter: Arc::new(TracingReporter),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replaces the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Ties the engine to an external shutdown signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token passed to collaborators; fires once the engine is stopping.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs a collaborator call, failing with [`Error::Timeout`] once `call_timeout` elapses.
    pub(crate) async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                after_ms: self.call_timeout.as_millis(),
            })?
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("call_timeout", &self.call_timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
