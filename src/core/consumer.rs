//! Event consumer and lifecycle controller.
//!
//! One task pulls events from the inbound channel and hands them to the [`BudgetUpdater`]
//! strictly one at a time, so updates to a single budget are never raced inside an engine
//! instance. Shutdown is cooperative: [`BudgetTrackingEngine::stop`] cancels the token, the
//! event in flight (if any) runs to completion, and no further event is pulled. The same
//! token reaches every store and sink call, so a collaborator stuck on I/O can return early
//! instead of holding the drain for its full timeout.
//!
//! ```text
//! Idle --start()--> Running --stop()--> Draining --> Stopped
//!                      \--inbound closed------------> Stopped
//! ```

use super::{BudgetUpdater, EngineContext, EventSummary};
use crate::{
    errors::{Error, Result},
    models::TransactionEvent,
};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not yet consuming
    Idle,
    /// Consuming events
    Running,
    /// Cancellation observed, finishing the event in flight
    Draining,
    /// Loop has exited
    Stopped,
}

/// Why the processing loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called
    Cancelled,
    /// The inbound channel was closed by the producer
    UpstreamClosed,
}

/// Counters accumulated over the lifetime of the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Events pulled from the inbound channel
    pub events_received: u64,
    /// Non-expense events
    pub events_skipped: u64,
    /// Spend updates committed across all budgets
    pub spends_applied: u64,
    /// Redelivered (budget, transaction) pairs
    pub duplicates: u64,
    /// Failed lookups plus failed per-budget spend updates
    pub failures: u64,
    /// Alerts accepted by the sink
    pub alerts_delivered: u64,
    /// Alerts rejected by the sink or abandoned
    pub alerts_failed: u64,
}

impl EngineStats {
    fn record(&mut self, summary: &EventSummary) {
        self.events_received += 1;
        if summary.skipped {
            self.events_skipped += 1;
        }
        if summary.lookup_failed {
            self.failures += 1;
        }
        self.spends_applied += summary.applied as u64;
        self.duplicates += summary.duplicates as u64;
        self.failures += summary.failed as u64;
        self.alerts_delivered += summary.alerts_delivered as u64;
        self.alerts_failed += summary.alerts_failed as u64;
    }
}

/// Final report of a finished processing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the loop exited
    pub reason: StopReason,
    /// Counters at exit
    pub stats: EngineStats,
}

/// Single-consumer budget tracking engine.
pub struct BudgetTrackingEngine {
    updater: BudgetUpdater,
    inbound: Mutex<Option<mpsc::Receiver<TransactionEvent>>>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<EngineState>>,
    task: AsyncMutex<Option<JoinHandle<RunSummary>>>,
    summary: OnceLock<RunSummary>,
}

impl BudgetTrackingEngine {
    /// Creates an idle engine that will consume `inbound` once started.
    #[must_use]
    pub fn new(inbound: mpsc::Receiver<TransactionEvent>, ctx: EngineContext) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        let cancel = ctx.cancel_token().child_token();
        Self {
            updater: BudgetUpdater::new(ctx.with_cancellation(cancel.clone())),
            inbound: Mutex::new(Some(inbound)),
            cancel,
            state: Arc::new(state),
            task: AsyncMutex::new(None),
            summary: OnceLock::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Spawns the processing loop. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`Error::Engine`] if the engine was already started or stopped.
    pub fn start(&self) -> Result<()> {
        // Held across the transition so a concurrent stop() joins the task spawned here
        let mut task = self
            .task
            .try_lock()
            .map_err(|_| engine_error("engine is being stopped"))?;

        let inbound = self
            .inbound
            .lock()
            .map_err(|_| engine_error("inbound lock poisoned"))?
            .take()
            .ok_or_else(|| engine_error("engine was already started"))?;

        let started = self.state.send_if_modified(|state| {
            if *state == EngineState::Idle {
                *state = EngineState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(engine_error("engine is no longer idle"));
        }

        *task = Some(tokio::spawn(consume(
            self.updater.clone(),
            inbound,
            self.cancel.clone(),
            Arc::clone(&self.state),
        )));
        Ok(())
    }

    /// Requests shutdown and waits for the loop to exit.
    ///
    /// Safe to call concurrently and more than once; every caller returns after the loop has
    /// finished. Returns the run summary, or `None` if the engine was never started.
    ///
    /// # Errors
    /// [`Error::Engine`] if the consumer task panicked.
    pub async fn stop(&self) -> Result<Option<RunSummary>> {
        info!("Budget tracking engine stopping...");
        self.cancel.cancel();
        self.state.send_if_modified(|state| match *state {
            EngineState::Idle => {
                *state = EngineState::Stopped;
                true
            }
            EngineState::Running => {
                *state = EngineState::Draining;
                true
            }
            EngineState::Draining | EngineState::Stopped => false,
        });
        self.wait().await
    }

    /// Waits for the loop to exit on its own, i.e. for the inbound channel to close.
    ///
    /// Cancel-safe: dropping the future leaves the engine joinable by a later `stop()`.
    ///
    /// # Errors
    /// [`Error::Engine`] if the consumer task panicked.
    pub async fn wait(&self) -> Result<Option<RunSummary>> {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_mut() {
            let joined = handle.await;
            *task = None;
            let summary = joined.map_err(|e| {
                // The loop died before it could publish its final state
                self.state.send_replace(EngineState::Stopped);
                engine_error(&format!("consumer task failed: {e}"))
            })?;
            let _ = self.summary.set(summary);
        }
        Ok(self.summary.get().copied())
    }
}

impl std::fmt::Debug for BudgetTrackingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetTrackingEngine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn engine_error(message: &str) -> Error {
    Error::Engine {
        message: message.to_string(),
    }
}

async fn consume(
    updater: BudgetUpdater,
    mut inbound: mpsc::Receiver<TransactionEvent>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<EngineState>>,
) -> RunSummary {
    info!("Budget tracking engine started, listening for transaction events...");
    let mut stats = EngineStats::default();

    let reason = loop {
        let event = tokio::select! {
            // Checked first so nothing new starts once cancellation is observed
            biased;
            () = cancel.cancelled() => break StopReason::Cancelled,
            next = inbound.recv() => match next {
                Some(event) => event,
                None => break StopReason::UpstreamClosed,
            },
        };

        debug!(
            transaction_id = %event.id,
            user_id = %event.user_id,
            category_id = %event.category_id,
            amount = event.amount,
            "Received transaction event"
        );
        let summary = updater.apply(&event).await;
        stats.record(&summary);
    };

    match reason {
        StopReason::Cancelled => info!("Shutdown signal received, stopped consuming events"),
        StopReason::UpstreamClosed => info!("Transaction event channel closed, stopped consuming events"),
    }
    state.send_replace(EngineState::Stopped);
    info!(
        received = stats.events_received,
        applied = stats.spends_applied,
        duplicates = stats.duplicates,
        failures = stats.failures,
        "Budget tracking engine stopped"
    );

    RunSummary { reason, stats }
}
