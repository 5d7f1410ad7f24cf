//! Alert sink contract and the adapters that implement it.

/// Sink that writes alerts to the `tracing` log
pub mod logging;

use crate::{errors::Result, models::BudgetAlert};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use logging::LoggingAlertSink;

/// Outbound channel for user-facing budget alerts (email, SMS, push, ...).
///
/// Delivery may fail transiently; the engine reports the failure and does not retry.
/// `cancel` fires when the engine is stopping; a sink blocked on the network should return
/// [`Error::Cancelled`](crate::errors::Error::Cancelled) instead of waiting out its timeout.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers one rendered alert.
    async fn send(&self, alert: &BudgetAlert, cancel: &CancellationToken) -> Result<()>;
}
