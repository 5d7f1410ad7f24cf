use super::AlertSink;
use crate::{errors::Result, models::BudgetAlert};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Writes every alert to the log instead of contacting the user. Used by the demo binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn send(&self, alert: &BudgetAlert, _cancel: &CancellationToken) -> Result<()> {
        info!(
            user_id = %alert.user_id,
            budget_id = %alert.budget_id,
            threshold_percent = alert.threshold * 100.0,
            "[ALERT] {}",
            alert.message
        );
        Ok(())
    }
}
