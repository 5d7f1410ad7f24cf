//! Unified error type for the budget tracker.
//!
//! Duplicate deliveries and upstream closure are not errors here: they are modelled as
//! [`ApplyOutcome::Duplicate`](crate::store::ApplyOutcome::Duplicate) and
//! [`StopReason::UpstreamClosed`](crate::core::consumer::StopReason::UpstreamClosed).

use thiserror::Error;

/// Errors raised by the engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Application configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Budget data violates its integrity rules (non-positive limit, malformed thresholds)
    #[error("Invalid budget configuration: {message}")]
    InvalidBudget {
        /// What is wrong with the budget
        message: String,
    },

    /// Budget does not exist in the store
    #[error("Budget not found: {budget_id}")]
    BudgetNotFound {
        /// Identifier that was looked up
        budget_id: String,
    },

    /// The budget store is unavailable or rejected the call
    #[error("Budget store error: {message}")]
    Store {
        /// Description reported by the store
        message: String,
    },

    /// The alert sink failed to deliver a notification
    #[error("Alert delivery failed: {message}")]
    AlertDelivery {
        /// Description reported by the sink
        message: String,
    },

    /// A collaborator call did not finish within the configured timeout
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Name of the call that expired
        operation: &'static str,
        /// Timeout that was applied
        after_ms: u128,
    },

    /// A collaborator gave up because the engine is shutting down
    #[error("{operation} cancelled")]
    Cancelled {
        /// Name of the call that was abandoned
        operation: &'static str,
    },

    /// Lifecycle misuse, such as starting an engine twice
    #[error("Engine error: {message}")]
    Engine {
        /// Description of the invalid transition
        message: String,
    },

    /// Error returned by the SeaORM connection
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Serializing or parsing JSON failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for failures that are budget data defects rather than transient faults.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidBudget { .. } | Self::Config { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
