//! Budget entity - A user's spending ceiling for one category over one period.
//!
//! Thresholds are stored as a JSON array of fractions (e.g. `[0.5,0.8,1.0]`) and
//! `last_alerted_threshold` is the alert watermark, 0 when nothing was alerted yet.

use crate::{errors::Error, models};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier for the budget
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owner of the budget
    pub user_id: String,
    /// Spending category the budget tracks
    pub category_id: String,
    /// Inclusive start of the budget window
    pub period_start: DateTimeUtc,
    /// Inclusive end of the budget window
    pub period_end: DateTimeUtc,
    /// Spending ceiling, always positive
    pub spending_limit: f64,
    /// Spend accumulated from processed transactions
    pub current_spending: f64,
    /// JSON array of threshold fractions
    pub thresholds: String,
    /// Highest threshold fraction successfully alerted
    pub last_alerted_threshold: f64,
    /// When the budget was created
    pub created_at: DateTimeUtc,
    /// When spend or watermark last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Budget and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One budget has many processed-transaction markers
    #[sea_orm(has_many = "super::processed_transaction::Entity")]
    ProcessedTransactions,
}

impl Related<super::processed_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProcessedTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for models::Budget {
    type Error = Error;

    fn try_from(model: Model) -> std::result::Result<Self, Error> {
        let thresholds: Vec<f64> =
            serde_json::from_str(&model.thresholds).map_err(|e| Error::InvalidBudget {
                message: format!("budget {} has unreadable thresholds: {e}", model.id),
            })?;

        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            period_start: model.period_start,
            period_end: model.period_end,
            limit: model.spending_limit,
            current_spending: model.current_spending,
            thresholds,
            last_alerted_threshold: model.last_alerted_threshold,
        })
    }
}
