//! Processed-transaction entity - Idempotency markers for spend updates.
//!
//! One row per (`budget_id`, `transaction_id`) pair whose spend update has been committed.
//! The composite primary key is what makes a replayed transaction a no-op.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Processed-transaction marker model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "processed_transactions")]
pub struct Model {
    /// Budget the spend was applied to
    #[sea_orm(primary_key, auto_increment = false)]
    pub budget_id: String,
    /// Upstream transaction identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: String,
    /// When the spend update committed
    pub processed_at: DateTimeUtc,
}

/// Defines relationships between markers and budgets
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each marker belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id"
    )]
    Budget,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
