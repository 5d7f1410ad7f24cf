//! Entity module - SeaORM entity definitions backing the database budget store.
//! Each entity has a Model struct for data and an Entity struct for operations.

/// Budget table
pub mod budget;
/// Idempotency marker table
pub mod processed_transaction;

pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use processed_transaction::{
    Column as ProcessedTransactionColumn, Entity as ProcessedTransaction,
    Model as ProcessedTransactionModel,
};
