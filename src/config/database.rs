//! Database configuration module for the budget tracker.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the composite primary key on `processed_transactions` that backs idempotent spend
//! updates always matches the Rust model.

use crate::entities::{Budget, ProcessedTransaction};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/budget_tracker.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns the
/// default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(&get_database_url())
        .await
        .map_err(Into::into)
}

/// Creates the `budgets` and `processed_transactions` tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut budget_table = schema.create_table_from_entity(Budget);
    let mut processed_table = schema.create_table_from_entity(ProcessedTransaction);

    budget_table.if_not_exists();
    processed_table.if_not_exists();

    db.execute(builder.build(&budget_table)).await?;
    db.execute(builder.build(&processed_table)).await?;

    Ok(())
}
