//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`;
//! the uniqueness constraints the engine relies on for race safety are created as
//! explicit indexes afterwards.

use crate::entities::{Account, Occasion, Order, Recipient};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/card_cadence.sqlite?mode=rwc";

/// Unique indexes backing the engine's idempotence and cardinality invariants.
///
/// `idx_orders_occasion_year` makes concurrent batch passes race-safe; the partial
/// index on `occasions` allows a single just-because occasion per recipient.
const UNIQUE_INDEXES: [&str; 2] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_occasion_year
        ON orders(occasion_id, target_year)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_occasions_one_just_because
        ON occasions(recipient_id)
        WHERE is_just_because = 1",
];

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables and unique indexes if they do not exist yet.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut account_table = schema.create_table_from_entity(Account);
    let mut recipient_table = schema.create_table_from_entity(Recipient);
    let mut occasion_table = schema.create_table_from_entity(Occasion);
    let mut order_table = schema.create_table_from_entity(Order);

    for table in [
        &mut account_table,
        &mut recipient_table,
        &mut occasion_table,
        &mut order_table,
    ] {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    for index in UNIQUE_INDEXES {
        db.execute_unprepared(index).await?;
    }

    info!("Database tables and unique indexes ensured");
    Ok(())
}
