//! # SQLite Database methods
//!
//! Low-level SQLite interactions for the donation ledger.
//!
//! Every function here accepts a `&mut SqliteConnection`. Callers obtain a connection from the pool, or open a
//! transaction and pass `&mut tx`, so that several of these calls commit or roll back together.
use std::{env, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod batches;
pub mod donations;
pub mod flags;
pub mod reference;
pub mod views;

const SQLITE_DB_URL: &str = "sqlite://data/donations.db";

pub fn db_url() -> String {
    let result = env::var("DPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ DPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a connection pool. Connections use WAL journaling and wait up to ten seconds for the writer lock, so
/// concurrent writers queue instead of failing.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Timestamps are stored in SQLite's `CURRENT_TIMESTAMP` format, so comparisons must use the same format.
pub(crate) fn sql_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
