use dps_common::Paise;
use sqlx::SqliteConnection;

use crate::db_types::{DonationId, ReconciliationFlag};

pub async fn insert_flag(
    donation_id: &DonationId,
    batch_id: i64,
    delta: Paise,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationFlag, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO reconciliation_flags (donation_id, batch_id, delta, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(donation_id.as_str())
    .bind(batch_id)
    .bind(delta.value())
    .bind(reason)
    .fetch_one(conn)
    .await
}

pub async fn fetch_flags(
    include_resolved: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReconciliationFlag>, sqlx::Error> {
    let sql = if include_resolved {
        "SELECT * FROM reconciliation_flags ORDER BY id ASC"
    } else {
        "SELECT * FROM reconciliation_flags WHERE resolved_at IS NULL ORDER BY id ASC"
    };
    sqlx::query_as(sql).fetch_all(conn).await
}

/// Marks every open flag for the batch as resolved. Returns the number of flags closed.
pub async fn resolve_flags_for_batch(batch_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reconciliation_flags SET resolved_at = CURRENT_TIMESTAMP WHERE batch_id = $1 AND resolved_at IS NULL",
    )
    .bind(batch_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
