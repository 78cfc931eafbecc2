use dps_common::Paise;
use log::*;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use super::flags;
use crate::{
    db_types::{Batch, DonationId},
    ledger::{AppliedAdjustment, BatchAdjustment},
    traits::BatchAudit,
};

const MISSING_BATCH: &str = "Batch does not exist";

/// Applies each adjustment to its batch total. An adjustment whose batch no longer exists is skipped and recorded in
/// `reconciliation_flags` instead; it never fails the surrounding transaction.
pub async fn apply_adjustments(
    donation_id: &DonationId,
    adjustments: Vec<BatchAdjustment>,
    conn: &mut SqliteConnection,
) -> Result<Vec<AppliedAdjustment>, sqlx::Error> {
    let mut result = Vec::with_capacity(adjustments.len());
    for adjustment in adjustments {
        result.push(apply_adjustment(donation_id, adjustment, conn).await?);
    }
    Ok(result)
}

async fn apply_adjustment(
    donation_id: &DonationId,
    adjustment: BatchAdjustment,
    conn: &mut SqliteConnection,
) -> Result<AppliedAdjustment, sqlx::Error> {
    let BatchAdjustment { batch_id, delta } = adjustment;
    let updated = sqlx::query(
        "UPDATE batches SET total_amount = total_amount + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(delta.value())
    .bind(batch_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    let applied = updated > 0;
    if applied {
        trace!("🗃️ Batch {batch_id} total adjusted by {delta} for donation {donation_id}");
    } else {
        warn!(
            "🗃️ Batch {batch_id} does not exist. The {delta} adjustment for donation {donation_id} was skipped and \
             flagged for reconciliation."
        );
        flags::insert_flag(donation_id, batch_id, delta, MISSING_BATCH, conn).await?;
    }
    Ok(AppliedAdjustment { batch_id, delta, applied })
}

pub async fn insert_batch(name: &str, slug: &str, conn: &mut SqliteConnection) -> Result<Batch, sqlx::Error> {
    sqlx::query_as("INSERT INTO batches (name, slug) VALUES ($1, $2) RETURNING *;")
        .bind(name)
        .bind(slug)
        .fetch_one(conn)
        .await
}

pub async fn delete_batch(batch_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM batches WHERE id = $1").bind(batch_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_batch(batch_id: i64, conn: &mut SqliteConnection) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM batches WHERE id = $1").bind(batch_id).fetch_optional(conn).await
}

pub async fn fetch_batch_by_slug(slug: &str, conn: &mut SqliteConnection) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM batches WHERE slug = $1").bind(slug).fetch_optional(conn).await
}

const AUDIT_SELECT: &str = r#"
    SELECT
        b.id AS batch_id,
        b.name AS name,
        b.total_amount AS recorded_total,
        COALESCE(
            (SELECT SUM(d.amount) FROM donations d WHERE d.batch_id = b.id AND d.payment_status = 'SUCCESS'),
            0
        ) AS ledger_total
    FROM batches b
"#;

fn audit_from_row(row: SqliteRow) -> Result<BatchAudit, sqlx::Error> {
    Ok(BatchAudit {
        batch_id: row.try_get("batch_id")?,
        name: row.try_get("name")?,
        recorded_total: Paise::from(row.try_get::<i64, _>("recorded_total")?),
        ledger_total: Paise::from(row.try_get::<i64, _>("ledger_total")?),
    })
}

pub async fn audit_batch_totals(conn: &mut SqliteConnection) -> Result<Vec<BatchAudit>, sqlx::Error> {
    let sql = format!("{AUDIT_SELECT} ORDER BY b.id ASC");
    let rows = sqlx::query(&sql).fetch_all(conn).await?;
    rows.into_iter().map(audit_from_row).collect()
}

pub async fn audit_batch(batch_id: i64, conn: &mut SqliteConnection) -> Result<Option<BatchAudit>, sqlx::Error> {
    let sql = format!("{AUDIT_SELECT} WHERE b.id = $1");
    let row = sqlx::query(&sql).bind(batch_id).fetch_optional(conn).await?;
    row.map(audit_from_row).transpose()
}

/// Takes the writer lock on the batch row before anything is read, so that the audit taken afterwards cannot be
/// invalidated by a concurrent donation write before the repair commits. Returns false if the batch doesn't exist.
pub async fn lock_batch(batch_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE batches SET updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(batch_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_batch_total(batch_id: i64, total: Paise, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE batches SET total_amount = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(total.value())
        .bind(batch_id)
        .execute(conn)
        .await?;
    Ok(())
}
