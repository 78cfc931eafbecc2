use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use super::sql_timestamp;
use crate::{
    db_types::{Donation, DonationId, NewDonation, PaymentStatus},
    dps_api::donation_objects::DonationQueryFilter,
};

/// Inserts a new donation with the given status. Not atomic on its own; run it inside a transaction when batch totals
/// must move with it.
pub async fn insert_donation(
    donation: NewDonation,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Donation, sqlx::Error> {
    let donation: Donation = sqlx::query_as(
        r#"
            INSERT INTO donations (
                donation_id,
                transaction_id,
                amount,
                currency,
                donor_name,
                mobile,
                hide_name,
                payment_method,
                payment_status,
                category,
                batch_id,
                unit_id,
                place_id,
                district_id,
                section_id,
                collected_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *;
        "#,
    )
    .bind(donation.donation_id.as_str())
    .bind(donation.transaction_id)
    .bind(donation.amount.value())
    .bind(donation.currency)
    .bind(donation.donor_name)
    .bind(donation.mobile)
    .bind(donation.hide_name)
    .bind(donation.payment_method.to_string())
    .bind(status.to_string())
    .bind(donation.category.to_string())
    .bind(donation.batch_id)
    .bind(donation.unit_id)
    .bind(donation.attribution.place_id())
    .bind(donation.attribution.district_id())
    .bind(donation.attribution.section_id())
    .bind(donation.collected_by)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Donation {} inserted with id {}", donation.donation_id, donation.id);
    Ok(donation)
}

pub async fn fetch_donation(donation_id: &DonationId, conn: &mut SqliteConnection) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM donations WHERE donation_id = $1")
        .bind(donation_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_donation_by_transaction_id(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM donations WHERE transaction_id = $1").bind(transaction_id).fetch_optional(conn).await
}

/// Moves the donation to `SUCCESS` unless it already is. The status test is part of the `UPDATE`, so of any number
/// of concurrent callers exactly one gets a row back.
pub async fn settle(
    donation_id: &DonationId,
    payment_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE donations SET
                payment_status = 'SUCCESS',
                transaction_id = COALESCE($1, transaction_id),
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE donation_id = $2 AND payment_status <> 'SUCCESS'
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(donation_id.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn mark_failed(donation_id: &DonationId, conn: &mut SqliteConnection) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE donations SET
                payment_status = 'FAILED',
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE donation_id = $1 AND payment_status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(donation_id.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn update_transaction_id(
    donation_id: &DonationId,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE donations SET
                transaction_id = $1,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE donation_id = $2
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(donation_id.as_str())
    .fetch_optional(conn)
    .await
}

/// Overwrites every mutable column of `current` with the values in `replacement`, provided the stored version still
/// equals `current.version`. Returns `None` if it doesn't.
pub async fn replace_donation(
    current: &Donation,
    replacement: &Donation,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE donations SET
                transaction_id = $1,
                amount = $2,
                currency = $3,
                donor_name = $4,
                mobile = $5,
                hide_name = $6,
                payment_method = $7,
                payment_status = $8,
                category = $9,
                batch_id = $10,
                unit_id = $11,
                place_id = $12,
                district_id = $13,
                section_id = $14,
                collected_by = $15,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE donation_id = $16 AND version = $17
            RETURNING *;
        "#,
    )
    .bind(replacement.transaction_id.as_str())
    .bind(replacement.amount.value())
    .bind(replacement.currency.as_str())
    .bind(replacement.donor_name.as_deref())
    .bind(replacement.mobile.as_deref())
    .bind(replacement.hide_name)
    .bind(replacement.payment_method.to_string())
    .bind(replacement.payment_status.to_string())
    .bind(replacement.category.to_string())
    .bind(replacement.batch_id)
    .bind(replacement.unit_id)
    .bind(replacement.attribution.place_id())
    .bind(replacement.attribution.district_id())
    .bind(replacement.attribution.section_id())
    .bind(replacement.collected_by)
    .bind(current.donation_id.as_str())
    .bind(current.version)
    .fetch_optional(conn)
    .await
}

/// Deletes `current` if the stored version still equals `current.version`.
pub async fn delete_donation(current: &Donation, conn: &mut SqliteConnection) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as("DELETE FROM donations WHERE donation_id = $1 AND version = $2 RETURNING *;")
        .bind(current.donation_id.as_str())
        .bind(current.version)
        .fetch_optional(conn)
        .await
}

/// Fetches donations matching the filter, in the order they were recorded.
pub async fn search_donations(
    query: DonationQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Donation>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM donations ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(txid) = query.transaction_id {
        where_clause.push("transaction_id = ");
        where_clause.push_bind_unseparated(txid);
    }
    if let Some(status) = query.status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(batch_id) = query.batch_id {
        where_clause.push("batch_id = ");
        where_clause.push_bind_unseparated(batch_id);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method.to_string());
    }
    if let Some(collector) = query.collected_by {
        where_clause.push("collected_by = ");
        where_clause.push_bind_unseparated(collector);
    }
    if let Some(mobile) = query.mobile {
        where_clause.push("mobile = ");
        where_clause.push_bind_unseparated(mobile);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(sql_timestamp(&since));
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(sql_timestamp(&until));
    }
    builder.push(" ORDER BY id ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let donations = builder.build_query_as::<Donation>().fetch_all(conn).await?;
    trace!("🗃️ Donation search returned {} results", donations.len());
    Ok(donations)
}

/// `PENDING` donations created before `cutoff`, oldest first.
pub async fn fetch_pending_before(
    cutoff: chrono::DateTime<chrono::Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Donation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM donations WHERE payment_status = 'PENDING' AND created_at < $1 ORDER BY id ASC")
        .bind(sql_timestamp(&cutoff))
        .fetch_all(conn)
        .await
}
