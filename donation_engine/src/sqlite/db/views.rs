//! Aggregate queries over settled donations. `first_seen` is the smallest ledger id in each group, which is the
//! insertion order used to break ties.
use sqlx::SqliteConnection;

use crate::traits::{CoordinatorStats, DonorTotal, TotalRow};

pub async fn batch_totals(conn: &mut SqliteConnection) -> Result<Vec<TotalRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT b.id AS id, b.name AS label, SUM(d.amount) AS total, COUNT(d.id) AS count, MIN(d.id) AS first_seen
        FROM donations d JOIN batches b ON b.id = d.batch_id
        WHERE d.payment_status = 'SUCCESS'
        GROUP BY b.id, b.name
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn donor_totals(batch_id: Option<i64>, conn: &mut SqliteConnection) -> Result<Vec<DonorTotal>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            donor_name,
            mobile,
            MAX(hide_name) AS hidden,
            SUM(amount) AS total,
            COUNT(id) AS count,
            MIN(id) AS first_seen
        FROM donations
        WHERE payment_status = 'SUCCESS' AND ($1 IS NULL OR batch_id = $1)
        GROUP BY donor_name, mobile
        "#,
    )
    .bind(batch_id)
    .fetch_all(conn)
    .await
}

pub async fn unit_totals(conn: &mut SqliteConnection) -> Result<Vec<TotalRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT u.id AS id, u.name AS label, SUM(d.amount) AS total, COUNT(d.id) AS count, MIN(d.id) AS first_seen
        FROM donations d JOIN units u ON u.id = d.unit_id
        WHERE d.payment_status = 'SUCCESS'
        GROUP BY u.id, u.name
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn place_totals(conn: &mut SqliteConnection) -> Result<Vec<TotalRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT p.id AS id, p.name AS label, SUM(d.amount) AS total, COUNT(d.id) AS count, MIN(d.id) AS first_seen
        FROM donations d JOIN places p ON p.id = d.place_id
        WHERE d.payment_status = 'SUCCESS'
        GROUP BY p.id, p.name
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn direct_district_totals(conn: &mut SqliteConnection) -> Result<Vec<TotalRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT t.id AS id, t.name AS label, SUM(d.amount) AS total, COUNT(d.id) AS count, MIN(d.id) AS first_seen
        FROM donations d JOIN districts t ON t.id = d.district_id
        WHERE d.payment_status = 'SUCCESS'
        GROUP BY t.id, t.name
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn direct_section_totals(conn: &mut SqliteConnection) -> Result<Vec<TotalRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT s.id AS id, s.name AS label, SUM(d.amount) AS total, COUNT(d.id) AS count, MIN(d.id) AS first_seen
        FROM donations d JOIN sections s ON s.id = d.section_id
        WHERE d.payment_status = 'SUCCESS'
        GROUP BY s.id, s.name
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn coordinator_stats(coordinator_id: i64, conn: &mut SqliteConnection) -> Result<CoordinatorStats, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            $1 AS coordinator_id,
            COALESCE(SUM(CASE WHEN payment_status = 'SUCCESS' THEN 1 ELSE 0 END), 0) AS settled_count,
            COALESCE(SUM(CASE WHEN payment_status = 'SUCCESS' THEN amount ELSE 0 END), 0) AS settled_total,
            COALESCE(SUM(CASE WHEN payment_status = 'PENDING' THEN 1 ELSE 0 END), 0) AS pending_count
        FROM donations
        WHERE collected_by = $1
        "#,
    )
    .bind(coordinator_id)
    .fetch_one(conn)
    .await
}
