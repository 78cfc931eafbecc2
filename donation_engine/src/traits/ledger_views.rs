use dps_common::Paise;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use crate::db_types::{Batch, District, Place, Section};

/// Read-only aggregate projections over the donation ledger.
///
/// All totals count `SUCCESS` donations only. Each row carries `first_seen`, the ledger position of the earliest
/// donation in the group, so that callers can break ties in insertion order.
#[allow(async_fn_in_trait)]
pub trait LedgerViews {
    async fn batch_totals(&self) -> Result<Vec<TotalRow>, QueryError>;

    /// Totals grouped by donor name and mobile number, optionally restricted to a single batch.
    async fn donor_totals(&self, batch_id: Option<i64>) -> Result<Vec<DonorTotal>, QueryError>;

    async fn unit_totals(&self) -> Result<Vec<TotalRow>, QueryError>;

    async fn place_totals(&self) -> Result<Vec<TotalRow>, QueryError>;

    /// Totals of donations attributed to a district as a whole, rather than to one of its places.
    async fn direct_district_totals(&self) -> Result<Vec<TotalRow>, QueryError>;

    /// Totals of donations attributed to a section as a whole, rather than to one of its districts or places.
    async fn direct_section_totals(&self) -> Result<Vec<TotalRow>, QueryError>;

    async fn fetch_places(&self) -> Result<Vec<Place>, QueryError>;

    async fn fetch_districts(&self) -> Result<Vec<District>, QueryError>;

    async fn fetch_sections(&self) -> Result<Vec<Section>, QueryError>;

    async fn coordinator_stats(&self, coordinator_id: i64) -> Result<CoordinatorStats, QueryError>;

    async fn batch_by_slug(&self, slug: &str) -> Result<Option<Batch>, QueryError>;
}

/// One group in an aggregate query.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TotalRow {
    pub id: i64,
    pub label: String,
    pub total: Paise,
    pub count: i64,
    pub first_seen: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DonorTotal {
    pub donor_name: Option<String>,
    pub mobile: Option<String>,
    /// True if any donation in the group asked for the donor's name to be hidden
    pub hidden: bool,
    pub total: Paise,
    pub count: i64,
    pub first_seen: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub coordinator_id: i64,
    pub settled_count: i64,
    pub settled_total: Paise,
    pub pending_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("The requested record does not exist. {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(e: sqlx::Error) -> Self {
        QueryError::DatabaseError(e.to_string())
    }
}
