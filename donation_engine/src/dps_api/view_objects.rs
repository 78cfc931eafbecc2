use dps_common::Paise;
use serde::{Deserialize, Serialize};

use crate::db_types::{BatchStatus, Batch};

/// Donors who asked for their name to be hidden, or gave none, are listed under this label.
pub const WELL_WISHER: &str = "Well Wisher";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position in the leaderboard
    pub rank: usize,
    /// The id of the grouped record. Donor leaderboards have none.
    pub id: Option<i64>,
    pub label: String,
    pub total: Paise,
    pub donations: i64,
}

/// Totals for one level of the place hierarchy, rolled up from the levels below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTotal {
    pub id: i64,
    pub name: String,
    /// Donations attributed to this region as a whole
    pub direct_total: Paise,
    /// Direct donations plus everything rolled up from child regions
    pub total: Paise,
    pub donations: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub status: BatchStatus,
    pub total_amount: Paise,
}

impl From<Batch> for BatchSummary {
    fn from(batch: Batch) -> Self {
        Self { id: batch.id, name: batch.name, slug: batch.slug, status: batch.status, total_amount: batch.total_amount }
    }
}
