//! Read-only projections over settled donations.
//!
//! Grouping and summing happen in the store. Ranking, relabelling of hidden donors and the roll-up of the place
//! hierarchy happen here.
use std::{collections::HashMap, fmt::Debug};

use dps_common::Paise;
use log::*;

use crate::{
    db_types::{District, Place, Section},
    dps_api::view_objects::{BatchSummary, LeaderboardEntry, RegionTotal, WELL_WISHER},
    traits::{CoordinatorStats, DonorTotal, LedgerViews, QueryError, TotalRow},
};

pub struct ViewsApi<B> {
    db: B,
}

impl<B> Debug for ViewsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ViewsApi")
    }
}

impl<B> ViewsApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ViewsApi<B>
where B: LedgerViews
{
    pub async fn batch_leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>, QueryError> {
        let rows = self.db.batch_totals().await?;
        Ok(truncate(rank_rows(rows), limit))
    }

    /// Donors grouped by name and mobile number, optionally within a single batch.
    pub async fn donor_leaderboard(
        &self,
        batch_id: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, QueryError> {
        let rows = self.db.donor_totals(batch_id).await?;
        Ok(truncate(rank_donors(rows), limit))
    }

    pub async fn unit_leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>, QueryError> {
        let rows = self.db.unit_totals().await?;
        Ok(truncate(rank_rows(rows), limit))
    }

    pub async fn place_leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>, QueryError> {
        let rows = self.db.place_totals().await?;
        Ok(truncate(rank_rows(rows), limit))
    }

    pub async fn district_totals(&self) -> Result<Vec<RegionTotal>, QueryError> {
        let places = self.db.fetch_places().await?;
        let districts = self.db.fetch_districts().await?;
        let place_totals = self.db.place_totals().await?;
        let direct = self.db.direct_district_totals().await?;
        Ok(roll_up_districts(&districts, &places, &place_totals, &direct))
    }

    pub async fn section_totals(&self) -> Result<Vec<RegionTotal>, QueryError> {
        let sections = self.db.fetch_sections().await?;
        let districts = self.db.fetch_districts().await?;
        let district_totals = self.district_totals().await?;
        let direct = self.db.direct_section_totals().await?;
        Ok(roll_up_sections(&sections, &districts, &district_totals, &direct))
    }

    pub async fn coordinator_stats(&self, coordinator_id: i64) -> Result<CoordinatorStats, QueryError> {
        self.db.coordinator_stats(coordinator_id).await
    }

    pub async fn batch_summary(&self, slug: &str) -> Result<BatchSummary, QueryError> {
        let batch = self.db.batch_by_slug(slug).await?.ok_or_else(|| {
            debug!("📊️ No batch with slug '{slug}'");
            QueryError::NotFound(format!("Batch '{slug}'"))
        })?;
        Ok(batch.into())
    }
}

fn truncate(mut entries: Vec<LeaderboardEntry>, limit: Option<usize>) -> Vec<LeaderboardEntry> {
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

/// Ranks totals in descending order. Equal totals keep the order in which their first donation was recorded.
pub fn rank_rows(mut rows: Vec<TotalRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| b.total.cmp(&a.total).then(a.first_seen.cmp(&b.first_seen)));
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i + 1,
            id: Some(row.id),
            label: row.label,
            total: row.total,
            donations: row.count,
        })
        .collect()
}

pub fn rank_donors(mut rows: Vec<DonorTotal>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| b.total.cmp(&a.total).then(a.first_seen.cmp(&b.first_seen)));
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i + 1,
            id: None,
            label: donor_label(&row),
            total: row.total,
            donations: row.count,
        })
        .collect()
}

fn donor_label(row: &DonorTotal) -> String {
    match &row.donor_name {
        Some(name) if !row.hidden && !name.trim().is_empty() => name.clone(),
        _ => WELL_WISHER.to_string(),
    }
}

/// District totals are the sum of their places' totals plus donations attributed to the district directly.
pub fn roll_up_districts(
    districts: &[District],
    places: &[Place],
    place_totals: &[TotalRow],
    direct: &[TotalRow],
) -> Vec<RegionTotal> {
    let mut regions = districts
        .iter()
        .map(|d| (d.id, RegionTotal::empty(d.id, &d.name)))
        .collect::<HashMap<i64, RegionTotal>>();
    let place_district = places.iter().filter_map(|p| p.district_id.map(|d| (p.id, d))).collect::<HashMap<_, _>>();
    for row in place_totals {
        match place_district.get(&row.id).and_then(|d| regions.get_mut(d)) {
            Some(region) => region.add(row.total, row.count),
            None => trace!("📊️ Place {} has no district. Its total is not rolled up.", row.id),
        }
    }
    for row in direct {
        if let Some(region) = regions.get_mut(&row.id) {
            region.add_direct(row.total, row.count);
        }
    }
    sorted(regions.into_values().collect())
}

/// Section totals are the sum of their districts' rolled-up totals plus donations attributed to the section directly.
pub fn roll_up_sections(
    sections: &[Section],
    districts: &[District],
    district_totals: &[RegionTotal],
    direct: &[TotalRow],
) -> Vec<RegionTotal> {
    let mut regions = sections
        .iter()
        .map(|s| (s.id, RegionTotal::empty(s.id, &s.name)))
        .collect::<HashMap<i64, RegionTotal>>();
    let district_section =
        districts.iter().filter_map(|d| d.section_id.map(|s| (d.id, s))).collect::<HashMap<_, _>>();
    for district in district_totals {
        if let Some(region) = district_section.get(&district.id).and_then(|s| regions.get_mut(s)) {
            region.add(district.total, district.donations);
        }
    }
    for row in direct {
        if let Some(region) = regions.get_mut(&row.id) {
            region.add_direct(row.total, row.count);
        }
    }
    sorted(regions.into_values().collect())
}

fn sorted(mut regions: Vec<RegionTotal>) -> Vec<RegionTotal> {
    regions.sort_by(|a, b| b.total.cmp(&a.total).then(a.id.cmp(&b.id)));
    regions
}

impl RegionTotal {
    fn empty(id: i64, name: &str) -> Self {
        Self { id, name: name.to_string(), direct_total: Paise::default(), total: Paise::default(), donations: 0 }
    }

    fn add(&mut self, amount: Paise, count: i64) {
        self.total += amount;
        self.donations += count;
    }

    fn add_direct(&mut self, amount: Paise, count: i64) {
        self.direct_total += amount;
        self.add(amount, count);
    }
}
