//! `SqliteDatabase` is the SQLite implementation of the donation ledger backend.
//!
//! Every write transaction starts with its guarded write (a conditional or version-checked `UPDATE`, an `INSERT`, or a
//! `DELETE`). SQLite hands out the writer lock at that first write, and the pool's busy timeout queues competing
//! writers behind it, so the checks and the batch adjustments that follow always see committed state.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{batches, db_url, donations, flags, new_pool, reference, views};
use crate::{
    db_types::{
        Batch,
        Coordinator,
        District,
        Donation,
        DonationId,
        NewDonation,
        PaymentStatus,
        Place,
        ReconciliationFlag,
        Section,
        Unit,
    },
    dps_api::donation_objects::DonationQueryFilter,
    ledger::ledger_delta,
    traits::{
        BatchAudit,
        ConfirmResult,
        CoordinatorStats,
        DonationChange,
        DonationReferences,
        DonorTotal,
        LedgerDatabase,
        LedgerError,
        LedgerViews,
        QueryError,
        TotalRow,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_pending_donation(&self, donation: NewDonation) -> Result<Donation, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::insert_donation(donation, PaymentStatus::Pending, &mut conn).await?;
        debug!("🗃️ Pending donation {} saved under {}", donation.donation_id, donation.transaction_id);
        Ok(donation)
    }

    async fn insert_settled_donation(&self, donation: NewDonation) -> Result<DonationChange, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let donation = donations::insert_donation(donation, PaymentStatus::Success, &mut tx).await?;
        let delta = ledger_delta(None, donation.contribution());
        let adjustments = batches::apply_adjustments(&donation.donation_id, delta, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Settled donation {} saved. {} batch adjustment(s)", donation.donation_id, adjustments.len());
        Ok(DonationChange { previous: None, current: Some(donation), adjustments })
    }

    async fn update_transaction_id(
        &self,
        donation_id: &DonationId,
        transaction_id: &str,
    ) -> Result<Donation, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::update_transaction_id(donation_id, transaction_id, &mut conn)
            .await?
            .ok_or_else(|| LedgerError::DonationNotFound(donation_id.clone()))?;
        debug!("🗃️ Donation {donation_id} now references {transaction_id}");
        Ok(donation)
    }

    async fn fetch_donation(&self, donation_id: &DonationId) -> Result<Option<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::fetch_donation(donation_id, &mut conn).await?;
        Ok(donation)
    }

    async fn fetch_donation_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::fetch_donation_by_transaction_id(transaction_id, &mut conn).await?;
        Ok(donation)
    }

    async fn search_donations(&self, filter: DonationQueryFilter) -> Result<Vec<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = donations::search_donations(filter, &mut conn).await?;
        Ok(result)
    }

    async fn confirm_success(
        &self,
        donation_id: &DonationId,
        payment_id: Option<&str>,
    ) -> Result<ConfirmResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        match donations::settle(donation_id, payment_id, &mut tx).await? {
            Some(donation) => {
                // The conditional update only matches non-SUCCESS rows, so there is no previous contribution
                let delta = ledger_delta(None, donation.contribution());
                let adjustments = batches::apply_adjustments(donation_id, delta, &mut tx).await?;
                tx.commit().await?;
                debug!("🗃️ Donation {donation_id} settled as {}", donation.transaction_id);
                Ok(ConfirmResult::Confirmed { donation, adjustments })
            },
            None => {
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                match donations::fetch_donation(donation_id, &mut conn).await? {
                    Some(donation) => Ok(ConfirmResult::AlreadySettled(donation)),
                    None => Err(LedgerError::DonationNotFound(donation_id.clone())),
                }
            },
        }
    }

    async fn mark_failed(&self, donation_id: &DonationId) -> Result<Option<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::mark_failed(donation_id, &mut conn).await?;
        Ok(donation)
    }

    async fn replace_donation(
        &self,
        current: &Donation,
        replacement: &Donation,
    ) -> Result<Option<DonationChange>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(updated) = donations::replace_donation(current, replacement, &mut tx).await? else {
            tx.rollback().await?;
            trace!("🗃️ Version {} of donation {} is stale", current.version, current.donation_id);
            return Ok(None);
        };
        let delta = ledger_delta(current.contribution(), updated.contribution());
        let adjustments = batches::apply_adjustments(&updated.donation_id, delta, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(DonationChange { previous: Some(current.clone()), current: Some(updated), adjustments }))
    }

    async fn remove_donation(&self, current: &Donation) -> Result<Option<DonationChange>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(deleted) = donations::delete_donation(current, &mut tx).await? else {
            tx.rollback().await?;
            trace!("🗃️ Version {} of donation {} is stale", current.version, current.donation_id);
            return Ok(None);
        };
        let delta = ledger_delta(deleted.contribution(), None);
        let adjustments = batches::apply_adjustments(&deleted.donation_id, delta, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(DonationChange { previous: Some(deleted), current: None, adjustments }))
    }

    async fn check_references(&self, refs: &DonationReferences) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        reference::check_references(refs, &mut conn).await
    }

    async fn fetch_batch(&self, batch_id: i64) -> Result<Option<Batch>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let batch = batches::fetch_batch(batch_id, &mut conn).await?;
        Ok(batch)
    }

    async fn audit_batch_totals(&self) -> Result<Vec<BatchAudit>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let audits = batches::audit_batch_totals(&mut conn).await?;
        Ok(audits)
    }

    async fn repair_batch_total(&self, batch_id: i64) -> Result<BatchAudit, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if !batches::lock_batch(batch_id, &mut tx).await? {
            tx.rollback().await?;
            return Err(LedgerError::BatchNotFound(batch_id));
        }
        let audit = batches::audit_batch(batch_id, &mut tx).await?.ok_or(LedgerError::BatchNotFound(batch_id))?;
        batches::set_batch_total(batch_id, audit.ledger_total, &mut tx).await?;
        let resolved = flags::resolve_flags_for_batch(batch_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Batch {batch_id} total set to {}. {resolved} flag(s) resolved", audit.ledger_total);
        Ok(audit)
    }

    async fn fetch_reconciliation_flags(&self, include_resolved: bool) -> Result<Vec<ReconciliationFlag>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let flags = flags::fetch_flags(include_resolved, &mut conn).await?;
        Ok(flags)
    }

    async fn fetch_stale_pending(&self, older_than: Duration) -> Result<Vec<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let cutoff = Utc::now() - older_than;
        let donations = donations::fetch_pending_before(cutoff, &mut conn).await?;
        Ok(donations)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl LedgerViews for SqliteDatabase {
    async fn batch_totals(&self) -> Result<Vec<TotalRow>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::batch_totals(&mut conn).await?)
    }

    async fn donor_totals(&self, batch_id: Option<i64>) -> Result<Vec<DonorTotal>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::donor_totals(batch_id, &mut conn).await?)
    }

    async fn unit_totals(&self) -> Result<Vec<TotalRow>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::unit_totals(&mut conn).await?)
    }

    async fn place_totals(&self) -> Result<Vec<TotalRow>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::place_totals(&mut conn).await?)
    }

    async fn direct_district_totals(&self) -> Result<Vec<TotalRow>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::direct_district_totals(&mut conn).await?)
    }

    async fn direct_section_totals(&self) -> Result<Vec<TotalRow>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::direct_section_totals(&mut conn).await?)
    }

    async fn fetch_places(&self) -> Result<Vec<Place>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::fetch_places(&mut conn).await?)
    }

    async fn fetch_districts(&self) -> Result<Vec<District>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::fetch_districts(&mut conn).await?)
    }

    async fn fetch_sections(&self) -> Result<Vec<Section>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::fetch_sections(&mut conn).await?)
    }

    async fn coordinator_stats(&self, coordinator_id: i64) -> Result<CoordinatorStats, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(views::coordinator_stats(coordinator_id, &mut conn).await?)
    }

    async fn batch_by_slug(&self, slug: &str) -> Result<Option<Batch>, QueryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(batches::fetch_batch_by_slug(slug, &mut conn).await?)
    }
}

/// Reference data management. Outside the ledger's core contract, but needed to set up batches and the place
/// hierarchy.
impl SqliteDatabase {
    /// Creates a new database API object using `DPS_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn create_batch(&self, name: &str, slug: &str) -> Result<Batch, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let batch = batches::insert_batch(name, slug, &mut conn).await?;
        debug!("🗃️ Batch '{name}' created with id {}", batch.id);
        Ok(batch)
    }

    /// Deletes a batch row. Donations keep their batch id; any later adjustment against it is flagged.
    pub async fn delete_batch(&self, batch_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = batches::delete_batch(batch_id, &mut conn).await?;
        if deleted {
            info!("🗃️ Batch {batch_id} deleted");
        }
        Ok(deleted)
    }

    pub async fn create_section(&self, name: &str) -> Result<Section, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::insert_section(name, &mut conn).await?)
    }

    pub async fn create_district(&self, name: &str, section_id: Option<i64>) -> Result<District, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::insert_district(name, section_id, &mut conn).await?)
    }

    pub async fn create_place(&self, name: &str, district_id: Option<i64>) -> Result<Place, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::insert_place(name, district_id, &mut conn).await?)
    }

    pub async fn create_unit(&self, name: &str) -> Result<Unit, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::insert_unit(name, &mut conn).await?)
    }

    pub async fn create_coordinator(&self, name: &str, mobile: Option<&str>) -> Result<Coordinator, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reference::insert_coordinator(name, mobile, &mut conn).await?)
    }
}
