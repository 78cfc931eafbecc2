//! `ReconciliationApi` owns every transition of a donation's status and every administrative change to a donation.
//!
//! Settling goes through [`ReconciliationApi::confirm_success`], which relies on the backend's conditional update, so
//! any number of concurrent confirmations of one donation produce exactly one batch increment. Overrides, edits and
//! deletes read the current row, compute the replacement with a pure function, and write it back with a version
//! check. A lost race re-reads and retries, a bounded number of times.
use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{Donation, DonationId, PaymentStatus, ReconciliationFlag},
    dps_api::donation_objects::{DonationQueryFilter, DonationUpdate},
    events::{AggregateFlaggedEvent, DonationConfirmedEvent, DonationModifiedEvent, EventProducers},
    ledger::AppliedAdjustment,
    traits::{BatchAudit, ConfirmResult, DonationChange, DonationReferences, LedgerDatabase, LedgerError},
};

/// How many times a guarded write is attempted before giving up with [`LedgerError::ConcurrentModification`].
pub const MAX_WRITE_ATTEMPTS: usize = 3;

pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> ReconciliationApi<B>
where B: LedgerDatabase
{
    /// Settles a donation. Safe to call any number of times, from any number of tasks or processes: only the call
    /// that actually moves the donation to `SUCCESS` applies the batch increment and emits a
    /// [`DonationConfirmedEvent`].
    ///
    /// `payment_id`, if given, replaces the stored transaction reference on that first, effective call.
    pub async fn confirm_success(
        &self,
        donation_id: &DonationId,
        payment_id: Option<&str>,
    ) -> Result<ConfirmResult, LedgerError> {
        trace!("🔄️✅️ Confirming donation {donation_id} (payment {payment_id:?})");
        let result = self.db.confirm_success(donation_id, payment_id).await?;
        match &result {
            ConfirmResult::Confirmed { donation, adjustments } => {
                info!(
                    "🔄️✅️ Donation {donation_id} of {} is now SUCCESS. Batch adjustments: {}",
                    donation.amount,
                    adjustments.len()
                );
                self.publish_flags(donation, adjustments).await;
                self.producers.publish_confirmed(DonationConfirmedEvent::new(donation.clone(), adjustments.clone())).await;
            },
            ConfirmResult::AlreadySettled(_) => {
                debug!("🔄️✅️ Donation {donation_id} was already settled. Nothing to do.");
            },
        }
        Ok(result)
    }

    /// Marks a `PENDING` donation as `FAILED`.
    ///
    /// ## Failure modes:
    /// - [`LedgerError::DonationNotFound`] if the donation doesn't exist.
    /// - [`LedgerError::ModificationNoOp`] if the donation is not pending.
    pub async fn mark_failed(&self, donation_id: &DonationId) -> Result<Donation, LedgerError> {
        match self.db.mark_failed(donation_id).await? {
            Some(donation) => {
                info!("🔄️❌️ Donation {donation_id} marked as FAILED");
                Ok(donation)
            },
            None => match self.db.fetch_donation(donation_id).await? {
                Some(d) => {
                    debug!("🔄️❌️ Donation {donation_id} is {} and cannot be marked as failed", d.payment_status);
                    Err(LedgerError::ModificationNoOp)
                },
                None => Err(LedgerError::DonationNotFound(donation_id.clone())),
            },
        }
    }

    /// Forces a donation into `status`, whatever its current state. The batch adjustment is computed from the stored
    /// status at the moment of the write, so repeated toggling never double-counts.
    pub async fn override_status(
        &self,
        donation_id: &DonationId,
        status: PaymentStatus,
    ) -> Result<DonationChange, LedgerError> {
        info!("🔄️🛠️ Overriding status of donation {donation_id} to {status}");
        self.modify_donation(donation_id, |current| {
            if current.payment_status == status {
                return Err(LedgerError::ModificationNoOp);
            }
            let mut next = current.clone();
            next.payment_status = status;
            Ok(next)
        })
        .await
    }

    /// Applies an administrative edit. Amount and batch changes on a settled donation move the batch totals by the
    /// difference in contribution, in the same transaction as the edit.
    pub async fn edit_donation(
        &self,
        donation_id: &DonationId,
        update: DonationUpdate,
    ) -> Result<DonationChange, LedgerError> {
        if update.is_empty() {
            return Err(LedgerError::ModificationNoOp);
        }
        info!("🔄️🛠️ Editing donation {donation_id}");
        self.modify_donation(donation_id, |current| update.apply(current)).await
    }

    /// Deletes a donation, reversing its batch contribution in the same transaction.
    pub async fn delete_donation(&self, donation_id: &DonationId) -> Result<DonationChange, LedgerError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.fetch_existing(donation_id).await?;
            match self.db.remove_donation(&current).await? {
                Some(change) => {
                    info!("🔄️🗑️ Donation {donation_id} deleted ({}, {})", current.amount, current.payment_status);
                    self.publish_change(&current, &change).await;
                    return Ok(change);
                },
                None => debug!("🔄️🗑️ Donation {donation_id} changed while deleting it (attempt {attempt})"),
            }
        }
        warn!("🔄️🗑️ Gave up deleting donation {donation_id} after {MAX_WRITE_ATTEMPTS} attempts");
        Err(LedgerError::ConcurrentModification(donation_id.clone()))
    }

    async fn modify_donation<F>(&self, donation_id: &DonationId, transform: F) -> Result<DonationChange, LedgerError>
    where F: Fn(&Donation) -> Result<Donation, LedgerError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.fetch_existing(donation_id).await?;
            let next = transform(&current)?;
            if next == current {
                return Err(LedgerError::ModificationNoOp);
            }
            self.db.check_references(&changed_references(&current, &next)).await?;
            match self.db.replace_donation(&current, &next).await? {
                Some(change) => {
                    debug!(
                        "🔄️🛠️ Donation {donation_id} updated to version {}. {} batch adjustment(s)",
                        current.version + 1,
                        change.adjustments.len()
                    );
                    self.publish_change(&current, &change).await;
                    return Ok(change);
                },
                None => debug!("🔄️🛠️ Donation {donation_id} changed underneath us (attempt {attempt}). Retrying."),
            }
        }
        warn!("🔄️🛠️ Gave up modifying donation {donation_id} after {MAX_WRITE_ATTEMPTS} attempts");
        Err(LedgerError::ConcurrentModification(donation_id.clone()))
    }

    async fn fetch_existing(&self, donation_id: &DonationId) -> Result<Donation, LedgerError> {
        self.db.fetch_donation(donation_id).await?.ok_or_else(|| LedgerError::DonationNotFound(donation_id.clone()))
    }

    pub async fn fetch_donation(&self, donation_id: &DonationId) -> Result<Donation, LedgerError> {
        self.fetch_existing(donation_id).await
    }

    pub async fn search_donations(&self, filter: DonationQueryFilter) -> Result<Vec<Donation>, LedgerError> {
        trace!("🔄️🔍️ Searching donations. {filter}");
        self.db.search_donations(filter).await
    }

    /// Compares every stored batch total with the sum recomputed from the ledger. Read-only.
    pub async fn audit_batch_totals(&self) -> Result<Vec<BatchAudit>, LedgerError> {
        let audits = self.db.audit_batch_totals().await?;
        let drifted = audits.iter().filter(|a| !a.is_consistent()).count();
        if drifted > 0 {
            warn!("🔄️🧮️ {drifted} of {} batch totals disagree with the ledger", audits.len());
        } else {
            debug!("🔄️🧮️ All {} batch totals agree with the ledger", audits.len());
        }
        Ok(audits)
    }

    /// Overwrites a batch total with the recomputed ledger sum. Returns the audit as it stood before the repair.
    pub async fn repair_batch_total(&self, batch_id: i64) -> Result<BatchAudit, LedgerError> {
        let audit = self.db.repair_batch_total(batch_id).await?;
        if audit.is_consistent() {
            debug!("🔄️🧮️ Batch {batch_id} total was already correct ({})", audit.ledger_total);
        } else {
            info!(
                "🔄️🧮️ Batch {batch_id} total repaired: {} -> {} (drift {})",
                audit.recorded_total,
                audit.ledger_total,
                audit.drift()
            );
        }
        Ok(audit)
    }

    /// Repairs every batch whose total has drifted. Returns the pre-repair audits of the batches that were touched.
    pub async fn repair_all(&self) -> Result<Vec<BatchAudit>, LedgerError> {
        let mut repaired = Vec::new();
        for audit in self.db.audit_batch_totals().await?.into_iter().filter(|a| !a.is_consistent()) {
            repaired.push(self.repair_batch_total(audit.batch_id).await?);
        }
        Ok(repaired)
    }

    pub async fn reconciliation_flags(&self, include_resolved: bool) -> Result<Vec<ReconciliationFlag>, LedgerError> {
        self.db.fetch_reconciliation_flags(include_resolved).await
    }

    /// `PENDING` donations older than `older_than`. They are never expired automatically.
    pub async fn stale_pending(&self, older_than: Duration) -> Result<Vec<Donation>, LedgerError> {
        self.db.fetch_stale_pending(older_than).await
    }

    async fn publish_change(&self, previous: &Donation, change: &DonationChange) {
        let subject = change.current.as_ref().unwrap_or(previous);
        self.publish_flags(subject, &change.adjustments).await;
        self.producers.publish_modified(DonationModifiedEvent::new(previous.clone(), change.current.clone())).await;
    }

    async fn publish_flags(&self, donation: &Donation, adjustments: &[AppliedAdjustment]) {
        for adjustment in adjustments.iter().filter(|a| !a.applied) {
            self.producers.publish_flagged(AggregateFlaggedEvent::new(donation.clone(), *adjustment)).await;
        }
    }
}

/// The references in `next` that differ from `current`. Only those need checking; an unchanged reference to a
/// since-deleted batch must not block an unrelated edit.
fn changed_references(current: &Donation, next: &Donation) -> DonationReferences {
    fn changed<T: PartialEq + Copy>(old: T, new: T) -> Option<T> {
        (old != new).then_some(new)
    }
    DonationReferences {
        batch_id: changed(current.batch_id, next.batch_id).flatten(),
        unit_id: changed(current.unit_id, next.unit_id).flatten(),
        attribution: changed(current.attribution, next.attribution).unwrap_or_default(),
        collected_by: changed(current.collected_by, next.collected_by).flatten(),
    }
}
