use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{Batch, Donation, DonationId, NewDonation, ReconciliationFlag},
    dps_api::donation_objects::DonationQueryFilter,
    traits::{BatchAudit, ConfirmResult, DonationChange, DonationReferences},
};

/// This trait defines the highest level of behaviour for backends supporting the donation engine.
///
/// This behaviour includes:
/// * Recording new donations, both pending payment intents and pre-settled manual entries.
/// * Settling donations exactly once, however many confirmation signals arrive.
/// * Guarded rewrites and deletes of donation rows, with the batch total adjustments applied atomically.
/// * Auditing and repairing the denormalized batch totals.
///
/// Implementations must apply every batch adjustment in the same transaction as the donation write that caused it.
/// An adjustment against a batch that no longer exists must not fail that transaction; it is recorded as a
/// [`ReconciliationFlag`] instead.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new donation in `PENDING` status. No batch total is touched.
    async fn insert_pending_donation(&self, donation: NewDonation) -> Result<Donation, LedgerError>;

    /// Stores a new donation directly in `SUCCESS` status, and increments the batch total (if any) in the same
    /// transaction. Used for staff-entered cash, bank and QR-reported donations.
    async fn insert_settled_donation(&self, donation: NewDonation) -> Result<DonationChange, LedgerError>;

    /// Replaces the transaction reference of a donation, e.g. once a QR object id has been issued.
    async fn update_transaction_id(&self, donation_id: &DonationId, transaction_id: &str)
        -> Result<Donation, LedgerError>;

    async fn fetch_donation(&self, donation_id: &DonationId) -> Result<Option<Donation>, LedgerError>;

    async fn fetch_donation_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Donation>, LedgerError>;

    /// Fetches donations according to the criteria in the filter, oldest first.
    async fn search_donations(&self, filter: DonationQueryFilter) -> Result<Vec<Donation>, LedgerError>;

    /// Moves a donation to `SUCCESS` if, and only if, it is not already `SUCCESS`.
    ///
    /// The status check and the write are a single conditional update, so concurrent callers cannot both succeed.
    /// When the write happens, `payment_id` (if given) replaces the transaction reference and the batch total is
    /// incremented in the same transaction. When the donation is already settled, nothing is written and
    /// [`ConfirmResult::AlreadySettled`] is returned.
    ///
    /// ## Failure modes:
    /// - [`LedgerError::DonationNotFound`] if there is no such donation.
    async fn confirm_success(
        &self,
        donation_id: &DonationId,
        payment_id: Option<&str>,
    ) -> Result<ConfirmResult, LedgerError>;

    /// Moves a `PENDING` donation to `FAILED`. Returns `None` if the donation was not pending. Failed donations never
    /// contribute to batch totals, so no adjustment is made.
    async fn mark_failed(&self, donation_id: &DonationId) -> Result<Option<Donation>, LedgerError>;

    /// Overwrites the mutable fields of `current` with those of `replacement`, provided the stored row version still
    /// matches `current.version`. The batch adjustments implied by the two contributions are applied in the same
    /// transaction.
    ///
    /// Returns `None` when the version check fails (the row changed, or was deleted, since `current` was read).
    async fn replace_donation(
        &self,
        current: &Donation,
        replacement: &Donation,
    ) -> Result<Option<DonationChange>, LedgerError>;

    /// Deletes `current`, provided the stored row version still matches, reversing any batch contribution in the
    /// same transaction. Returns `None` when the version check fails.
    async fn remove_donation(&self, current: &Donation) -> Result<Option<DonationChange>, LedgerError>;

    /// Checks that every foreign key in `refs` points at an existing record.
    ///
    /// ## Failure modes:
    /// - [`LedgerError::BatchNotFound`] for an unknown batch.
    /// - [`LedgerError::InvalidReference`] for any other unknown record.
    async fn check_references(&self, refs: &DonationReferences) -> Result<(), LedgerError>;

    async fn fetch_batch(&self, batch_id: i64) -> Result<Option<Batch>, LedgerError>;

    /// Recomputes every batch total from the ledger and reports it next to the stored total. Nothing is written.
    async fn audit_batch_totals(&self) -> Result<Vec<BatchAudit>, LedgerError>;

    /// Overwrites the stored total of one batch with the sum recomputed from the ledger, and marks any open
    /// reconciliation flags for the batch as resolved. Returns the audit as it stood before the repair.
    async fn repair_batch_total(&self, batch_id: i64) -> Result<BatchAudit, LedgerError>;

    async fn fetch_reconciliation_flags(&self, include_resolved: bool)
        -> Result<Vec<ReconciliationFlag>, LedgerError>;

    /// Fetches `PENDING` donations that were created more than `older_than` ago.
    async fn fetch_stale_pending(&self, older_than: Duration) -> Result<Vec<Donation>, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested donation {0} does not exist")]
    DonationNotFound(DonationId),
    #[error("The requested batch {0} does not exist")]
    BatchNotFound(i64),
    #[error("Invalid reference. {0}")]
    InvalidReference(String),
    #[error("A record with the same unique value already exists. {0}")]
    UniqueViolation(String),
    #[error("Invalid donation data. {0}")]
    ValidationError(String),
    #[error("The requested donation change would result in a no-op.")]
    ModificationNoOp,
    #[error("Donation {0} was modified concurrently. Please try again.")]
    ConcurrentModification(DonationId),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => LedgerError::UniqueViolation(db.to_string()),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                LedgerError::InvalidReference(db.to_string())
            },
            _ => LedgerError::DatabaseError(e.to_string()),
        }
    }
}
