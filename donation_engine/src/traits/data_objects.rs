use dps_common::Paise;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Attribution, Donation},
    ledger::AppliedAdjustment,
};

/// The result of a settle attempt on a donation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmResult {
    /// This call moved the donation to SUCCESS and applied the batch adjustments.
    Confirmed { donation: Donation, adjustments: Vec<AppliedAdjustment> },
    /// The donation was already SUCCESS. Nothing was written.
    AlreadySettled(Donation),
}

impl ConfirmResult {
    pub fn donation(&self) -> &Donation {
        match self {
            Self::Confirmed { donation, .. } => donation,
            Self::AlreadySettled(donation) => donation,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// A committed change to a donation row, together with the batch adjustments made in the same transaction.
///
/// `previous` is `None` for inserts and `current` is `None` for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationChange {
    pub previous: Option<Donation>,
    pub current: Option<Donation>,
    pub adjustments: Vec<AppliedAdjustment>,
}

impl DonationChange {
    pub fn unapplied(&self) -> impl Iterator<Item = &AppliedAdjustment> {
        self.adjustments.iter().filter(|a| !a.applied)
    }
}

/// Foreign keys carried by a donation. Checked before any record is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonationReferences {
    pub batch_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub attribution: Attribution,
    pub collected_by: Option<i64>,
}

impl From<&Donation> for DonationReferences {
    fn from(d: &Donation) -> Self {
        Self { batch_id: d.batch_id, unit_id: d.unit_id, attribution: d.attribution, collected_by: d.collected_by }
    }
}

/// Compares the denormalized batch total against the sum recomputed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAudit {
    pub batch_id: i64,
    pub name: String,
    pub recorded_total: Paise,
    pub ledger_total: Paise,
}

impl BatchAudit {
    pub fn drift(&self) -> Paise {
        self.recorded_total - self.ledger_total
    }

    pub fn is_consistent(&self) -> bool {
        self.recorded_total == self.ledger_total
    }
}
