use serde::{Deserialize, Serialize};

use crate::{
    db_types::Donation,
    ledger::AppliedAdjustment,
};

/// Emitted exactly once per donation, by the call that moved it to `SUCCESS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationConfirmedEvent {
    pub donation: Donation,
    pub adjustments: Vec<AppliedAdjustment>,
}

impl DonationConfirmedEvent {
    pub fn new(donation: Donation, adjustments: Vec<AppliedAdjustment>) -> Self {
        Self { donation, adjustments }
    }
}

/// An administrative edit, status override or delete. `new_donation` is `None` for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationModifiedEvent {
    pub old_donation: Donation,
    pub new_donation: Option<Donation>,
}

impl DonationModifiedEvent {
    pub fn new(old_donation: Donation, new_donation: Option<Donation>) -> Self {
        Self { old_donation, new_donation }
    }

    pub fn is_delete(&self) -> bool {
        self.new_donation.is_none()
    }
}

/// A batch adjustment could not be applied because the batch no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateFlaggedEvent {
    pub donation: Donation,
    pub adjustment: AppliedAdjustment,
}

impl AggregateFlaggedEvent {
    pub fn new(donation: Donation, adjustment: AppliedAdjustment) -> Self {
        Self { donation, adjustment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    DonationConfirmed(DonationConfirmedEvent),
    DonationModified(DonationModifiedEvent),
    AggregateFlagged(AggregateFlaggedEvent),
}

