//! Batch aggregate arithmetic.
//!
//! Every change to a batch running total is derived here, from the contribution a donation made *before* a change and
//! the contribution it makes *after* it. Confirmations, overrides, edits, batch moves, manual entries and deletes all
//! reduce to the same pair of optional contributions, so the aggregate can only move through [`ledger_delta`].
use dps_common::Paise;
use serde::{Deserialize, Serialize};

use crate::db_types::Contribution;

/// A signed change to one batch total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAdjustment {
    pub batch_id: i64,
    pub delta: Paise,
}

/// The outcome of applying a [`BatchAdjustment`] inside a ledger transaction. `applied` is false when the batch
/// no longer exists; such adjustments are flagged rather than failing the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub batch_id: i64,
    pub delta: Paise,
    pub applied: bool,
}

/// Computes the batch adjustments needed when a donation's contribution changes from `old` to `new`.
///
/// Zero deltas are dropped, and changes within the same batch are merged into a single adjustment.
pub fn ledger_delta(old: Option<Contribution>, new: Option<Contribution>) -> Vec<BatchAdjustment> {
    let adjustments = match (old, new) {
        (None, None) => vec![],
        (None, Some(n)) => vec![BatchAdjustment { batch_id: n.batch_id, delta: n.amount }],
        (Some(o), None) => vec![BatchAdjustment { batch_id: o.batch_id, delta: -o.amount }],
        (Some(o), Some(n)) if o.batch_id == n.batch_id => {
            vec![BatchAdjustment { batch_id: n.batch_id, delta: n.amount - o.amount }]
        },
        (Some(o), Some(n)) => vec![
            BatchAdjustment { batch_id: o.batch_id, delta: -o.amount },
            BatchAdjustment { batch_id: n.batch_id, delta: n.amount },
        ],
    };
    adjustments.into_iter().filter(|a| a.delta != Paise::default()).collect()
}
