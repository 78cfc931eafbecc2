//! Donation Engine
//!
//! The donation engine records donations made through several payment channels, confirms them exactly once however
//! many confirmation signals arrive, and keeps each batch's running total consistent with the ledger.
//!
//! The library is divided into these sections:
//! 1. The ledger backend ([`mod@traits`] and [`mod@sqlite`]). The traits define what a ledger store must guarantee;
//!    SQLite is the supplied implementation. You should not normally call the backend directly. The data types in
//!    [`mod@db_types`] are public, though.
//! 2. The public API. [`ChannelApi`] creates donations, [`ConfirmationApi`] hosts the polling and notification
//!    listeners, [`ReconciliationApi`] owns status transitions, edits and audits, and [`ViewsApi`] serves the
//!    leaderboards and statistics.
//! 3. Batch total arithmetic ([`mod@ledger`]). Every change to a batch total is derived by one pure function.
//!
//! The engine also emits events when donations are confirmed, modified, or when a batch adjustment had to be flagged.
//! Subscribe to them through [`events::EventHooks`].
//!
//! The payment processor is abstracted behind [`traits::PaymentProcessor`], so the engine has no knowledge of any
//! particular provider.
pub mod db_types;
pub mod events;
pub mod ledger;
pub mod traits;

mod dps_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use dps_api::{
    channel_api::ChannelApi,
    confirmation_api::ConfirmationApi,
    donation_objects,
    errors::{ChannelError, ConfirmationError},
    reconciliation_api::{ReconciliationApi, MAX_WRITE_ATTEMPTS},
    view_objects,
    views_api::{rank_donors, rank_rows, ViewsApi},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{LedgerDatabase, LedgerError, LedgerViews, PaymentProcessor, QueryError};
