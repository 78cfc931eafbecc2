//! # Donation engine public API
//!
//! The API is split by concern, and each part is generic over the backend traits it needs:
//!
//! * [`channel_api`] creates donations through the hosted-checkout, QR and manual channels.
//! * [`confirmation_api`] hosts the two confirmation listeners: status polling and processor notifications.
//! * [`reconciliation_api`] owns status transitions, administrative edits and deletes, and batch total audits.
//! * [`views_api`] provides the read-only leaderboards and statistics.
//!
//! ```rust,ignore
//! use donation_engine::{ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/donations.db", 5).await?;
//! let api = ReconciliationApi::new(db, EventProducers::default());
//! let audits = api.audit_batch_totals().await?;
//! ```
pub mod channel_api;
pub mod confirmation_api;
pub mod donation_objects;
pub mod errors;
pub mod reconciliation_api;
pub mod view_objects;
pub mod views_api;
