//! # Backend contracts
//!
//! This module defines the interfaces that donation ledger *backends* and payment processor integrations must
//! provide in order to be driven by the donation engine.
//!
//! * [`LedgerDatabase`] is the system of record for donations and batch running totals. Every write that can move a
//!   batch total is a single atomic operation on this trait.
//! * [`LedgerViews`] provides the read-only aggregate projections used by leaderboards and dashboards.
//! * [`PaymentProcessor`] abstracts the external payment processor (order creation, QR intents, payment lookups).
mod data_objects;
mod ledger_database;
mod ledger_views;
mod payment_processor;

pub use data_objects::{BatchAudit, ConfirmResult, DonationChange, DonationReferences};
pub use ledger_database::{LedgerDatabase, LedgerError};
pub use ledger_views::{CoordinatorStats, DonorTotal, LedgerViews, QueryError, TotalRow};
pub use payment_processor::{
    CapturedPayment,
    OrderRequest,
    PaymentHandle,
    PaymentProcessor,
    ProcessorError,
    ProcessorOrder,
    ProcessorQrCode,
    QrCodeRequest,
};
