use thiserror::Error;

use crate::{
    db_types::DonationId,
    traits::{LedgerError, ProcessorError},
};

/// Errors raised by the payment channel adapters.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Invalid donation request. {0}")]
    ValidationError(String),
    #[error("Payment processor error. {0}")]
    ProcessorError(#[from] ProcessorError),
    #[error("{0}")]
    LedgerError(#[from] LedgerError),
}

/// Errors raised by the confirmation listeners.
#[derive(Debug, Clone, Error)]
pub enum ConfirmationError {
    #[error("Donation {0} does not exist")]
    DonationNotFound(DonationId),
    #[error("{0}")]
    LedgerError(#[from] LedgerError),
}
