use dps_common::Paise;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{DonationId, QR_PLACEHOLDER_PREFIX};

/// The external payment processor, as seen by the donation engine.
///
/// Implementations live outside the engine (the server wires in a REST client). Every call that reaches the network
/// may fail with a [`ProcessorError`]; the engine decides whether that failure is surfaced or only logged.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// The public key id handed to donors' browsers to open the hosted checkout.
    fn key_id(&self) -> String;

    /// Creates a hosted-checkout order for the given amount.
    async fn create_order(&self, request: OrderRequest) -> Result<ProcessorOrder, ProcessorError>;

    /// Creates a single-use, fixed-amount UPI QR object.
    async fn create_qr_code(&self, request: QrCodeRequest) -> Result<ProcessorQrCode, ProcessorError>;

    /// Best-effort lookup of the `upi://pay?...` URI behind a QR image link. Never fails; `None` means the URI could
    /// not be determined.
    async fn resolve_payment_uri(&self, image_url: &str) -> Option<String>;

    /// Asks the processor whether a payment against `handle` has been captured. Returns the captured payment, if any.
    async fn fetch_captured_payment(&self, handle: &PaymentHandle) -> Result<Option<CapturedPayment>, ProcessorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub amount: Paise,
    pub currency: String,
    /// Merchant-side receipt reference. The donation id is used.
    pub receipt: String,
    pub donation_id: DonationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorOrder {
    pub id: String,
    pub amount: Paise,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeRequest {
    pub amount: Paise,
    pub donation_id: DonationId,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorQrCode {
    pub id: String,
    pub image_url: String,
    /// Some processors return the UPI intent URI directly. Otherwise it may be recovered from the image link.
    pub payment_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPayment {
    pub id: String,
    pub amount: Paise,
}

/// The kind of processor object a donation's transaction reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentHandle {
    Order(String),
    QrCode(String),
    Payment(String),
}

impl PaymentHandle {
    /// Classifies a stored transaction reference by its processor id prefix. Placeholders and manual references have
    /// nothing to ask the processor about, and yield `None`.
    pub fn from_transaction_id(transaction_id: &str) -> Option<Self> {
        let id = transaction_id.to_string();
        if transaction_id.starts_with(QR_PLACEHOLDER_PREFIX) {
            None
        } else if transaction_id.starts_with("order_") {
            Some(Self::Order(id))
        } else if transaction_id.starts_with("qr_") {
            Some(Self::QrCode(id))
        } else if transaction_id.starts_with("pay_") {
            Some(Self::Payment(id))
        } else {
            None
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Order(id) | Self::QrCode(id) | Self::Payment(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("Could not reach the payment processor. {0}")]
    Unavailable(String),
    #[error("The payment processor rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment processor returned an unexpected response. {0}")]
    InvalidResponse(String),
}
