mod api;
mod config;
mod error;
mod helpers;

mod data_objects;
mod webhook;

pub use api::RazorpayApi;
pub use config::RazorpayConfig;
pub use data_objects::{Collection, NewOrder, NewQrCode, Notes, Order, Payment, PaymentState, QrCode};
pub use error::RazorpayApiError;
pub use helpers::{calculate_signature, extract_upi_uri, verify_signature};
pub use webhook::{EntityWrapper, WebhookEvent, WebhookPayload};
