use serde::{Deserialize, Serialize};

use crate::{Order, Payment, QrCode};

/// Metadata keys that carry our donation id on Razorpay entities.
const DONATION_ID_KEYS: [&str; 2] = ["donationId", "donation_id"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper<Payment>>,
    #[serde(default)]
    pub order: Option<EntityWrapper<Order>>,
    #[serde(default)]
    pub qr_code: Option<EntityWrapper<QrCode>>,
}

/// A webhook delivery from Razorpay, e.g. `payment.captured`, `order.paid` or `qr_code.credited`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub payload: WebhookPayload,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl WebhookEvent {
    pub fn payment(&self) -> Option<&Payment> {
        self.payload.payment.as_ref().map(|w| &w.entity)
    }

    pub fn order(&self) -> Option<&Order> {
        self.payload.order.as_ref().map(|w| &w.entity)
    }

    pub fn qr_code(&self) -> Option<&QrCode> {
        self.payload.qr_code.as_ref().map(|w| &w.entity)
    }

    pub fn payment_id(&self) -> Option<String> {
        self.payment().map(|p| p.id.clone())
    }

    pub fn order_id(&self) -> Option<String> {
        self.payment().and_then(|p| p.order_id.clone()).or_else(|| self.order().map(|o| o.id.clone()))
    }

    pub fn qr_code_id(&self) -> Option<String> {
        self.qr_code().map(|q| q.id.clone())
    }

    /// Donation ids found in entity notes: payment notes first, then the QR code's, then the order's.
    pub fn donation_refs(&self) -> Vec<String> {
        let notes = [self.payment().map(|p| &p.notes), self.qr_code().map(|q| &q.notes), self.order().map(|o| &o.notes)];
        let mut refs = Vec::new();
        for note in notes.into_iter().flatten() {
            for key in DONATION_ID_KEYS {
                if let Some(id) = note.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
                    if !refs.iter().any(|r| r == id) {
                        refs.push(id.to_string());
                    }
                }
            }
        }
        refs
    }
}
