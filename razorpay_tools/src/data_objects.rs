use std::{collections::HashMap, fmt::Display};

use dps_common::Paise;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Free-form key/value metadata attached to Razorpay entities.
pub type Notes = HashMap<String, String>;

/// Razorpay sends empty notes as `[]` and populated notes as an object. Non-string values are stringified.
pub(crate) fn notes_map<'de, D>(deserializer: D) -> Result<Notes, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let notes = match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect(),
        _ => Notes::new(),
    };
    Ok(notes)
}

//--------------------------------------         Orders        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub amount: Paise,
    pub currency: String,
    pub receipt: String,
    pub notes: Notes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: Paise,
    #[serde(default)]
    pub amount_paid: Paise,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default, deserialize_with = "notes_map")]
    pub notes: Notes,
    pub created_at: i64,
}

//--------------------------------------        QR codes       ---------------------------------------------------------
/// A single-use, fixed-amount UPI QR code request.
#[derive(Debug, Clone, Serialize)]
pub struct NewQrCode {
    #[serde(rename = "type")]
    pub qr_type: String,
    pub name: String,
    pub usage: String,
    pub fixed_amount: bool,
    pub payment_amount: Paise,
    pub description: String,
    pub notes: Notes,
}

impl NewQrCode {
    pub fn single_use_upi(name: &str, amount: Paise, description: &str, notes: Notes) -> Self {
        Self {
            qr_type: "upi_qr".into(),
            name: name.into(),
            usage: "single_use".into(),
            fixed_amount: true,
            payment_amount: amount,
            description: description.into(),
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCode {
    pub id: String,
    pub image_url: String,
    #[serde(default)]
    pub payment_amount: Option<Paise>,
    pub status: String,
    #[serde(default)]
    pub payments_amount_received: Paise,
    #[serde(default, deserialize_with = "notes_map")]
    pub notes: Notes,
    pub created_at: i64,
}

//--------------------------------------        Payments       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Created,
    Authorized,
    Captured,
    Refunded,
    Failed,
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Authorized => write!(f, "authorized"),
            Self::Captured => write!(f, "captured"),
            Self::Refunded => write!(f, "refunded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: Paise,
    pub currency: String,
    pub status: PaymentState,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub vpa: Option<String>,
    #[serde(default, deserialize_with = "notes_map")]
    pub notes: Notes,
    pub created_at: i64,
}

impl Payment {
    pub fn is_captured(&self) -> bool {
        self.status == PaymentState::Captured
    }
}

/// A page of results from a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl Collection<Payment> {
    /// The first captured payment in the collection, if any.
    pub fn captured(&self) -> Option<&Payment> {
        self.items.iter().find(|p| p.is_captured())
    }
}
