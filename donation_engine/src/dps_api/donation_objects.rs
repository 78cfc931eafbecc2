use std::{fmt::Display, sync::LazyLock};

use chrono::{DateTime, Utc};
use dps_common::Paise;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    db_types::{Attribution, DonationCategory, DonationId, Donation, PaymentMethod, PaymentStatus},
    traits::LedgerError,
};

static MOBILE_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,13}$"));

/// Normalises a mobile number by dropping spaces and dashes, then checks that what's left looks like a phone number.
pub fn normalize_mobile(mobile: &str) -> Result<String, String> {
    let cleaned = mobile.chars().filter(|c| !c.is_whitespace() && *c != '-').collect::<String>();
    let pattern = MOBILE_PATTERN.as_ref().map_err(|e| e.to_string())?;
    if pattern.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(format!("'{mobile}' is not a valid mobile number"))
    }
}

//--------------------------------------      AmountInput      ---------------------------------------------------------
/// The largest single donation accepted from any channel (₹1 crore). Keeps batch totals far from `i64` overflow.
pub const MAX_DONATION_AMOUNT: Paise = Paise::from_rupees(1_00_00_000);

/// A rupee amount as submitted by a form: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    /// Converts the input to a strictly positive amount no larger than [`MAX_DONATION_AMOUNT`].
    pub fn to_paise(&self) -> Result<Paise, String> {
        let amount = match self {
            Self::Number(n) => Paise::try_from_rupees_f64(*n).map_err(|e| e.to_string())?,
            Self::Text(s) => s.parse::<Paise>().map_err(|e| e.to_string())?,
        };
        if !amount.is_positive() {
            return Err(format!("Donation amount must be positive, not {amount}"));
        }
        if amount > MAX_DONATION_AMOUNT {
            return Err(format!("Donation amount {amount} exceeds the limit of {MAX_DONATION_AMOUNT}"));
        }
        Ok(amount)
    }
}

impl From<Paise> for AmountInput {
    fn from(value: Paise) -> Self {
        Self::Text(format!("{}.{:02}", value.value() / 100, value.value().abs() % 100))
    }
}

//--------------------------------------      DonationForm     ---------------------------------------------------------
/// The donor-supplied part of every donation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationForm {
    pub amount: AmountInput,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub hide_name: bool,
    #[serde(default)]
    pub batch_id: Option<i64>,
    #[serde(default)]
    pub unit_id: Option<i64>,
    /// Location selection string: `district-<id>`, `section-<id>`, or a bare place id.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<DonationCategory>,
}

impl DonationForm {
    pub fn new(amount: AmountInput) -> Self {
        Self {
            amount,
            donor_name: None,
            mobile: None,
            hide_name: false,
            batch_id: None,
            unit_id: None,
            location: None,
            category: None,
        }
    }

    pub fn with_mobile<S: Into<String>>(mut self, mobile: S) -> Self {
        self.mobile = Some(mobile.into());
        self
    }

    pub fn with_donor_name<S: Into<String>>(mut self, name: S) -> Self {
        self.donor_name = Some(name.into());
        self
    }

    pub fn with_batch(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualDonationRequest {
    #[serde(flatten)]
    pub form: DonationForm,
    pub payment_method: PaymentMethod,
    /// Receipt number, bank reference or UPI reference supplied by staff
    #[serde(default)]
    pub reference: Option<String>,
}

//--------------------------------------     Channel results   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOrder {
    pub order_id: String,
    pub key_id: String,
    pub amount: Paise,
    pub currency: String,
    pub donation_id: DonationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrIntent {
    pub donation_id: DonationId,
    pub qr_id: String,
    pub image_url: String,
    pub payment_uri: Option<String>,
    pub amount: Paise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationStatusReport {
    pub donation_id: DonationId,
    pub status: PaymentStatus,
}

//--------------------------------------  ProcessorNotification  -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    PaymentCaptured,
    OrderPaid,
    QrCodeCredited,
    Other(String),
}

impl NotificationKind {
    pub fn confirms_payment(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaymentCaptured => write!(f, "payment.captured"),
            Self::OrderPaid => write!(f, "order.paid"),
            Self::QrCodeCredited => write!(f, "qr_code.credited"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A verified, processor-agnostic payment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorNotification {
    pub kind: NotificationKind,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub qr_code_id: Option<String>,
    /// Donation ids embedded in the notification's metadata, most authoritative first.
    pub donation_refs: Vec<DonationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookOutcome {
    Confirmed(DonationId),
    AlreadySettled(DonationId),
    UnknownDonation,
    Ignored(String),
}

//--------------------------------------   DonationQueryFilter  --------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DonationQueryFilter {
    pub transaction_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub batch_id: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub collected_by: Option<i64>,
    pub mobile: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl DonationQueryFilter {
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_batch_id(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_transaction_id<S: Into<String>>(mut self, transaction_id: S) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_collector(mut self, coordinator_id: i64) -> Self {
        self.collected_by = Some(coordinator_id);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_id.is_none()
            && self.status.is_none()
            && self.batch_id.is_none()
            && self.payment_method.is_none()
            && self.collected_by.is_none()
            && self.mobile.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }
}

impl Display for DonationQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(txid) = &self.transaction_id {
            write!(f, "transaction_id: {txid}. ")?;
        }
        if let Some(status) = &self.status {
            write!(f, "status: {status}. ")?;
        }
        if let Some(batch_id) = &self.batch_id {
            write!(f, "batch_id: {batch_id}. ")?;
        }
        if let Some(method) = &self.payment_method {
            write!(f, "method: {method}. ")?;
        }
        if let Some(collector) = &self.collected_by {
            write!(f, "collected_by: {collector}. ")?;
        }
        if self.mobile.is_some() {
            write!(f, "mobile: (set). ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------     DonationUpdate     --------------------------------------------------------
// Distinguishes an absent field (no change) from an explicit `null` (clear the value).
fn explicit_value<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// An administrative edit to a donation. Absent fields are left untouched. Nullable fields use `Some(None)` to clear
/// the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DonationUpdate {
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub donor_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub mobile: Option<Option<String>>,
    #[serde(default)]
    pub hide_name: Option<bool>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub category: Option<DonationCategory>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub batch_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub unit_id: Option<Option<i64>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub collected_by: Option<Option<i64>>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl DonationUpdate {
    pub fn with_amount(mut self, amount: Paise) -> Self {
        self.amount = Some(AmountInput::from(amount));
        self
    }

    pub fn with_batch(mut self, batch_id: Option<i64>) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_donor_name(mut self, name: Option<String>) -> Self {
        self.donor_name = Some(name);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.donor_name.is_none()
            && self.mobile.is_none()
            && self.hide_name.is_none()
            && self.payment_method.is_none()
            && self.payment_status.is_none()
            && self.category.is_none()
            && self.batch_id.is_none()
            && self.unit_id.is_none()
            && self.location.is_none()
            && self.collected_by.is_none()
            && self.transaction_id.is_none()
    }

    /// Produces the donation as it would look after this update. Input validation happens here; foreign keys are
    /// checked separately against the ledger.
    pub fn apply(&self, current: &Donation) -> Result<Donation, LedgerError> {
        let mut next = current.clone();
        if let Some(amount) = &self.amount {
            next.amount = amount.to_paise().map_err(LedgerError::ValidationError)?;
        }
        if let Some(name) = &self.donor_name {
            next.donor_name = name.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(mobile) = &self.mobile {
            next.mobile = match mobile {
                Some(m) => Some(normalize_mobile(m).map_err(LedgerError::ValidationError)?),
                None => None,
            };
        }
        if let Some(hide) = self.hide_name {
            next.hide_name = hide;
        }
        if let Some(method) = self.payment_method {
            next.payment_method = method;
        }
        if let Some(status) = self.payment_status {
            next.payment_status = status;
        }
        if let Some(category) = self.category {
            next.category = category;
        }
        if let Some(batch_id) = self.batch_id {
            next.batch_id = batch_id;
        }
        if let Some(unit_id) = self.unit_id {
            next.unit_id = unit_id;
        }
        if let Some(location) = &self.location {
            next.attribution =
                location.parse::<Attribution>().map_err(|e| LedgerError::ValidationError(e.to_string()))?;
        }
        if let Some(collector) = self.collected_by {
            next.collected_by = collector;
        }
        if let Some(txid) = &self.transaction_id {
            let txid = txid.trim();
            if txid.is_empty() {
                return Err(LedgerError::ValidationError("Transaction id cannot be empty".into()));
            }
            next.transaction_id = txid.to_string();
        }
        Ok(next)
    }
}
