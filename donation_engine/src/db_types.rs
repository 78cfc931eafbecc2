//! Data types shared by the ledger backends and the public API.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use dps_common::{Paise, DEFAULT_CURRENCY_CODE};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

fn random_suffix(len: usize) -> String {
    thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect::<String>().to_lowercase()
}

//--------------------------------------      DonationId      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct DonationId(pub String);

impl DonationId {
    /// Generates a new, random donation id.
    pub fn random() -> Self {
        Self(format!("don_{}", random_suffix(16)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DonationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DonationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for DonationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The transaction reference stored on a QR donation before the processor has issued a QR object id.
pub fn placeholder_qr_reference() -> String {
    format!("{QR_PLACEHOLDER_PREFIX}{}", random_suffix(12))
}

/// The transaction reference stored on a manual entry when staff don't supply one.
pub fn generated_manual_reference() -> String {
    format!("manual_{}", random_suffix(12))
}

pub const QR_PLACEHOLDER_PREFIX: &str = "qr_pending_";

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// A payment intent exists, but no outcome has been observed yet.
    Pending,
    /// The processor (or a staff member) has confirmed the funds. Only SUCCESS donations count towards totals.
    Success,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Success => write!(f, "SUCCESS"),
            PaymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    HostedCheckout,
    Qr,
    Cash,
    BankTransfer,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::HostedCheckout => write!(f, "HOSTED_CHECKOUT"),
            PaymentMethod::Qr => write!(f, "QR"),
            PaymentMethod::Cash => write!(f, "CASH"),
            PaymentMethod::BankTransfer => write!(f, "BANK_TRANSFER"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "HOSTED_CHECKOUT" | "CHECKOUT" | "ONLINE" => Ok(Self::HostedCheckout),
            "QR" | "UPI_QR" => Ok(Self::Qr),
            "CASH" => Ok(Self::Cash),
            "BANK_TRANSFER" | "BANK" => Ok(Self::BankTransfer),
            _ => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    DonationCategory   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DonationCategory {
    Batch,
    #[default]
    General,
    Parent,
}

impl Display for DonationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DonationCategory::Batch => write!(f, "BATCH"),
            DonationCategory::General => write!(f, "GENERAL"),
            DonationCategory::Parent => write!(f, "PARENT"),
        }
    }
}

impl FromStr for DonationCategory {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BATCH" => Ok(Self::Batch),
            "GENERAL" => Ok(Self::General),
            "PARENT" => Ok(Self::Parent),
            _ => Err(ConversionError(format!("Invalid donation category: {s}"))),
        }
    }
}

//--------------------------------------      Attribution      ---------------------------------------------------------
/// The geographic attribution of a donation. At most one level of the place hierarchy is ever recorded.
///
/// The textual form is the selection string used by donation forms: `"district-12"`, `"section-3"`, or a bare place id
/// such as `"57"`. The empty string means no attribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Attribution {
    #[default]
    None,
    Place(i64),
    District(i64),
    Section(i64),
}

impl Attribution {
    pub fn place_id(&self) -> Option<i64> {
        match self {
            Self::Place(id) => Some(*id),
            _ => None,
        }
    }

    pub fn district_id(&self) -> Option<i64> {
        match self {
            Self::District(id) => Some(*id),
            _ => None,
        }
    }

    pub fn section_id(&self) -> Option<i64> {
        match self {
            Self::Section(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Rebuilds the attribution from the three nullable ledger columns. More than one populated column is a
    /// corrupted row.
    pub fn from_columns(
        place_id: Option<i64>,
        district_id: Option<i64>,
        section_id: Option<i64>,
    ) -> Result<Self, ConversionError> {
        match (place_id, district_id, section_id) {
            (None, None, None) => Ok(Self::None),
            (Some(p), None, None) => Ok(Self::Place(p)),
            (None, Some(d), None) => Ok(Self::District(d)),
            (None, None, Some(s)) => Ok(Self::Section(s)),
            _ => Err(ConversionError(format!(
                "Ambiguous attribution: place={place_id:?}, district={district_id:?}, section={section_id:?}"
            ))),
        }
    }
}

impl Display for Attribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Place(id) => write!(f, "{id}"),
            Self::District(id) => write!(f, "district-{id}"),
            Self::Section(id) => write!(f, "section-{id}"),
        }
    }
}

impl FromStr for Attribution {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        let parse_id = |v: &str| {
            v.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| ConversionError(format!("Invalid location selection: {s}")))
        };
        let lower = s.to_ascii_lowercase();
        if let Some(id) = lower.strip_prefix("district-") {
            Ok(Self::District(parse_id(id)?))
        } else if let Some(id) = lower.strip_prefix("section-") {
            Ok(Self::Section(parse_id(id)?))
        } else if let Some(id) = lower.strip_prefix("place-") {
            Ok(Self::Place(parse_id(id)?))
        } else {
            Ok(Self::Place(parse_id(&lower)?))
        }
    }
}

impl TryFrom<String> for Attribution {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Attribution> for String {
    fn from(value: Attribution) -> Self {
        value.to_string()
    }
}

//--------------------------------------      Contribution     ---------------------------------------------------------
/// What a single donation adds to a batch total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub batch_id: i64,
    pub amount: Paise,
}

//--------------------------------------        Donation       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: i64,
    pub donation_id: DonationId,
    /// The processor order id, QR object id or payment id. Manual entries carry a staff reference.
    pub transaction_id: String,
    pub amount: Paise,
    pub currency: String,
    pub donor_name: Option<String>,
    pub mobile: Option<String>,
    pub hide_name: bool,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub category: DonationCategory,
    pub batch_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub attribution: Attribution,
    pub collected_by: Option<i64>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// A SUCCESS donation linked to a batch contributes its full amount to that batch. Nothing else does.
    pub fn contribution(&self) -> Option<Contribution> {
        match (self.payment_status, self.batch_id) {
            (PaymentStatus::Success, Some(batch_id)) => Some(Contribution { batch_id, amount: self.amount }),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.payment_status == PaymentStatus::Success
    }
}

fn decode_err<E: std::error::Error + Send + Sync + 'static>(column: &str, e: E) -> sqlx::Error {
    sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}

impl<'r> FromRow<'r, SqliteRow> for Donation {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let payment_method = row
            .try_get::<String, _>("payment_method")?
            .parse::<PaymentMethod>()
            .map_err(|e| decode_err("payment_method", e))?;
        let payment_status = row
            .try_get::<String, _>("payment_status")?
            .parse::<PaymentStatus>()
            .map_err(|e| decode_err("payment_status", e))?;
        let category =
            row.try_get::<String, _>("category")?.parse::<DonationCategory>().map_err(|e| decode_err("category", e))?;
        let attribution =
            Attribution::from_columns(row.try_get("place_id")?, row.try_get("district_id")?, row.try_get("section_id")?)
                .map_err(|e| decode_err("place_id", e))?;
        Ok(Self {
            id: row.try_get("id")?,
            donation_id: DonationId(row.try_get("donation_id")?),
            transaction_id: row.try_get("transaction_id")?,
            amount: Paise::from(row.try_get::<i64, _>("amount")?),
            currency: row.try_get("currency")?,
            donor_name: row.try_get("donor_name")?,
            mobile: row.try_get("mobile")?,
            hide_name: row.try_get("hide_name")?,
            payment_method,
            payment_status,
            category,
            batch_id: row.try_get("batch_id")?,
            unit_id: row.try_get("unit_id")?,
            attribution,
            collected_by: row.try_get("collected_by")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------      NewDonation      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDonation {
    pub donation_id: DonationId,
    pub transaction_id: String,
    pub amount: Paise,
    pub currency: String,
    pub donor_name: Option<String>,
    pub mobile: Option<String>,
    pub hide_name: bool,
    pub payment_method: PaymentMethod,
    pub category: DonationCategory,
    pub batch_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub attribution: Attribution,
    pub collected_by: Option<i64>,
}

impl NewDonation {
    pub fn new(donation_id: DonationId, transaction_id: String, amount: Paise, method: PaymentMethod) -> Self {
        Self {
            donation_id,
            transaction_id,
            amount,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            donor_name: None,
            mobile: None,
            hide_name: false,
            payment_method: method,
            category: DonationCategory::default(),
            batch_id: None,
            unit_id: None,
            attribution: Attribution::None,
            collected_by: None,
        }
    }

    pub fn with_batch(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self.category = DonationCategory::Batch;
        self
    }

    pub fn with_donor<S: Into<String>>(mut self, name: Option<S>, mobile: Option<S>, hide_name: bool) -> Self {
        self.donor_name = name.map(Into::into);
        self.mobile = mobile.map(Into::into);
        self.hide_name = hide_name;
        self
    }

    pub fn with_unit(mut self, unit_id: i64) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn with_category(mut self, category: DonationCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_collector(mut self, collector: Option<i64>) -> Self {
        self.collected_by = collector;
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

//--------------------------------------      BatchStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Active => write!(f, "Active"),
            BatchStatus::Completed => write!(f, "Completed"),
            BatchStatus::Archived => write!(f, "Archived"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "Archived" => Ok(Self::Archived),
            _ => Err(ConversionError(format!("Invalid batch status: {s}"))),
        }
    }
}

//--------------------------------------         Batch         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    /// Donor-facing referral identifier
    pub slug: String,
    pub status: BatchStatus,
    /// Running total of SUCCESS donations. Maintained incrementally.
    pub total_amount: Paise,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Batch {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status = row.try_get::<String, _>("status")?.parse::<BatchStatus>().map_err(|e| decode_err("status", e))?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            status,
            total_amount: Paise::from(row.try_get::<i64, _>("total_amount")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------    Reference data     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
    pub section_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub district_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Coordinator {
    pub id: i64,
    pub name: String,
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  ReconciliationFlag   ---------------------------------------------------------
/// A batch adjustment that could not be applied, recorded for operators to investigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationFlag {
    pub id: i64,
    pub donation_id: DonationId,
    pub batch_id: i64,
    pub delta: Paise,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, SqliteRow> for ReconciliationFlag {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            donation_id: DonationId(row.try_get("donation_id")?),
            batch_id: row.try_get("batch_id")?,
            delta: Paise::from(row.try_get::<i64, _>("delta")?),
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }
}

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coordinator,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coordinator" => Ok(Self::Coordinator),
            "admin" => Ok(Self::Admin),
            _ => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

pub type Roles = Vec<Role>;
