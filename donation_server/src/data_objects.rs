use donation_engine::{
    db_types::{DonationId, PaymentStatus},
    donation_objects::WebhookOutcome,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    pub batch_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOverride {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagParams {
    #[serde(default)]
    pub include_resolved: bool,
}

/// The acknowledgement sent back to the processor for every verified webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_id: Option<DonationId>,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        match outcome {
            WebhookOutcome::Confirmed(id) => Self { outcome: "confirmed".into(), donation_id: Some(id) },
            WebhookOutcome::AlreadySettled(id) => Self { outcome: "already_settled".into(), donation_id: Some(id) },
            WebhookOutcome::UnknownDonation => Self { outcome: "unknown_donation".into(), donation_id: None },
            WebhookOutcome::Ignored(event) => Self { outcome: format!("ignored {event}"), donation_id: None },
        }
    }
}
