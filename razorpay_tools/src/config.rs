use dps_common::Secret;
use log::*;

pub const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone, Default)]
pub struct RazorpayConfig {
    /// The public key id. Safe to hand to browsers.
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// The secret used to sign webhook bodies. Distinct from the API key secret.
    pub webhook_secret: Secret<String>,
    pub api_url: String,
}

impl RazorpayConfig {
    pub fn new_from_env_or_default() -> Self {
        let key_id = std::env::var("DPS_RAZORPAY_KEY_ID").unwrap_or_else(|_| {
            warn!("🪛️ DPS_RAZORPAY_KEY_ID not set, using (probably useless) default");
            "rzp_test_00000000000000".to_string()
        });
        let key_secret = Secret::new(std::env::var("DPS_RAZORPAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ DPS_RAZORPAY_KEY_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        // There is no default webhook secret. An empty secret verifies nothing.
        let webhook_secret = std::env::var("DPS_RAZORPAY_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        if webhook_secret.is_none() {
            warn!("🪛️ DPS_RAZORPAY_WEBHOOK_SECRET not set. Every signed webhook will be rejected.");
        }
        let webhook_secret = Secret::new(webhook_secret.unwrap_or_default());
        let api_url = std::env::var("DPS_RAZORPAY_API_URL").unwrap_or_else(|_| {
            debug!("🪛️ DPS_RAZORPAY_API_URL not set, using {DEFAULT_RAZORPAY_API_URL}");
            DEFAULT_RAZORPAY_API_URL.to_string()
        });
        Self { key_id, key_secret, webhook_secret, api_url: api_url.trim_end_matches('/').to_string() }
    }

    pub fn has_webhook_secret(&self) -> bool {
        !self.webhook_secret.reveal().is_empty()
    }
}
