use std::sync::LazyLock;

use hmac::{Hmac, Mac};
use log::*;
use regex::Regex;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

static UPI_URI: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r#"upi://pay\?[^"'<>\s]+"#));

/// Razorpay signs webhook bodies with HMAC-SHA256 and sends the lower-case hex digest.
pub fn calculate_signature(secret: &str, data: &[u8]) -> String {
    keyed_mac(secret, data).map(|mac| hex::encode(mac.finalize().into_bytes())).unwrap_or_default()
}

/// Checks a hex-encoded signature against the body in constant time. Malformed hex is simply a mismatch, and nothing
/// verifies against an empty secret.
pub fn verify_signature(secret: &str, data: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        warn!("🔐️ No webhook secret is configured. Rejecting signature.");
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        trace!("🔐️ Signature is not valid hex");
        return false;
    };
    keyed_mac(secret, data).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

fn keyed_mac(secret: &str, data: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| error!("🔐️ Could not initialise the HMAC. {e}"))
        .ok()?;
    mac.update(data);
    Some(mac)
}

/// Pulls the first `upi://pay?...` intent URI out of a hosted QR page, undoing HTML entity escaping of `&`.
pub fn extract_upi_uri(html: &str) -> Option<String> {
    let re = UPI_URI.as_ref().ok()?;
    re.find(html).map(|m| m.as_str().replace("&amp;", "&"))
}
