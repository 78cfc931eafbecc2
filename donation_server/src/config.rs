use std::{env, io::Write};

use chrono::Duration;
use dps_common::{parse_boolean_flag, Secret, DEFAULT_CURRENCY_CODE};
use log::*;
use rand::{thread_rng, RngCore};
use razorpay_tools::RazorpayConfig;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_DPS_HOST: &str = "127.0.0.1";
const DEFAULT_DPS_PORT: u16 = 8460;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/donations.db";
const DEFAULT_STALE_PENDING_AGE: Duration = Duration::hours(24);
/// HS256 keys shorter than this are rejected.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub razorpay: RazorpayConfig,
    /// If false, webhook signatures are not checked. Only ever switch this off for local testing.
    pub hmac_checks: bool,
    /// Pending donations older than this are reported by the stale-pending worker.
    pub stale_pending_age: Duration,
    pub currency: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DPS_HOST.to_string(),
            port: DEFAULT_DPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            razorpay: RazorpayConfig::default(),
            hmac_checks: true,
            stale_pending_age: DEFAULT_STALE_PENDING_AGE,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DPS_HOST").ok().unwrap_or_else(|| DEFAULT_DPS_HOST.into());
        let port = env::var("DPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DPS_PORT. {e} Using the default, {DEFAULT_DPS_PORT}, instead."
                    );
                    DEFAULT_DPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DPS_PORT);
        let database_url = env::var("DPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ DPS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let razorpay = RazorpayConfig::new_from_env_or_default();
        let hmac_checks = parse_boolean_flag(env::var("DPS_RAZORPAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!(
                "🚨️ Webhook signature checks are DISABLED. Anyone can confirm donations. Never run production like \
                 this."
            );
        }
        if hmac_checks && !razorpay.has_webhook_secret() {
            error!("🚨️ DPS_RAZORPAY_WEBHOOK_SECRET is not set. All webhook deliveries will be rejected.");
        }
        let stale_pending_age = configure_stale_pending_age();
        let currency = env::var("DPS_CURRENCY")
            .ok()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or_else(|| {
                debug!("🪛️ DPS_CURRENCY is not set or invalid. Using {DEFAULT_CURRENCY_CODE}.");
                DEFAULT_CURRENCY_CODE.into()
            });
        Self { host, port, database_url, auth, razorpay, hmac_checks, stale_pending_age, currency }
    }
}

fn configure_stale_pending_age() -> Duration {
    env::var("DPS_STALE_PENDING_AGE")
        .map_err(|_| {
            info!(
                "🪛️ DPS_STALE_PENDING_AGE is not set. Using the default value of {} hrs.",
                DEFAULT_STALE_PENDING_AGE.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for DPS_STALE_PENDING_AGE. {e}"))
                .and_then(|h| {
                    if h > 0 {
                        Ok(Duration::hours(h))
                    } else {
                        warn!("🪛️ DPS_STALE_PENDING_AGE must be a positive number of hours, not {h}.");
                        Err(())
                    }
                })
        })
        .ok()
        .unwrap_or(DEFAULT_STALE_PENDING_AGE)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret used to sign and verify staff bearer tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since every issued token becomes invalid on restart. 🚨️🚨️🚨️"
        );
        let mut key = [0u8; 32];
        thread_rng().fill_bytes(&mut key);
        let secret = hex::encode(key);
        match &mut tmpfile {
            Some((f, p)) => match writeln!(f, "DPS_JWT_SECRET={secret}") {
                Ok(()) => warn!(
                    "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, you \
                     are doing it wrong! Set the DPS_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                    p.to_str().unwrap_or("???")
                ),
                Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Result<Self, ServerError> {
        let secret = secret.into();
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "The JWT secret must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("DPS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [DPS_JWT_SECRET]")))?;
        Self::new(secret.trim())
    }
}
