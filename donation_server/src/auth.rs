//! Staff bearer tokens.
//!
//! Coordinators and administrators authenticate with an HS256-signed JWT in the `Authorization: Bearer` header. How
//! tokens are handed out is outside the server's concern; it only verifies them. Operators mint tokens with the
//! `donation_tools token` command, which uses the same [`TokenIssuer`].
//!
//! The claims carry the coordinator id (`sub`) and the roles granted. An `admin` may do everything a `coordinator` can.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::Duration;
use donation_engine::db_types::Role;
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    Header,
    TimeOptions,
    Token,
    UntrustedToken,
};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(12);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The coordinator id of the token holder
    pub sub: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub roles: Vec<Role>,
}

impl JwtClaims {
    pub fn new(sub: i64, roles: Vec<Role>) -> Self {
        Self { sub, name: None, roles }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role) || self.roles.contains(&Role::Admin)
    }

    pub fn has_roles(&self, required: &[Role]) -> bool {
        required.iter().all(|r| self.has_role(*r))
    }
}

/// Claims are placed in the request extensions by the JWT middleware. Use `Option<JwtClaims>` on routes where a
/// token is optional.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            trace!("🔐️ No verified claims found for {}", req.path());
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    key: Hs256Key,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: Hs256Key::new(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: JwtClaims, lifetime: Option<Duration>) -> Result<String, AuthError> {
        let header = Header::empty().with_token_type("JWT");
        let lifetime = lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let claims = Claims::new(claims).set_duration_and_issuance(&TimeOptions::default(), lifetime);
        let token = Hs256.token(&header, &claims, &self.key).map_err(|e| AuthError::CouldNotIssueToken(e.to_string()))?;
        debug!("🔐️ Issued access token for {} valid for {} minutes", claims.custom.sub, lifetime.num_minutes());
        Ok(token)
    }

    /// Checks the signature and expiry of a bearer token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let untrusted = UntrustedToken::new(token).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let token: Token<JwtClaims> = Hs256
            .validator::<JwtClaims>(&self.key)
            .validate(&untrusted)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        token
            .claims()
            .validate_expiration(&TimeOptions::default())
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        Ok(token.claims().custom.clone())
    }
}
