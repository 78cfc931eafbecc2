use anyhow::{anyhow, Result};
use chrono::Duration;
use donation_server::{
    auth::{JwtClaims, TokenIssuer},
    config::AuthConfig,
};

use crate::TokenParams;

pub fn print_jwt_token(params: TokenParams) -> Result<()> {
    let config = AuthConfig::try_from_env().map_err(|e| anyhow!("{e}"))?;
    let token = issue(&config, &params)?;
    let roles = params.roles.iter().map(|r| r.to_string()).collect::<Vec<String>>().join(",");
    println!("----------------------------- Access Token -----------------------------");
    println!("user: {}", params.user_id);
    println!("name: {}", params.name.as_deref().unwrap_or("(none)"));
    println!("roles: {roles}");
    println!("valid for: {} hours", params.hours);
    println!("token:\n{token}");
    println!("------------------------------------------------------------------------");
    Ok(())
}

fn issue(config: &AuthConfig, params: &TokenParams) -> Result<String> {
    if params.hours <= 0 {
        return Err(anyhow!("Token lifetime must be at least one hour"));
    }
    if params.roles.is_empty() {
        return Err(anyhow!("A token must grant at least one role"));
    }
    let mut claims = JwtClaims::new(params.user_id, params.roles.clone());
    if let Some(name) = &params.name {
        claims = claims.with_name(name);
    }
    let token = TokenIssuer::new(config).issue_token(claims, Some(Duration::hours(params.hours)))?;
    Ok(token)
}
