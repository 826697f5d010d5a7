use anyhow::{anyhow, Context, Result};
use std::env;

/// Runtime configuration for the pizza service, loaded from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Shared secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    /// Issuer claim stamped into every token.
    pub jwt_issuer: String,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_seconds: i64,
    /// Pizza factory fulfillment endpoint; orders are reported here when set.
    pub factory_url: Option<String>,
    /// API key presented to the factory.
    pub factory_api_key: Option<String>,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    let jwt_secret = env::var("JWT_SECRET")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("JWT_SECRET must be set to a non-empty value"))?;

    let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "pizza-service".to_string());

    let token_ttl_seconds = match env::var("TOKEN_TTL_SECONDS") {
        Ok(value) => value
            .trim()
            .parse::<i64>()
            .context("Failed to parse TOKEN_TTL_SECONDS")?,
        Err(_) => 3600,
    };
    if token_ttl_seconds <= 0 {
        return Err(anyhow!("TOKEN_TTL_SECONDS must be positive"));
    }

    let factory_url = env::var("FACTORY_URL")
        .ok()
        .and_then(|value| normalize_optional(&value));
    let factory_api_key = env::var("FACTORY_API_KEY")
        .ok()
        .and_then(|value| normalize_optional(&value));

    Ok(ServiceConfig {
        jwt_secret,
        jwt_issuer,
        token_ttl_seconds,
        factory_url,
        factory_api_key,
    })
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
