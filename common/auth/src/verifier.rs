use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::AuthResult;

/// Validates HS256 tokens signed with the service's shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    pub fn from_secret(config: JwtConfig, secret: &[u8]) -> Self {
        Self {
            config,
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &self.decoding_key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(subject = claims.subject, "verified JWT successfully");
        Ok(claims)
    }
}
