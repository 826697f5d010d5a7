use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use common_auth::{AuthError, BearerToken, JwtConfig, JwtVerifier};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::ServiceMetrics;
use crate::store::{CredentialStore, User};

pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_seconds: i64,
}

/// Issues, validates, and revokes bearer tokens. Holds the credential store
/// explicitly so every validation re-reads the subject's current role set;
/// nothing about authorization is cached in the token itself.
pub struct TokenService {
    store: CredentialStore,
    verifier: JwtVerifier,
    encoding_key: EncodingKey,
    issuer: String,
    ttl_seconds: i64,
}

#[derive(Serialize)]
struct SignedClaims<'a> {
    sub: String,
    jti: String,
    iss: &'a str,
    iat: i64,
    exp: i64,
}

impl TokenService {
    pub fn new(store: CredentialStore, config: TokenConfig) -> Self {
        let verifier = JwtVerifier::from_secret(
            JwtConfig::new(config.issuer.clone()),
            config.secret.as_bytes(),
        );
        Self {
            store,
            verifier,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer,
            ttl_seconds: config.ttl_seconds,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Signs a token bound to the user's id and records its digest. The same
    /// user may hold any number of concurrently valid tokens.
    pub async fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = SignedClaims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: &self.issuer,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_seconds)).timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|err| anyhow!("Failed to sign token: {err}"))?;

        self.store
            .record_token(&hash_token(&token), user.id, now)
            .await
            .map_err(|err| anyhow!("Failed to persist token: {err}"))?;

        Ok(token)
    }

    /// Full validation: signature and expiry, revocation state, then a fresh
    /// read of the user so role changes apply on the very next request.
    pub async fn validate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.verifier.verify(token)?;

        let record = self
            .store
            .token_state(&hash_token(token))
            .await
            .map_err(|err| AuthError::Store(err.to_string()))?
            .ok_or(AuthError::UnknownToken)?;

        if record.revoked {
            return Err(AuthError::RevokedToken);
        }
        if record.user_id != claims.subject {
            return Err(AuthError::UnknownToken);
        }

        self.store
            .find_user_by_id(claims.subject)
            .await
            .map_err(|err| AuthError::Store(err.to_string()))?
            .ok_or(AuthError::UnknownSubject)
    }

    /// Idempotently marks a token revoked. Garbage values and never-issued
    /// tokens both fail identically; whether the token previously existed is
    /// not leaked.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        self.verifier.verify(token)?;

        let existed = self
            .store
            .revoke_token(&hash_token(token))
            .await
            .map_err(|err| AuthError::Store(err.to_string()))?;

        if existed {
            Ok(())
        } else {
            Err(AuthError::UnknownToken)
        }
    }
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Request guard: bearer parse, token validation, and the per-request role
/// re-read, yielding the freshly loaded user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenService>: FromRef<S>,
    Arc<ServiceMetrics>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);
        let metrics = Arc::<ServiceMetrics>::from_ref(state);
        let bearer = BearerToken::from_request_parts(parts, state).await?;
        let user = match tokens.validate(bearer.as_str()).await {
            Ok(user) => user,
            Err(err) => {
                metrics.token_validation("failure");
                return Err(err);
            }
        };
        metrics.token_validation("success");
        Ok(Self {
            user,
            token: bearer.into_inner(),
        })
    }
}
