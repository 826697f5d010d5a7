use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of verified JWT claims.
///
/// Deliberately identity-only: role assignments are read fresh from the
/// credential store on every validation, never trusted from the token.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: i64,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    jti: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    iss: String,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let subject = value
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidClaim("sub", value.sub.clone()))?;
        let token_id = Uuid::parse_str(&value.jti)
            .map_err(|_| AuthError::InvalidClaim("jti", value.jti.clone()))?;

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            subject,
            token_id,
            expires_at,
            issued_at,
            issuer: value.iss,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}
