use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("token is not recognized")]
    UnknownToken,
    #[error("token has been revoked")]
    RevokedToken,
    #[error("token subject no longer exists")]
    UnknownSubject,
    #[error("credential store unavailable: {0}")]
    Store(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER")
            }
            AuthError::Verification(_) => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN"),
            // Revoked and never-issued tokens are deliberately indistinguishable
            // on the wire.
            AuthError::UnknownToken | AuthError::RevokedToken | AuthError::UnknownSubject => {
                (StatusCode::UNAUTHORIZED, "AUTH_TOKEN")
            }
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_CLAIMS")
            }
            AuthError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_STORE"),
        };

        let message = match &self {
            AuthError::UnknownToken | AuthError::RevokedToken | AuthError::UnknownSubject => {
                "unauthorized".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody { code, message };
        (status, Json(body)).into_response()
    }
}
