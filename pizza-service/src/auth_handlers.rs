use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use common_auth::{AuthError, Role, RoleAssignment};
use common_http_errors::{ApiError, ApiResult};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::store::{StoreError, User};
use crate::tokens::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `POST /api/auth` — registers a new diner and issues a token.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (name, email, password) = match (request.name, request.email, request.password) {
        (Some(name), Some(email), Some(password))
            if !name.is_empty() && !email.is_empty() && !password.is_empty() =>
        {
            (name, email, password)
        }
        _ => {
            return Err(ApiError::bad_request(
                "missing_field",
                "name, email, and password are required",
            ))
        }
    };

    let password_hash = hash_password(&password)?;

    let user = state
        .tokens
        .store()
        .create_user(
            &name,
            &email,
            &password_hash,
            &[RoleAssignment::global(Role::Diner)],
        )
        .await
        .map_err(|err| {
            state.metrics.login_attempt("register_failure");
            registration_error(err)
        })?;

    let token = state.tokens.issue(&user).await.map_err(|err| {
        error!(user_id = user.id, error = %err, "Failed to issue token");
        ApiError::internal("unable to issue authentication token")
    })?;

    state.metrics.login_attempt("register_success");
    info!(user_id = user.id, "registered new diner");
    Ok(Json(AuthResponse { user, token }))
}

/// `PUT /api/auth` — login. Unknown email and wrong password are reported
/// identically (404 "unknown user") to avoid a user-enumeration asymmetry.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let credentials = state
        .tokens
        .store()
        .find_user_by_email(&request.email)
        .await
        .map_err(ApiError::internal)?;

    let Some(credentials) = credentials else {
        state.metrics.login_attempt("failure");
        return Err(unknown_user());
    };

    if !verify_password(&request.password, &credentials.password_hash) {
        state.metrics.login_attempt("failure");
        return Err(unknown_user());
    }

    let user = credentials.user;
    let token = state.tokens.issue(&user).await.map_err(|err| {
        error!(user_id = user.id, error = %err, "Failed to issue token");
        ApiError::internal("unable to issue authentication token")
    })?;

    state.metrics.login_attempt("success");
    Ok(Json(AuthResponse { user, token }))
}

/// `DELETE /api/auth` — revokes the presented token. A revoked token cannot
/// be used again; repeating the call yields 401.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    state.tokens.revoke(&auth.token).await?;
    Ok(Json(MessageResponse {
        message: "logout successful",
    }))
}

fn unknown_user() -> ApiError {
    ApiError::not_found("unknown_user", "unknown user")
}

fn registration_error(err: StoreError) -> ApiError {
    match err {
        // Duplicate email surfaces as a generic server error, matching the
        // behavior existing clients depend on.
        StoreError::Conflict(_) | StoreError::NotFound(_) => {
            ApiError::internal("unable to register user")
        }
        StoreError::Database(err) => ApiError::internal(err),
    }
}

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {err}")))
}

pub(crate) fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}
