use axum::extract::{Path, State};
use axum::Json;
use common_auth::ensure_self_or_admin;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use crate::auth_handlers::{hash_password, AuthResponse};
use crate::store::User;
use crate::tokens::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StubResponse {
    pub message: &'static str,
}

/// `GET /api/user/me` — the authenticated user, with roles read fresh.
pub async fn get_me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

/// `PUT /api/user/:id` — self or admin may update a profile. A new token is
/// issued because the identity inside the old one may no longer match.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<AuthResponse>> {
    ensure_self_or_admin(&auth.user.roles, auth.user.id, id).map_err(ApiError::from)?;

    let password_hash = match &request.password {
        Some(password) if !password.is_empty() => Some(hash_password(password)?),
        _ => None,
    };

    let user = state
        .tokens
        .store()
        .update_user(
            id,
            request.name.as_deref(),
            request.email.as_deref(),
            password_hash.as_deref(),
        )
        .await
        .map_err(|err| ApiError::internal(format!("unable to update user: {err}")))?;

    let token = state.tokens.issue(&user).await.map_err(|err| {
        error!(user_id = user.id, error = %err, "Failed to reissue token");
        ApiError::internal("unable to issue authentication token")
    })?;

    Ok(Json(AuthResponse { user, token }))
}

/// `DELETE /api/user/:id` — intentionally a stub.
pub async fn delete_user_stub(_auth: AuthUser, Path(_id): Path<i64>) -> Json<StubResponse> {
    Json(StubResponse {
        message: "not implemented",
    })
}

/// `GET /api/user` — intentionally a stub.
pub async fn list_users_stub(_auth: AuthUser) -> Json<Value> {
    Json(json!({
        "message": "not implemented",
        "users": [],
        "more": false,
    }))
}
