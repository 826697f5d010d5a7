use axum::extract::{Path, Query, State};
use axum::Json;
use common_auth::{ensure_admin, ensure_franchise_admin, Role};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{Franchise, Store, StoreError};
use crate::tokens::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminRef {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFranchiseRequest {
    pub name: String,
    #[serde(default)]
    pub admins: Vec<AdminRef>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub name: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FranchiseList {
    pub franchises: Vec<Franchise>,
    pub more: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `POST /api/franchise` — admin only.
pub async fn create_franchise(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateFranchiseRequest>,
) -> ApiResult<Json<Franchise>> {
    ensure_admin(&auth.user.roles).map_err(ApiError::from)?;

    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request(
            "missing_field",
            "franchise name is required",
        ));
    }

    let emails: Vec<String> = request.admins.into_iter().map(|a| a.email).collect();
    let franchise = state
        .tokens
        .store()
        .create_franchise(request.name.trim(), &emails)
        .await
        .map_err(|err| match err {
            // Duplicate names and unknown admin emails both surface as the
            // generic server error existing clients expect.
            StoreError::Conflict(_) | StoreError::NotFound(_) => {
                warn!(error = %err, "franchise creation rejected");
                ApiError::internal("unable to create a new franchise")
            }
            StoreError::Database(err) => ApiError::internal(err),
        })?;

    info!(franchise_id = franchise.id, "created franchise");
    Ok(Json(franchise))
}

/// `GET /api/franchise?name&page&limit` — public listing. Admin callers also
/// see each franchise's admin roster (emails included); others do not.
pub async fn list_franchises(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<FranchiseList>> {
    let include_admins = auth
        .as_ref()
        .map(|auth| {
            auth.user
                .roles
                .iter()
                .any(|assignment| assignment.role == Role::Admin)
        })
        .unwrap_or(false);

    let (franchises, more) = state
        .tokens
        .store()
        .list_franchises(
            query.name.as_deref(),
            query.page.unwrap_or(1),
            query.limit.unwrap_or(10),
            include_admins,
        )
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(FranchiseList { franchises, more }))
}

/// `GET /api/franchise/:userId` — franchises the user administers. Callers
/// other than the user or an admin get an empty list, never an error.
pub async fn get_user_franchises(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<Franchise>>> {
    let allowed = auth.user.id == user_id
        || auth
            .user
            .roles
            .iter()
            .any(|assignment| assignment.role == Role::Admin);
    if !allowed {
        return Ok(Json(Vec::new()));
    }

    let franchises = state
        .tokens
        .store()
        .list_user_franchises(user_id)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(franchises))
}

/// `DELETE /api/franchise/:id` — cascades to the franchise's stores.
pub async fn delete_franchise(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .tokens
        .store()
        .delete_franchise(id)
        .await
        .map_err(|err| ApiError::internal(format!("unable to delete franchise: {err}")))?;

    Ok(Json(MessageResponse {
        message: "franchise deleted",
    }))
}

/// `POST /api/franchise/:id/store` — global admin or that franchise's
/// franchisee.
pub async fn create_store(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(franchise_id): Path<i64>,
    Json(request): Json<CreateStoreRequest>,
) -> ApiResult<Json<Store>> {
    ensure_franchise_admin(&auth.user.roles, franchise_id).map_err(ApiError::from)?;

    let store = state
        .tokens
        .store()
        .add_store(franchise_id, &request.name)
        .await
        .map_err(|err| match err {
            StoreError::NotFound(_) | StoreError::Conflict(_) => {
                ApiError::internal("unable to create a store")
            }
            StoreError::Database(err) => ApiError::internal(err),
        })?;

    Ok(Json(store))
}

/// `DELETE /api/franchise/:id/store/:storeId` — same gate as creation.
pub async fn delete_store(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((franchise_id, store_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    ensure_franchise_admin(&auth.user.roles, franchise_id).map_err(ApiError::from)?;

    state
        .tokens
        .store()
        .remove_store(franchise_id, store_id)
        .await
        .map_err(|err| match err {
            StoreError::NotFound(_) | StoreError::Conflict(_) => {
                ApiError::internal("unable to delete a store")
            }
            StoreError::Database(err) => ApiError::internal(err),
        })?;

    Ok(Json(MessageResponse {
        message: "store deleted",
    }))
}
