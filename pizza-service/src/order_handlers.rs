use axum::extract::{Query, State};
use axum::Json;
use common_auth::ensure_admin;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::store::{DinerOrder, MenuItem, NewMenuItem, OrderItem, StoreError};
use crate::tokens::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderHistory {
    #[serde(rename = "dinerId")]
    pub diner_id: i64,
    pub orders: Vec<DinerOrder>,
    pub page: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewOrderRequest {
    #[serde(rename = "franchiseId")]
    pub franchise_id: i64,
    #[serde(rename = "storeId")]
    pub store_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: DinerOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    #[serde(rename = "reportUrl", skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FactoryResponse {
    jwt: Option<String>,
    #[serde(rename = "reportUrl")]
    report_url: Option<String>,
}

/// `GET /api/order/menu` — public.
pub async fn get_menu(State(state): State<AppState>) -> ApiResult<Json<Vec<MenuItem>>> {
    let menu = state
        .tokens
        .store()
        .menu()
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(menu))
}

/// `PUT /api/order/menu` — admin only; returns the full updated menu.
pub async fn add_menu_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(item): Json<NewMenuItem>,
) -> ApiResult<Json<Vec<MenuItem>>> {
    ensure_admin(&auth.user.roles).map_err(ApiError::from)?;

    let menu = state
        .tokens
        .store()
        .add_menu_item(&item)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(menu))
}

/// `GET /api/order` — the caller's own order history.
pub async fn get_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Json<OrderHistory>> {
    let (orders, page) = state
        .tokens
        .store()
        .diner_orders(auth.user.id, query.page.unwrap_or(1))
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(OrderHistory {
        diner_id: auth.user.id,
        orders,
        page,
    }))
}

/// `POST /api/order` — records the order, then reports it to the pizza
/// factory when one is configured.
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewOrderRequest>,
) -> ApiResult<Json<OrderResponse>> {
    if request.items.is_empty() {
        return Err(ApiError::bad_request("missing_field", "order items are required"));
    }

    let order = state
        .tokens
        .store()
        .create_order(
            auth.user.id,
            request.franchise_id,
            request.store_id,
            &request.items,
        )
        .await
        .map_err(|err| {
            state.metrics.order_placed("failure");
            match err {
                StoreError::NotFound(_) | StoreError::Conflict(_) => {
                    ApiError::internal("unable to create order")
                }
                StoreError::Database(err) => ApiError::internal(err),
            }
        })?;

    let factory = match (&state.config.factory_url, &state.config.factory_api_key) {
        (Some(url), key) => Some((url.clone(), key.clone())),
        _ => None,
    };

    let mut jwt = None;
    let mut report_url = None;
    if let Some((url, api_key)) = factory {
        let payload = json!({
            "diner": { "id": auth.user.id, "name": auth.user.name, "email": auth.user.email },
            "order": order,
        });

        let mut builder = state.http_client.post(format!("{url}/api/order")).json(&payload);
        if let Some(key) = api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|err| {
            state.metrics.order_placed("factory_failure");
            error!(order_id = order.id, error = %err, "Factory request failed");
            ApiError::internal("Failed to fulfill order at factory")
        })?;

        if !response.status().is_success() {
            state.metrics.order_placed("factory_failure");
            return Err(ApiError::internal("Failed to fulfill order at factory"));
        }

        if let Ok(body) = response.json::<FactoryResponse>().await {
            jwt = body.jwt;
            report_url = body.report_url;
        }
    }

    state.metrics.order_placed("success");
    info!(order_id = order.id, diner_id = auth.user.id, "order placed");
    Ok(Json(OrderResponse {
        order,
        jwt,
        report_url,
    }))
}
