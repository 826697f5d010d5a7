use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;
use reqwest::Client;
use sqlx::PgPool;

use crate::auth_handlers::{login, logout, register};
use crate::config::ServiceConfig;
use crate::franchise_handlers::{
    create_franchise, create_store, delete_franchise, delete_store, get_user_franchises,
    list_franchises,
};
use crate::metrics::ServiceMetrics;
use crate::order_handlers::{add_menu_item, create_order, get_menu, get_orders};
use crate::tokens::TokenService;
use crate::user_handlers::{delete_user_stub, get_me, list_users_stub, update_user};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub tokens: Arc<TokenService>,
    pub config: Arc<ServiceConfig>,
    pub http_client: Client,
    pub metrics: Arc<ServiceMetrics>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "Unable to render metrics");
            Response::new(axum::body::Body::empty())
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/auth", post(register).put(login).delete(logout))
        .route("/api/user", get(list_users_stub))
        .route("/api/user/me", get(get_me))
        .route("/api/user/:id", put(update_user).delete(delete_user_stub))
        .route("/api/franchise", post(create_franchise).get(list_franchises))
        .route(
            "/api/franchise/:id",
            get(get_user_franchises).delete(delete_franchise),
        )
        .route("/api/franchise/:id/store", post(create_store))
        .route("/api/franchise/:id/store/:store_id", delete(delete_store))
        .route("/api/order/menu", get(get_menu).put(add_menu_item))
        .route("/api/order", get(get_orders).post(create_order))
        .with_state(state)
}
