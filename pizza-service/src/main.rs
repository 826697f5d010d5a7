use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use reqwest::Client;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use pizza_service::config::load_service_config;
use pizza_service::metrics::ServiceMetrics;
use pizza_service::store::CredentialStore;
use pizza_service::tokens::{TokenConfig, TokenService};
use pizza_service::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = load_service_config()?;

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_pool = PgPool::connect(&database_url).await?;

    let store = CredentialStore::new(db_pool.clone());
    let tokens = TokenService::new(
        store,
        TokenConfig {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            ttl_seconds: config.token_ttl_seconds,
        },
    );

    let state = AppState {
        db: db_pool,
        tokens: Arc::new(tokens),
        config: Arc::new(config),
        http_client: Client::builder().build()?,
        metrics: Arc::new(ServiceMetrics::new()?),
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("authorization"),
        ]);

    let app = build_router(state).layer(cors);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    tracing::info!(%addr, "starting pizza-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
