pub mod app;
pub mod auth_handlers;
pub mod config;
pub mod franchise_handlers;
pub mod metrics;
pub mod order_handlers;
pub mod store;
pub mod tokens;
pub mod user_handlers;

pub use app::{build_router, AppState};
