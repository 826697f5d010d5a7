use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    token_validations: IntCounterVec,
    orders_placed: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "pizza_login_attempts_total",
                "Count of login/register attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let token_validations = IntCounterVec::new(
            Opts::new(
                "pizza_token_validations_total",
                "Count of bearer token validations grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(token_validations.clone()))?;

        let orders_placed = IntCounterVec::new(
            Opts::new(
                "pizza_orders_placed_total",
                "Count of order placements grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_placed.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            token_validations,
            orders_placed,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn token_validation(&self, outcome: &str) {
        self.token_validations.with_label_values(&[outcome]).inc();
    }

    pub fn order_placed(&self, outcome: &str) {
        self.orders_placed.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
