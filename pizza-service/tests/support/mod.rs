use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use common_auth::{Role, RoleAssignment};
use dirs::cache_dir;
use pg_embed::pg_enums::PgAuthMethod;
use pg_embed::pg_fetch::{PgFetchSettings, PG_V13};
use pg_embed::postgres::{PgEmbed, PgSettings};
use pizza_service::config::ServiceConfig;
use pizza_service::metrics::ServiceMetrics;
use pizza_service::store::CredentialStore;
use pizza_service::tokens::{TokenConfig, TokenService};
use pizza_service::AppState;
use portpicker::pick_unused_port;
use rand_core::OsRng;
use reqwest::Client;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "pizza-test-secret";
pub const TEST_ISSUER: &str = "pizza-service";

pub struct TestDatabase {
    pool: PgPool,
    embedded: Option<EmbeddedPg>,
}

impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        if env::var("PIZZA_TEST_DATABASE_URL").is_err() && !env_flag_enabled("PIZZA_TEST_USE_EMBED")
        {
            eprintln!(
                "Skipping pizza-service integration tests: set PIZZA_TEST_DATABASE_URL or PIZZA_TEST_USE_EMBED=1 to run them.",
            );
            return Ok(None);
        }

        let mut embedded = None;
        let database_url = if let Ok(url) = env::var("PIZZA_TEST_DATABASE_URL") {
            url
        } else {
            if env_flag_enabled("PIZZA_TEST_EMBED_CLEAR_CACHE") {
                if let Some(cache_dir) = cache_dir() {
                    let _ = std::fs::remove_dir_all(cache_dir.join("pg-embed"));
                }
            }

            let temp = tempdir()?;
            let port = pick_unused_port()
                .context("failed to find available port for embedded Postgres")?;

            let mut fetch_settings = PgFetchSettings::default();
            fetch_settings.version = PG_V13;

            let mut pg = PgEmbed::new(
                PgSettings {
                    database_dir: temp.path().to_path_buf(),
                    port,
                    user: "postgres".to_string(),
                    password: "postgres".to_string(),
                    auth_method: PgAuthMethod::Plain,
                    persistent: false,
                    timeout: Some(Duration::from_secs(30)),
                    migration_dir: None,
                },
                fetch_settings,
            )
            .await?;

            pg.setup().await?;
            pg.start_db().await?;

            let uri = format!("{}/postgres", pg.db_uri);
            embedded = Some(EmbeddedPg {
                pg,
                _temp_dir: temp,
            });
            uri
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        run_migrations(&pool).await?;

        Ok(Some(Self { pool, embedded }))
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn teardown(self) -> Result<()> {
        if let Some(embedded) = self.embedded {
            embedded.shutdown().await;
        }
        Ok(())
    }
}

struct EmbeddedPg {
    pg: PgEmbed,
    _temp_dir: TempDir,
}

impl EmbeddedPg {
    async fn shutdown(mut self) {
        let _ = self.pg.stop_db().await;
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let mut entries = std::fs::read_dir(&migrations_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        let sql = std::fs::read_to_string(&path)?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    Ok(())
}

#[allow(dead_code)]
pub fn build_state(pool: PgPool) -> Result<AppState> {
    build_state_with_factory(pool, None)
}

/// Variant wired to a fulfillment endpoint, for tests that mock the factory.
#[allow(dead_code)]
pub fn build_state_with_factory(pool: PgPool, factory_url: Option<String>) -> Result<AppState> {
    let store = CredentialStore::new(pool.clone());
    let tokens = TokenService::new(
        store,
        TokenConfig {
            secret: TEST_JWT_SECRET.to_string(),
            issuer: TEST_ISSUER.to_string(),
            ttl_seconds: 3600,
        },
    );

    let factory_api_key = factory_url.as_ref().map(|_| "test-factory-key".to_string());
    let config = ServiceConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_issuer: TEST_ISSUER.to_string(),
        token_ttl_seconds: 3600,
        factory_url,
        factory_api_key,
    };

    Ok(AppState {
        db: pool,
        tokens: Arc::new(tokens),
        config: Arc::new(config),
        http_client: Client::builder().build()?,
        metrics: Arc::new(ServiceMetrics::new()?),
    })
}

#[allow(dead_code)]
pub fn random_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Inserts a user directly, bypassing the registration endpoint, so tests can
/// seed admins and franchisees.
#[allow(dead_code)]
pub async fn seed_user(pool: &PgPool, roles: &[RoleAssignment]) -> Result<SeededUser> {
    let name = random_name("user");
    let email = format!("{name}@test.com");
    let password = "correct horse battery staple".to_string();

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("hash password: {err}"))?
        .to_string();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(pool)
    .await?;

    for assignment in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role, object_id) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(assignment.role.as_str())
            .bind(assignment.object_id)
            .execute(pool)
            .await?;
    }

    Ok(SeededUser {
        id,
        name,
        email,
        password,
    })
}

#[allow(dead_code)]
pub async fn seed_admin(pool: &PgPool) -> Result<SeededUser> {
    seed_user(pool, &[RoleAssignment::global(Role::Admin)]).await
}

#[allow(dead_code)]
pub async fn seed_diner(pool: &PgPool) -> Result<SeededUser> {
    seed_user(pool, &[RoleAssignment::global(Role::Diner)]).await
}

fn env_flag_enabled(key: &str) -> bool {
    matches!(env::var(key), Ok(value) if is_truthy(value.as_str()))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
