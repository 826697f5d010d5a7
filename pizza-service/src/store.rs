use chrono::{DateTime, Utc};
use common_auth::{Role, RoleAssignment};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use thiserror::Error;

const ORDERS_PER_PAGE: i64 = 10;

/// Single source of truth for users, tokens, franchises, menu, and orders.
/// All concurrent writes are arbitrated here by database constraints; a
/// uniqueness race loser gets `Conflict`, never a silent overwrite.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleAssignment>,
}

/// A user row joined with its password hash, for credential checks only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub user_id: i64,
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FranchiseAdmin {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Store {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Franchise {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admins: Option<Vec<FranchiseAdmin>>,
    pub stores: Vec<Store>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMenuItem {
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "menuId")]
    pub menu_id: i64,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DinerOrder {
    pub id: i64,
    #[serde(rename = "franchiseId")]
    pub franchise_id: i64,
    #[serde(rename = "storeId")]
    pub store_id: i64,
    pub date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- users ---------------------------------------------------------

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        roles: &[RoleAssignment],
    ) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| classify(err, "user"))?;
        let id: i64 = row.try_get("id")?;

        for assignment in roles {
            sqlx::query("INSERT INTO user_roles (user_id, role, object_id) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(assignment.role.as_str())
                .bind(assignment.object_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            roles: roles.to_vec(),
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let row = sqlx::query("SELECT id, name, email, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let roles = self.user_roles(id).await?;
        Ok(Some(UserCredentials {
            user: User {
                id,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                roles,
            },
            password_hash: row.try_get("password_hash")?,
        }))
    }

    pub async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let roles = self.user_roles(id).await?;
        Ok(Some(User {
            id,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            roles,
        }))
    }

    /// Partial profile update; untouched fields keep their current value.
    pub async fn update_user(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> StoreResult<User> {
        let row = sqlx::query(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash)
             WHERE id = $1
             RETURNING id, name, email",
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| classify(err, "user"))?
        .ok_or(StoreError::NotFound("user"))?;

        let roles = self.user_roles(id).await?;
        Ok(User {
            id,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            roles,
        })
    }

    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<RoleAssignment>> {
        let rows = sqlx::query(
            "SELECT role, object_id FROM user_roles WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.try_get("role")?;
            let Some(role) = Role::parse(&raw) else {
                // Unknown role rows are skipped rather than failing every
                // request for the user.
                tracing::warn!(user_id, role = %raw, "ignoring unrecognized role row");
                continue;
            };
            roles.push(RoleAssignment {
                role,
                object_id: row.try_get("object_id")?,
            });
        }
        Ok(roles)
    }

    // --- tokens --------------------------------------------------------

    pub async fn record_token(
        &self,
        token_hash: &[u8],
        user_id: i64,
        issued_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO auth_tokens (token_hash, user_id, issued_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(issued_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn token_state(&self, token_hash: &[u8]) -> StoreResult<Option<TokenRecord>> {
        let row = sqlx::query("SELECT user_id, revoked FROM auth_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(TokenRecord {
                user_id: row.try_get("user_id")?,
                revoked: row.try_get("revoked")?,
            }),
            None => None,
        })
    }

    /// Marks a token revoked. Idempotent; returns whether the token was ever
    /// issued. Revoked rows are kept, not erased.
    pub async fn revoke_token(&self, token_hash: &[u8]) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE auth_tokens SET revoked = TRUE WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- franchises ----------------------------------------------------

    pub async fn create_franchise(
        &self,
        name: &str,
        admin_emails: &[String],
    ) -> StoreResult<Franchise> {
        let mut tx = self.pool.begin().await?;

        let mut admins = Vec::with_capacity(admin_emails.len());
        for email in admin_emails {
            let row = sqlx::query("SELECT id, name, email FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound("franchise admin user"))?;
            admins.push(FranchiseAdmin {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
            });
        }

        let row = sqlx::query("INSERT INTO franchises (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| classify(err, "franchise"))?;
        let id: i64 = row.try_get("id")?;

        for admin in &admins {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role, object_id) VALUES ($1, 'franchisee', $2)",
            )
            .bind(admin.id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Franchise {
            id,
            name: name.to_string(),
            admins: Some(admins),
            stores: Vec::new(),
        })
    }

    /// Pages through franchises matching an optional name filter. Admin
    /// callers get the admin roster attached; everyone else gets the public
    /// subset. Returns the page plus a flag for further results.
    pub async fn list_franchises(
        &self,
        name_filter: Option<&str>,
        page: i64,
        limit: i64,
        include_admins: bool,
    ) -> StoreResult<(Vec<Franchise>, bool)> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let pattern = match name_filter {
            Some(name) if !name.trim().is_empty() => format!("%{}%", name.trim()),
            _ => "%".to_string(),
        };

        let rows = sqlx::query(
            "SELECT id, name FROM franchises WHERE name ILIKE $1 ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(limit + 1)
        .bind((page - 1) * limit)
        .fetch_all(&self.pool)
        .await?;

        let more = rows.len() as i64 > limit;
        let mut franchises = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.into_iter().take(limit as usize) {
            let id: i64 = row.try_get("id")?;
            franchises.push(self.hydrate_franchise(id, row.try_get("name")?, include_admins).await?);
        }
        Ok((franchises, more))
    }

    /// Franchises the given user administers. Unknown user ids yield an empty
    /// list, not an error.
    pub async fn list_user_franchises(&self, user_id: i64) -> StoreResult<Vec<Franchise>> {
        let rows = sqlx::query(
            "SELECT f.id, f.name FROM franchises f
             JOIN user_roles r ON r.object_id = f.id
             WHERE r.user_id = $1 AND r.role = 'franchisee'
             ORDER BY f.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut franchises = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            franchises.push(self.hydrate_franchise(id, row.try_get("name")?, true).await?);
        }
        Ok(franchises)
    }

    async fn hydrate_franchise(
        &self,
        id: i64,
        name: String,
        include_admins: bool,
    ) -> StoreResult<Franchise> {
        let stores = sqlx::query_as::<_, Store>(
            "SELECT id, name FROM stores WHERE franchise_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let admins = if include_admins {
            Some(
                sqlx::query_as::<_, FranchiseAdmin>(
                    "SELECT u.id, u.name, u.email FROM users u
                     JOIN user_roles r ON r.user_id = u.id
                     WHERE r.role = 'franchisee' AND r.object_id = $1
                     ORDER BY u.id",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?,
            )
        } else {
            None
        };

        Ok(Franchise {
            id,
            name,
            admins,
            stores,
        })
    }

    /// Removes a franchise along with its stores and franchisee role rows.
    pub async fn delete_franchise(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM stores WHERE franchise_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_roles WHERE role = 'franchisee' AND object_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM franchises WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn add_store(&self, franchise_id: i64, name: &str) -> StoreResult<Store> {
        let exists = sqlx::query("SELECT 1 AS one FROM franchises WHERE id = $1")
            .bind(franchise_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound("franchise"));
        }

        let row = sqlx::query(
            "INSERT INTO stores (franchise_id, name) VALUES ($1, $2) RETURNING id",
        )
        .bind(franchise_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| classify(err, "store"))?;

        Ok(Store {
            id: row.try_get("id")?,
            name: name.to_string(),
        })
    }

    pub async fn remove_store(&self, franchise_id: i64, store_id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1 AND franchise_id = $2")
            .bind(store_id)
            .bind(franchise_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("store"));
        }
        Ok(())
    }

    // --- menu ----------------------------------------------------------

    pub async fn menu(&self) -> StoreResult<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>(
            "SELECT id, title, description, image, price FROM menu_items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn add_menu_item(&self, item: &NewMenuItem) -> StoreResult<Vec<MenuItem>> {
        sqlx::query(
            "INSERT INTO menu_items (title, description, image, price) VALUES ($1, $2, $3, $4)",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.image)
        .bind(item.price)
        .execute(&self.pool)
        .await?;

        self.menu().await
    }

    // --- orders --------------------------------------------------------

    pub async fn diner_orders(
        &self,
        diner_id: i64,
        page: i64,
    ) -> StoreResult<(Vec<DinerOrder>, i64)> {
        let page = page.max(1);
        let rows = sqlx::query(
            "SELECT id, franchise_id, store_id, created_at FROM diner_orders
             WHERE diner_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3",
        )
        .bind(diner_id)
        .bind(ORDERS_PER_PAGE)
        .bind((page - 1) * ORDERS_PER_PAGE)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let items = self.order_items(id).await?;
            orders.push(DinerOrder {
                id,
                franchise_id: row.try_get("franchise_id")?,
                store_id: row.try_get("store_id")?,
                date: row.try_get("created_at")?,
                items,
            });
        }
        Ok((orders, page))
    }

    pub async fn create_order(
        &self,
        diner_id: i64,
        franchise_id: i64,
        store_id: i64,
        items: &[OrderItem],
    ) -> StoreResult<DinerOrder> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO diner_orders (diner_id, franchise_id, store_id, created_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(diner_id)
        .bind(franchise_id)
        .bind(store_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| classify(err, "order"))?;
        let id: i64 = row.try_get("id")?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, menu_id, description, price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(item.menu_id)
            .bind(&item.description)
            .bind(item.price)
            .execute(&mut *tx)
            .await
            .map_err(|err| classify(err, "order item"))?;
        }

        tx.commit().await?;

        Ok(DinerOrder {
            id,
            franchise_id,
            store_id,
            date: now,
            items: items.to_vec(),
        })
    }

    async fn order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT menu_id, description, price FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(OrderItem {
                menu_id: row.try_get("menu_id")?,
                description: row.try_get("description")?,
                price: row.try_get("price")?,
            });
        }
        Ok(items)
    }
}

/// Translates constraint violations into the store taxonomy: unique
/// violations become `Conflict`, foreign-key violations `NotFound`.
fn classify(err: sqlx::Error, entity: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::Conflict(entity),
            Some("23503") => return StoreError::NotFound(entity),
            _ => {}
        }
    }
    StoreError::Database(err)
}
