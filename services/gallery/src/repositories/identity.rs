//! PostgreSQL-backed identity store

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::IdentityStore;
use crate::error::StoreError;
use crate::models::{ChatBinding, Identity, IdentityId};

/// Identity repository over the `users` and `chat_bindings` tables
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Create a new identity repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: &PgRow) -> Identity {
    Identity {
        id: row.get("id"),
        name: row.get("name"),
        login: row.get("login"),
        password: row.get("password"),
        description: row
            .get::<Option<String>, _>("description")
            .unwrap_or_default(),
        asset_urls: Vec::new(),
    }
}

/// Map constraint violations to store conditions
pub(crate) fn map_write_error(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{} already exists", what))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create(&self, identity: &Identity) -> Result<IdentityId, StoreError> {
        info!("Creating identity: {}", identity.login);

        let row = sqlx::query(
            r#"
            INSERT INTO users (name, description, login, password)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&identity.name)
        .bind(&identity.description)
        .bind(&identity.login)
        .bind(&identity.password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "login"))?;

        Ok(row.get("id"))
    }

    async fn get(&self, id: IdentityId) -> Result<Identity, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, login, password, description
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(identity_from_row)
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        info!("Updating identity: {}", identity.id);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, description = $3, login = $4, password = $5
            WHERE id = $1
            "#,
        )
        .bind(identity.id)
        .bind(&identity.name)
        .bind(&identity.description)
        .bind(&identity.login)
        .bind(&identity.password)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "login"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: IdentityId) -> Result<(), StoreError> {
        info!("Deleting identity: {}", id);

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Identity, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, login, password, description
            FROM users
            WHERE login = $1 AND password = $2
            "#,
        )
        .bind(login)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(identity_from_row)
            .ok_or(StoreError::NotFound)
    }

    async fn find_binding(&self, chat_id: i64) -> Result<ChatBinding, StoreError> {
        let row = sqlx::query("SELECT user_id, chat_id FROM chat_bindings WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| ChatBinding {
            chat_id: row.get("chat_id"),
            identity_id: row.get("user_id"),
        })
        .ok_or(StoreError::NotFound)
    }

    async fn create_binding(&self, binding: &ChatBinding) -> Result<(), StoreError> {
        info!(
            "Binding chat {} to identity {}",
            binding.chat_id, binding.identity_id
        );

        sqlx::query("INSERT INTO chat_bindings (user_id, chat_id) VALUES ($1, $2)")
            .bind(binding.identity_id)
            .bind(binding.chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "chat binding"))?;

        Ok(())
    }
}
