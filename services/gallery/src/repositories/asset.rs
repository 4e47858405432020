//! PostgreSQL-backed asset metadata store

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::AssetMetadataStore;
use super::identity::map_write_error;
use crate::error::StoreError;
use crate::models::{Asset, IdentityId, NewAsset};

/// Asset repository over the `images` table
#[derive(Clone)]
pub struct PgAssetStore {
    pool: PgPool,
}

impl PgAssetStore {
    /// Create a new asset repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetMetadataStore for PgAssetStore {
    async fn create(&self, asset: &NewAsset) -> Result<Asset, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO images (user_id, name, extension)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(asset.identity_id)
        .bind(&asset.stored_name)
        .bind(&asset.extension)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "image name"))?;

        Ok(Asset {
            id: row.get("id"),
            identity_id: asset.identity_id,
            stored_name: asset.stored_name.clone(),
            extension: asset.extension.clone(),
        })
    }

    async fn list_by_identity(&self, identity_id: IdentityId) -> Result<Vec<Asset>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, extension
            FROM images
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        let assets = rows
            .into_iter()
            .map(|row| Asset {
                id: row.get("id"),
                identity_id: row.get("user_id"),
                stored_name: row.get("name"),
                extension: row.get("extension"),
            })
            .collect();

        Ok(assets)
    }

    async fn delete(&self, asset_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(asset_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
