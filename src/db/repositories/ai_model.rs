//! AI model configuration repository
//!
//! One row per user. The `api_key` column only ever holds ciphertext produced
//! by `services::secret::SecretCodec`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::AiModelConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// AI model configuration repository trait
#[async_trait]
pub trait AiModelRepository: Send + Sync {
    async fn get_by_user(&self, user_id: i64) -> Result<Option<AiModelConfig>>;

    /// Insert or replace the configuration for `user_id`
    async fn upsert(
        &self,
        user_id: i64,
        provider: &str,
        model_name: &str,
        encrypted_api_key: Option<&str>,
    ) -> Result<AiModelConfig>;

    async fn delete_by_user(&self, user_id: i64) -> Result<bool>;
}

/// SQLx-based AI model configuration repository
pub struct SqlxAiModelRepository {
    pool: DynDatabasePool,
}

impl SqlxAiModelRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AiModelRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AiModelRepository for SqlxAiModelRepository {
    async fn get_by_user(&self, user_id: i64) -> Result<Option<AiModelConfig>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_user_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => get_by_user_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn upsert(
        &self,
        user_id: i64,
        provider: &str,
        model_name: &str,
        encrypted_api_key: Option<&str>,
    ) -> Result<AiModelConfig> {
        let saved = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                upsert_sqlite(pool, user_id, provider, model_name, encrypted_api_key).await?;
                get_by_user_sqlite(pool, user_id).await?
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                upsert_mysql(pool, user_id, provider, model_name, encrypted_api_key).await?;
                get_by_user_mysql(pool, user_id).await?
            }
        };

        saved.context("AI model configuration missing after upsert")
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM ai_models WHERE user_id = ?")
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM ai_models WHERE user_id = ?")
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete AI model configuration")?;

        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_by_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<AiModelConfig>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, provider, model_name, api_key, created_at, updated_at
        FROM ai_models
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get AI model configuration")?;

    Ok(row.map(|row| AiModelConfig {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider: row.get("provider"),
        model_name: row.get("model_name"),
        api_key: row.get("api_key"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn upsert_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    provider: &str,
    model_name: &str,
    encrypted_api_key: Option<&str>,
) -> Result<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO ai_models (user_id, provider, model_name, api_key, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            provider = excluded.provider,
            model_name = excluded.model_name,
            api_key = excluded.api_key,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(provider)
    .bind(model_name)
    .bind(encrypted_api_key)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save AI model configuration")?;

    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_by_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<AiModelConfig>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, provider, model_name, api_key, created_at, updated_at
        FROM ai_models
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get AI model configuration")?;

    Ok(row.map(|row| AiModelConfig {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider: row.get("provider"),
        model_name: row.get("model_name"),
        api_key: row.get("api_key"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn upsert_mysql(
    pool: &MySqlPool,
    user_id: i64,
    provider: &str,
    model_name: &str,
    encrypted_api_key: Option<&str>,
) -> Result<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO ai_models (user_id, provider, model_name, api_key, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            provider = VALUES(provider),
            model_name = VALUES(model_name),
            api_key = VALUES(api_key),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(user_id)
    .bind(provider)
    .bind(model_name)
    .bind(encrypted_api_key)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save AI model configuration")?;

    Ok(())
}
