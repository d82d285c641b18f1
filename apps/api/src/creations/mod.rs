//! Append-only log of every successful action.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::creation::{CreationRow, NewCreation};

pub mod handlers;

#[async_trait]
pub trait CreationLog: Send + Sync {
    /// Appends one record. Records are never updated or deleted.
    async fn append(&self, creation: NewCreation) -> Result<CreationRow>;

    /// A user's records, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<CreationRow>>;

    /// Every published record, newest first.
    async fn list_published(&self) -> Result<Vec<CreationRow>>;
}

#[derive(Clone)]
pub struct PgCreationLog {
    pool: PgPool,
}

impl PgCreationLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreationLog for PgCreationLog {
    async fn append(&self, creation: NewCreation) -> Result<CreationRow> {
        let row = sqlx::query_as::<_, CreationRow>(
            r#"
            INSERT INTO creations (id, user_id, prompt, content, type, publish)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, prompt, content, type, publish, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&creation.user_id)
        .bind(&creation.prompt)
        .bind(&creation.content)
        .bind(creation.kind.as_str())
        .bind(creation.publish)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Recorded {} creation {} for user {}",
            row.kind, row.id, row.user_id
        );
        Ok(row)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<CreationRow>> {
        Ok(sqlx::query_as::<_, CreationRow>(
            r#"
            SELECT id, user_id, prompt, content, type, publish, created_at
            FROM creations
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_published(&self) -> Result<Vec<CreationRow>> {
        Ok(sqlx::query_as::<_, CreationRow>(
            r#"
            SELECT id, user_id, prompt, content, type, publish, created_at
            FROM creations
            WHERE publish = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
