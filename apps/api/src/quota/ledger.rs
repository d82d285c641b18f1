use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

/// Outcome of an atomic consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// One unit was taken; carries the new count.
    Granted(u32),
    /// The counter was already at the ceiling; nothing changed.
    Exhausted,
}

/// Authoritative free-usage counter per account.
///
/// Every mutation is a single conditional statement so concurrent requests for
/// the same account serialize on the row.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Ensures a counter exists, seeding it with `observed` on first sight.
    /// Returns the stored count, which wins over `observed` once a row exists.
    async fn seed(&self, user_id: &str, observed: u32) -> Result<u32>;

    /// The stored count, if the account has a row.
    async fn current(&self, user_id: &str) -> Result<Option<u32>>;

    /// Increments the counter if it is below `limit`.
    async fn try_consume(&self, user_id: &str, limit: u32) -> Result<Consumption>;

    /// Returns one unit taken by a failed action. Never goes below zero.
    async fn release(&self, user_id: &str) -> Result<u32>;
}

/// Postgres-backed ledger over the `account_usage` table.
#[derive(Clone)]
pub struct PgUsageLedger {
    pool: PgPool,
}

impl PgUsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_count(stored: i32) -> u32 {
    u32::try_from(stored).unwrap_or(0)
}

fn to_column(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[async_trait]
impl UsageLedger for PgUsageLedger {
    async fn seed(&self, user_id: &str, observed: u32) -> Result<u32> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let stored: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO account_usage (user_id, free_usage)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING free_usage
            "#,
        )
        .bind(user_id)
        .bind(to_column(observed))
        .fetch_one(&self.pool)
        .await?;

        Ok(to_count(stored))
    }

    async fn current(&self, user_id: &str) -> Result<Option<u32>> {
        let stored: Option<i32> =
            sqlx::query_scalar("SELECT free_usage FROM account_usage WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(stored.map(to_count))
    }

    async fn try_consume(&self, user_id: &str, limit: u32) -> Result<Consumption> {
        let consumed: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO account_usage (user_id, free_usage)
            VALUES ($1, 1)
            ON CONFLICT (user_id) DO UPDATE
                SET free_usage = account_usage.free_usage + 1,
                    updated_at = now()
                WHERE account_usage.free_usage < $2
            RETURNING free_usage
            "#,
        )
        .bind(user_id)
        .bind(to_column(limit))
        .fetch_optional(&self.pool)
        .await?;

        Ok(match consumed {
            Some(count) => {
                info!("Free usage for {user_id} is now {count}/{limit}");
                Consumption::Granted(to_count(count))
            }
            None => Consumption::Exhausted,
        })
    }

    async fn release(&self, user_id: &str) -> Result<u32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE account_usage
            SET free_usage = GREATEST(free_usage - 1, 0),
                updated_at = now()
            WHERE user_id = $1
            RETURNING free_usage
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(remaining.map(to_count).unwrap_or(0))
    }
}
