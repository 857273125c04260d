use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Executor, FromRow, PgPool};
use time::OffsetDateTime;

/// Key for `pg_advisory_xact_lock`, shared by every migration transaction.
const LOCK_KEY: i64 = 0x5355_4e53_4841_5245;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: i64,
    pub filename: String,
    pub checksum: String,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

/// Persistence for the migration tracking table.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    async fn ensure_table(&self) -> anyhow::Result<()>;

    /// Applied migrations, oldest first.
    async fn applied(&self) -> anyhow::Result<Vec<AppliedMigration>>;

    /// Runs `sql` and records `filename` atomically. Returns `false` without
    /// running anything when `filename` is already recorded.
    async fn apply(&self, filename: &str, checksum: &str, sql: &str) -> anyhow::Result<bool>;

    /// Runs the rollback `sql` and removes the tracking row atomically.
    async fn revert(&self, filename: &str, sql: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgMigrationStore {
    db: PgPool,
}

impl PgMigrationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    async fn ensure_table(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migrations (
                id         BIGSERIAL PRIMARY KEY,
                filename   TEXT NOT NULL UNIQUE,
                checksum   TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.db)
        .await
        .context("create migrations table")?;
        Ok(())
    }

    async fn applied(&self) -> anyhow::Result<Vec<AppliedMigration>> {
        let rows = sqlx::query_as::<_, AppliedMigration>(
            "SELECT id, filename, checksum, applied_at FROM migrations ORDER BY id",
        )
        .fetch_all(&self.db)
        .await
        .context("load applied migrations")?;
        Ok(rows)
    }

    async fn apply(&self, filename: &str, checksum: &str, sql: &str) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM migrations WHERE filename = $1)")
                .bind(filename)
                .fetch_one(&mut *tx)
                .await?;
        if exists {
            return Ok(false);
        }

        (&mut *tx)
            .execute(sql)
            .await
            .with_context(|| format!("execute {filename}"))?;
        sqlx::query("INSERT INTO migrations (filename, checksum) VALUES ($1, $2)")
            .bind(filename)
            .bind(checksum)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("record {filename}"))?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revert(&self, filename: &str, sql: &str) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        (&mut *tx)
            .execute(sql)
            .await
            .with_context(|| format!("execute rollback for {filename}"))?;
        sqlx::query("DELETE FROM migrations WHERE filename = $1")
            .bind(filename)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
