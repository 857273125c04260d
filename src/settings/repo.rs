use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn list(db: &PgPool) -> Result<Vec<Setting>, sqlx::Error> {
    sqlx::query_as::<_, Setting>("SELECT key, value, updated_at FROM settings ORDER BY key")
        .fetch_all(db)
        .await
}

pub async fn find(db: &PgPool, key: &str) -> Result<Option<Setting>, sqlx::Error> {
    sqlx::query_as::<_, Setting>("SELECT key, value, updated_at FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(db)
        .await
}

/// All settings whose key starts with `prefix`, as a plain map.
pub async fn load_prefixed(db: &PgPool, prefix: &str) -> Result<HashMap<String, String>, sqlx::Error> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT key, value FROM settings WHERE key LIKE $1 || '%'")
            .bind(prefix)
            .fetch_all(db)
            .await?;
    Ok(rows.into_iter().collect())
}

/// Writes every pair or none of them.
pub async fn upsert_many(db: &PgPool, pairs: &[(String, String)]) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;
    for (key, value) in pairs {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Insert-if-missing; an existing value is never replaced. Returns whether a row was inserted.
pub async fn insert_default<'e>(
    db: impl PgExecutor<'e>,
    key: &str,
    value: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, now()) ON CONFLICT (key) DO NOTHING",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}
