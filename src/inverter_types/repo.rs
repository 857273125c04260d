use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageQuery;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InverterType {
    pub id: Uuid,
    pub name: String,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn list(
    db: &PgPool,
    status: Option<i16>,
    page: &PageQuery,
) -> Result<(Vec<InverterType>, i64), sqlx::Error> {
    let (total, rows) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inverter_types WHERE ($1::SMALLINT IS NULL OR status = $1)"
        )
        .bind(status)
        .fetch_one(db),
        sqlx::query_as::<_, InverterType>(
            r#"
            SELECT id, name, status, created_at, updated_at
            FROM inverter_types
            WHERE ($1::SMALLINT IS NULL OR status = $1)
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(db),
    )?;
    Ok((rows, total))
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<InverterType>, sqlx::Error> {
    sqlx::query_as::<_, InverterType>(
        "SELECT id, name, status, created_at, updated_at FROM inverter_types WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn create(db: &PgPool, name: &str, status: i16) -> Result<InverterType, sqlx::Error> {
    sqlx::query_as::<_, InverterType>(
        r#"
        INSERT INTO inverter_types (name, status)
        VALUES ($1, $2)
        RETURNING id, name, status, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    status: Option<i16>,
) -> Result<InverterType, sqlx::Error> {
    sqlx::query_as::<_, InverterType>(
        r#"
        UPDATE inverter_types SET
            name       = COALESCE($2, name),
            status     = COALESCE($3, status),
            updated_at = now()
        WHERE id = $1
        RETURNING id, name, status, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM inverter_types WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
