use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageQuery;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
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
) -> Result<(Vec<Role>, i64), sqlx::Error> {
    let (total, rows) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM roles WHERE ($1::SMALLINT IS NULL OR status = $1)"
        )
        .bind(status)
        .fetch_one(db),
        sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, description, status, created_at, updated_at
            FROM roles
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

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT id, name, description, status, created_at, updated_at FROM roles WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_by_name<'e>(
    db: impl PgExecutor<'e>,
    name: &str,
) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT id, name, description, status, created_at, updated_at FROM roles WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(db)
    .await
}

pub async fn create(
    db: &PgPool,
    name: &str,
    description: Option<&str>,
    status: i16,
) -> Result<Role, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        r#"
        INSERT INTO roles (name, description, status)
        VALUES ($1, $2, $3)
        RETURNING id, name, description, status, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(status)
    .fetch_one(db)
    .await
}

/// Insert the role unless one with the same name exists. Returns the stored
/// row and whether it was inserted; an existing row is left untouched.
pub async fn upsert_by_name<'e, E>(
    db: E,
    name: &str,
    description: Option<&str>,
) -> Result<(Role, bool), sqlx::Error>
where
    E: PgExecutor<'e> + Copy,
{
    let inserted = sqlx::query_as::<_, Role>(
        r#"
        INSERT INTO roles (name, description, status)
        VALUES ($1, $2, 1)
        ON CONFLICT (name) DO NOTHING
        RETURNING id, name, description, status, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(description)
    .fetch_optional(db)
    .await?;

    match inserted {
        Some(role) => Ok((role, true)),
        None => find_by_name(db, name)
            .await?
            .map(|r| (r, false))
            .ok_or(sqlx::Error::RowNotFound),
    }
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    status: Option<i16>,
) -> Result<Role, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        r#"
        UPDATE roles SET
            name        = COALESCE($2, name),
            description = COALESCE($3, description),
            status      = COALESCE($4, status),
            updated_at  = now()
        WHERE id = $1
        RETURNING id, name, description, status, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
