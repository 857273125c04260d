use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageQuery;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct State {
    pub id: Uuid,
    pub country_id: Uuid,
    pub name: String,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct City {
    pub id: Uuid,
    pub state_id: Uuid,
    pub name: String,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const COUNTRY_COLUMNS: &str = "id, name, code, status, created_at, updated_at";
const STATE_COLUMNS: &str = "id, country_id, name, status, created_at, updated_at";
const CITY_COLUMNS: &str = "id, state_id, name, status, created_at, updated_at";

// Countries

pub async fn list_countries(
    db: &PgPool,
    search: Option<&str>,
    page: &PageQuery,
) -> Result<(Vec<Country>, i64), sqlx::Error> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let list_sql = format!(
        "SELECT {COUNTRY_COLUMNS} FROM countries
         WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR code ILIKE $1)
         ORDER BY name LIMIT $2 OFFSET $3"
    );
    let (total, rows) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM countries WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR code ILIKE $1)"
        )
        .bind(&pattern)
        .fetch_one(db),
        sqlx::query_as::<_, Country>(&list_sql)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(db),
    )?;
    Ok((rows, total))
}

pub async fn find_country(db: &PgPool, id: Uuid) -> Result<Option<Country>, sqlx::Error> {
    sqlx::query_as::<_, Country>(&format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create_country(
    db: &PgPool,
    name: &str,
    code: &str,
    status: i16,
) -> Result<Country, sqlx::Error> {
    sqlx::query_as::<_, Country>(&format!(
        "INSERT INTO countries (name, code, status) VALUES ($1, $2, $3) RETURNING {COUNTRY_COLUMNS}"
    ))
    .bind(name)
    .bind(code)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn update_country(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    code: Option<&str>,
    status: Option<i16>,
) -> Result<Country, sqlx::Error> {
    sqlx::query_as::<_, Country>(&format!(
        "UPDATE countries SET
            name       = COALESCE($2, name),
            code       = COALESCE($3, code),
            status     = COALESCE($4, status),
            updated_at = now()
         WHERE id = $1
         RETURNING {COUNTRY_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(code)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn delete_country(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM countries WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Insert-if-missing keyed on `code`. Returns the id and whether a row was inserted.
pub async fn upsert_country<'e, E>(db: E, name: &str, code: &str) -> Result<(Uuid, bool), sqlx::Error>
where
    E: PgExecutor<'e> + Copy,
{
    let inserted: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO countries (name, code, status) VALUES ($1, $2, 1)
         ON CONFLICT (code) DO NOTHING RETURNING id",
    )
    .bind(name)
    .bind(code)
    .fetch_optional(db)
    .await?;
    match inserted {
        Some(id) => Ok((id, true)),
        None => sqlx::query_scalar("SELECT id FROM countries WHERE code = $1")
            .bind(code)
            .fetch_one(db)
            .await
            .map(|id| (id, false)),
    }
}

// States

pub async fn list_states(
    db: &PgPool,
    country_id: Option<Uuid>,
    page: &PageQuery,
) -> Result<(Vec<State>, i64), sqlx::Error> {
    let list_sql = format!(
        "SELECT {STATE_COLUMNS} FROM states
         WHERE ($1::UUID IS NULL OR country_id = $1)
         ORDER BY name LIMIT $2 OFFSET $3"
    );
    let (total, rows) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM states WHERE ($1::UUID IS NULL OR country_id = $1)"
        )
        .bind(country_id)
        .fetch_one(db),
        sqlx::query_as::<_, State>(&list_sql)
        .bind(country_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(db),
    )?;
    Ok((rows, total))
}

pub async fn find_state(db: &PgPool, id: Uuid) -> Result<Option<State>, sqlx::Error> {
    sqlx::query_as::<_, State>(&format!("SELECT {STATE_COLUMNS} FROM states WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create_state(
    db: &PgPool,
    country_id: Uuid,
    name: &str,
    status: i16,
) -> Result<State, sqlx::Error> {
    sqlx::query_as::<_, State>(&format!(
        "INSERT INTO states (country_id, name, status) VALUES ($1, $2, $3) RETURNING {STATE_COLUMNS}"
    ))
    .bind(country_id)
    .bind(name)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn update_state(
    db: &PgPool,
    id: Uuid,
    country_id: Option<Uuid>,
    name: Option<&str>,
    status: Option<i16>,
) -> Result<State, sqlx::Error> {
    sqlx::query_as::<_, State>(&format!(
        "UPDATE states SET
            country_id = COALESCE($2, country_id),
            name       = COALESCE($3, name),
            status     = COALESCE($4, status),
            updated_at = now()
         WHERE id = $1
         RETURNING {STATE_COLUMNS}"
    ))
    .bind(id)
    .bind(country_id)
    .bind(name)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn delete_state(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM states WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn upsert_state<'e, E>(
    db: E,
    country_id: Uuid,
    name: &str,
) -> Result<(Uuid, bool), sqlx::Error>
where
    E: PgExecutor<'e> + Copy,
{
    let inserted: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO states (country_id, name, status) VALUES ($1, $2, 1)
         ON CONFLICT (country_id, name) DO NOTHING RETURNING id",
    )
    .bind(country_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    match inserted {
        Some(id) => Ok((id, true)),
        None => sqlx::query_scalar("SELECT id FROM states WHERE country_id = $1 AND name = $2")
            .bind(country_id)
            .bind(name)
            .fetch_one(db)
            .await
            .map(|id| (id, false)),
    }
}

// Cities

pub async fn list_cities(
    db: &PgPool,
    state_id: Option<Uuid>,
    page: &PageQuery,
) -> Result<(Vec<City>, i64), sqlx::Error> {
    let list_sql = format!(
        "SELECT {CITY_COLUMNS} FROM cities
         WHERE ($1::UUID IS NULL OR state_id = $1)
         ORDER BY name LIMIT $2 OFFSET $3"
    );
    let (total, rows) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cities WHERE ($1::UUID IS NULL OR state_id = $1)"
        )
        .bind(state_id)
        .fetch_one(db),
        sqlx::query_as::<_, City>(&list_sql)
        .bind(state_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(db),
    )?;
    Ok((rows, total))
}

pub async fn find_city(db: &PgPool, id: Uuid) -> Result<Option<City>, sqlx::Error> {
    sqlx::query_as::<_, City>(&format!("SELECT {CITY_COLUMNS} FROM cities WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create_city(
    db: &PgPool,
    state_id: Uuid,
    name: &str,
    status: i16,
) -> Result<City, sqlx::Error> {
    sqlx::query_as::<_, City>(&format!(
        "INSERT INTO cities (state_id, name, status) VALUES ($1, $2, $3) RETURNING {CITY_COLUMNS}"
    ))
    .bind(state_id)
    .bind(name)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn update_city(
    db: &PgPool,
    id: Uuid,
    state_id: Option<Uuid>,
    name: Option<&str>,
    status: Option<i16>,
) -> Result<City, sqlx::Error> {
    sqlx::query_as::<_, City>(&format!(
        "UPDATE cities SET
            state_id   = COALESCE($2, state_id),
            name       = COALESCE($3, name),
            status     = COALESCE($4, status),
            updated_at = now()
         WHERE id = $1
         RETURNING {CITY_COLUMNS}"
    ))
    .bind(id)
    .bind(state_id)
    .bind(name)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn delete_city(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM cities WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn upsert_city<'e, E>(db: E, state_id: Uuid, name: &str) -> Result<(Uuid, bool), sqlx::Error>
where
    E: PgExecutor<'e> + Copy,
{
    let inserted: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO cities (state_id, name, status) VALUES ($1, $2, 1)
         ON CONFLICT (state_id, name) DO NOTHING RETURNING id",
    )
    .bind(state_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    match inserted {
        Some(id) => Ok((id, true)),
        None => sqlx::query_scalar("SELECT id FROM cities WHERE state_id = $1 AND name = $2")
            .bind(state_id)
            .bind(name)
            .fetch_one(db)
            .await
            .map(|id| (id, false)),
    }
}
