use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageQuery;

/// User row joined with its role name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub status: i16,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub zip_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub role_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub status: i16,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub zip_code: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub role_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub status: Option<i16>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role_id: Option<Uuid>,
    pub status: Option<i16>,
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.role_id, r.name AS role_name, u.first_name, u.last_name, u.email,
           u.phone, u.password_hash, u.status, u.address_line1, u.address_line2,
           u.city_id, u.state_id, u.country_id, u.zip_code, u.created_at, u.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (u.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(role_id) = filter.role_id {
        qb.push(" AND u.role_id = ").push_bind(role_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND u.status = ").push_bind(status);
    }
}

pub async fn list(
    db: &PgPool,
    filter: &UserFilter,
    page: &PageQuery,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users u");
    push_filter(&mut count, filter);

    let mut rows = QueryBuilder::new(SELECT_USER);
    push_filter(&mut rows, filter);
    rows.push(" ORDER BY u.created_at DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let (total, users) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(db),
        rows.build_query_as::<User>().fetch_all(db),
    )?;
    Ok((users, total))
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.email = $1"))
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn create(db: &PgPool, new: &NewUser) -> Result<User, sqlx::Error> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (role_id, first_name, last_name, email, phone, password_hash, status,
                           address_line1, address_line2, city_id, state_id, country_id, zip_code)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING id
        "#,
    )
    .bind(new.role_id)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.password_hash)
    .bind(new.status)
    .bind(&new.address_line1)
    .bind(&new.address_line2)
    .bind(new.city_id)
    .bind(new.state_id)
    .bind(new.country_id)
    .bind(&new.zip_code)
    .fetch_one(db)
    .await?;

    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Insert unless the email is taken. `None` when a user with that email exists.
pub async fn insert_if_missing(db: &PgPool, new: &NewUser) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO users (role_id, first_name, last_name, email, password_hash, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(new.role_id)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(new.status)
    .fetch_optional(db)
    .await
}

pub async fn update(db: &PgPool, id: Uuid, changes: &UserChanges) -> Result<User, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE users SET
            role_id       = COALESCE($2, role_id),
            first_name    = COALESCE($3, first_name),
            last_name     = COALESCE($4, last_name),
            email         = COALESCE($5, email),
            phone         = COALESCE($6, phone),
            password_hash = COALESCE($7, password_hash),
            status        = COALESCE($8, status),
            address_line1 = COALESCE($9, address_line1),
            address_line2 = COALESCE($10, address_line2),
            city_id       = COALESCE($11, city_id),
            state_id      = COALESCE($12, state_id),
            country_id    = COALESCE($13, country_id),
            zip_code      = COALESCE($14, zip_code),
            updated_at    = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(changes.role_id)
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(&changes.email)
    .bind(&changes.phone)
    .bind(&changes.password_hash)
    .bind(changes.status)
    .bind(&changes.address_line1)
    .bind(&changes.address_line2)
    .bind(changes.city_id)
    .bind(changes.state_id)
    .bind(changes.country_id)
    .bind(&changes.zip_code)
    .execute(db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn set_status(db: &PgPool, id: Uuid, status: i16) -> Result<User, sqlx::Error> {
    update(
        db,
        id,
        &UserChanges {
            status: Some(status),
            ..Default::default()
        },
    )
    .await
}

pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
    let res = sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Hard delete.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
