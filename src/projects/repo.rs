use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageQuery;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub project_type: String,
    pub offtaker_id: Uuid,
    pub offtaker_name: Option<String>,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub capacity_kw: Option<Decimal>,
    pub investor_profit_share: Option<Decimal>,
    pub sunshare_profit_share: Option<Decimal>,
    pub offtaker_profit_share: Option<Decimal>,
    pub status: i16,
    pub is_deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub project_type: String,
    pub offtaker_id: Uuid,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub capacity_kw: Option<Decimal>,
    pub investor_profit_share: Option<Decimal>,
    pub sunshare_profit_share: Option<Decimal>,
    pub offtaker_profit_share: Option<Decimal>,
    pub status: i16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub project_type: Option<String>,
    pub offtaker_id: Option<Uuid>,
    pub address: Option<String>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub capacity_kw: Option<Decimal>,
    pub investor_profit_share: Option<Decimal>,
    pub sunshare_profit_share: Option<Decimal>,
    pub offtaker_profit_share: Option<Decimal>,
    pub status: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub status: Option<i16>,
    pub offtaker_id: Option<Uuid>,
    pub project_type: Option<String>,
}

const SELECT_PROJECT: &str = r#"
    SELECT p.id, p.name, p.project_type, p.offtaker_id,
           NULLIF(TRIM(CONCAT_WS(' ', u.first_name, u.last_name)), '') AS offtaker_name,
           p.address, p.city_id, p.state_id, p.country_id, p.capacity_kw,
           p.investor_profit_share, p.sunshare_profit_share, p.offtaker_profit_share,
           p.status, p.is_deleted, p.created_at, p.updated_at
    FROM projects p
    LEFT JOIN users u ON u.id = p.offtaker_id
"#;

/// Soft-deleted rows never show up in lists.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProjectFilter) {
    qb.push(" WHERE p.is_deleted = FALSE");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND p.name ILIKE ")
            .push_bind(format!("%{}%", search.trim()));
    }
    if let Some(status) = filter.status {
        qb.push(" AND p.status = ").push_bind(status);
    }
    if let Some(offtaker_id) = filter.offtaker_id {
        qb.push(" AND p.offtaker_id = ").push_bind(offtaker_id);
    }
    if let Some(kind) = filter.project_type.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND p.project_type = ").push_bind(kind.to_string());
    }
}

pub async fn list(
    db: &PgPool,
    filter: &ProjectFilter,
    page: &PageQuery,
) -> Result<(Vec<Project>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM projects p");
    push_filter(&mut count, filter);

    let mut rows = QueryBuilder::new(SELECT_PROJECT);
    push_filter(&mut rows, filter);
    rows.push(" ORDER BY p.created_at DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let (total, projects) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(db),
        rows.build_query_as::<Project>().fetch_all(db),
    )?;
    Ok((projects, total))
}

/// Direct lookup, soft-deleted rows included.
pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!("{SELECT_PROJECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create(db: &PgPool, new: &NewProject) -> Result<Project, sqlx::Error> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO projects (name, project_type, offtaker_id, address, city_id, state_id,
                              country_id, capacity_kw, investor_profit_share,
                              sunshare_profit_share, offtaker_profit_share, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(&new.name)
    .bind(&new.project_type)
    .bind(new.offtaker_id)
    .bind(&new.address)
    .bind(new.city_id)
    .bind(new.state_id)
    .bind(new.country_id)
    .bind(new.capacity_kw)
    .bind(new.investor_profit_share)
    .bind(new.sunshare_profit_share)
    .bind(new.offtaker_profit_share)
    .bind(new.status)
    .fetch_one(db)
    .await?;

    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Soft-deleted projects are read-only; updating one reports `RowNotFound`.
pub async fn update(db: &PgPool, id: Uuid, changes: &ProjectChanges) -> Result<Project, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE projects SET
            name                  = COALESCE($2, name),
            project_type          = COALESCE($3, project_type),
            offtaker_id           = COALESCE($4, offtaker_id),
            address               = COALESCE($5, address),
            city_id               = COALESCE($6, city_id),
            state_id              = COALESCE($7, state_id),
            country_id            = COALESCE($8, country_id),
            capacity_kw           = COALESCE($9, capacity_kw),
            investor_profit_share = COALESCE($10, investor_profit_share),
            sunshare_profit_share = COALESCE($11, sunshare_profit_share),
            offtaker_profit_share = COALESCE($12, offtaker_profit_share),
            status                = COALESCE($13, status),
            updated_at            = now()
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(&changes.name)
    .bind(&changes.project_type)
    .bind(changes.offtaker_id)
    .bind(&changes.address)
    .bind(changes.city_id)
    .bind(changes.state_id)
    .bind(changes.country_id)
    .bind(changes.capacity_kw)
    .bind(changes.investor_profit_share)
    .bind(changes.sunshare_profit_share)
    .bind(changes.offtaker_profit_share)
    .bind(changes.status)
    .execute(db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn soft_delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE projects SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}
