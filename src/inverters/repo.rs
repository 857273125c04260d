use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageQuery;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Inverter {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub inverter_type_id: Uuid,
    pub inverter_type_name: Option<String>,
    pub serial_number: String,
    pub model: Option<String>,
    pub capacity_kw: Option<Decimal>,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInverter {
    pub project_id: Uuid,
    pub inverter_type_id: Uuid,
    pub serial_number: String,
    pub model: Option<String>,
    pub capacity_kw: Option<Decimal>,
    pub status: i16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InverterChanges {
    pub project_id: Option<Uuid>,
    pub inverter_type_id: Option<Uuid>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub capacity_kw: Option<Decimal>,
    pub status: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InverterFilter {
    pub project_id: Option<Uuid>,
    pub inverter_type_id: Option<Uuid>,
    pub status: Option<i16>,
    pub search: Option<String>,
}

const SELECT_INVERTER: &str = r#"
    SELECT i.id, i.project_id, p.name AS project_name,
           i.inverter_type_id, t.name AS inverter_type_name,
           i.serial_number, i.model, i.capacity_kw, i.status,
           i.created_at, i.updated_at
    FROM inverters i
    LEFT JOIN projects p ON p.id = i.project_id
    LEFT JOIN inverter_types t ON t.id = i.inverter_type_id
"#;

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &InverterFilter) {
    qb.push(" WHERE TRUE");
    if let Some(project_id) = filter.project_id {
        qb.push(" AND i.project_id = ").push_bind(project_id);
    }
    if let Some(type_id) = filter.inverter_type_id {
        qb.push(" AND i.inverter_type_id = ").push_bind(type_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ").push_bind(status);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (i.serial_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.model ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn list(
    db: &PgPool,
    filter: &InverterFilter,
    page: &PageQuery,
) -> Result<(Vec<Inverter>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM inverters i");
    push_filter(&mut count, filter);

    let mut rows = QueryBuilder::new(SELECT_INVERTER);
    push_filter(&mut rows, filter);
    rows.push(" ORDER BY i.created_at DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let (total, inverters) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(db),
        rows.build_query_as::<Inverter>().fetch_all(db),
    )?;
    Ok((inverters, total))
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Inverter>, sqlx::Error> {
    sqlx::query_as::<_, Inverter>(&format!("{SELECT_INVERTER} WHERE i.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create(db: &PgPool, new: &NewInverter) -> Result<Inverter, sqlx::Error> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO inverters (project_id, inverter_type_id, serial_number, model, capacity_kw, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(new.project_id)
    .bind(new.inverter_type_id)
    .bind(&new.serial_number)
    .bind(&new.model)
    .bind(new.capacity_kw)
    .bind(new.status)
    .fetch_one(db)
    .await?;

    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    changes: &InverterChanges,
) -> Result<Inverter, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE inverters SET
            project_id       = COALESCE($2, project_id),
            inverter_type_id = COALESCE($3, inverter_type_id),
            serial_number    = COALESCE($4, serial_number),
            model            = COALESCE($5, model),
            capacity_kw      = COALESCE($6, capacity_kw),
            status           = COALESCE($7, status),
            updated_at       = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(changes.project_id)
    .bind(changes.inverter_type_id)
    .bind(&changes.serial_number)
    .bind(&changes.model)
    .bind(changes.capacity_kw)
    .bind(changes.status)
    .execute(db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM inverters WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
