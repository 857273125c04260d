use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{pagination::PageQuery, payments};

pub const UNPAID: i16 = 0;
pub const PAID: i16 = 1;
pub const PARTIALLY_PAID: i16 = 2;
pub const CANCELLED: i16 = 3;

/// Highest valid invoice status.
pub const MAX_STATUS: i16 = CANCELLED;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub offtaker_id: Uuid,
    pub invoice_number: String,
    pub period_start: Option<Date>,
    pub period_end: Option<Date>,
    pub units_kwh: Option<Decimal>,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub due_date: Option<Date>,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub project_id: Uuid,
    pub offtaker_id: Uuid,
    pub invoice_number: String,
    pub period_start: Option<Date>,
    pub period_end: Option<Date>,
    pub units_kwh: Option<Decimal>,
    pub amount: Decimal,
    pub due_date: Option<Date>,
    pub status: i16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceChanges {
    pub project_id: Option<Uuid>,
    pub offtaker_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub period_start: Option<Date>,
    pub period_end: Option<Date>,
    pub units_kwh: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub due_date: Option<Date>,
    pub status: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub project_id: Option<Uuid>,
    pub offtaker_id: Option<Uuid>,
    pub status: Option<i16>,
    pub search: Option<String>,
}

const SELECT_INVOICE: &str = r#"
    SELECT inv.id, inv.project_id, p.name AS project_name, inv.offtaker_id,
           inv.invoice_number, inv.period_start, inv.period_end, inv.units_kwh,
           inv.amount,
           COALESCE((SELECT SUM(pay.amount) FROM payments pay WHERE pay.invoice_id = inv.id), 0)
               AS paid_amount,
           inv.due_date, inv.status, inv.created_at, inv.updated_at
    FROM invoices inv
    LEFT JOIN projects p ON p.id = inv.project_id
"#;

/// Status an invoice lands in once `paid` has been received against `amount`.
pub fn status_for_paid(paid: Decimal, amount: Decimal) -> i16 {
    if paid <= Decimal::ZERO {
        UNPAID
    } else if paid >= amount {
        PAID
    } else {
        PARTIALLY_PAID
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
    qb.push(" WHERE TRUE");
    if let Some(project_id) = filter.project_id {
        qb.push(" AND inv.project_id = ").push_bind(project_id);
    }
    if let Some(offtaker_id) = filter.offtaker_id {
        qb.push(" AND inv.offtaker_id = ").push_bind(offtaker_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND inv.status = ").push_bind(status);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND inv.invoice_number ILIKE ")
            .push_bind(format!("%{}%", search.trim()));
    }
}

pub async fn list(
    db: &PgPool,
    filter: &InvoiceFilter,
    page: &PageQuery,
) -> Result<(Vec<Invoice>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM invoices inv");
    push_filter(&mut count, filter);

    let mut rows = QueryBuilder::new(SELECT_INVOICE);
    push_filter(&mut rows, filter);
    rows.push(" ORDER BY inv.created_at DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let (total, invoices) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(db),
        rows.build_query_as::<Invoice>().fetch_all(db),
    )?;
    Ok((invoices, total))
}

pub async fn find_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE inv.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create(db: &PgPool, new: &NewInvoice) -> Result<Invoice, sqlx::Error> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO invoices (project_id, offtaker_id, invoice_number, period_start, period_end,
                              units_kwh, amount, due_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(new.project_id)
    .bind(new.offtaker_id)
    .bind(&new.invoice_number)
    .bind(new.period_start)
    .bind(new.period_end)
    .bind(new.units_kwh)
    .bind(new.amount)
    .bind(new.due_date)
    .bind(new.status)
    .fetch_one(db)
    .await?;

    find_by_id(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Applies the changes in one transaction. A new amount re-derives the status
/// from the payments already booked; cancelled invoices stay cancelled.
pub async fn update(db: &PgPool, id: Uuid, changes: &InvoiceChanges) -> Result<Invoice, sqlx::Error> {
    let mut tx = db.begin().await?;

    let res = sqlx::query(
        r#"
        UPDATE invoices SET
            project_id     = COALESCE($2, project_id),
            offtaker_id    = COALESCE($3, offtaker_id),
            invoice_number = COALESCE($4, invoice_number),
            period_start   = COALESCE($5, period_start),
            period_end     = COALESCE($6, period_end),
            units_kwh      = COALESCE($7, units_kwh),
            amount         = COALESCE($8, amount),
            due_date       = COALESCE($9, due_date),
            status         = COALESCE($10, status),
            updated_at     = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(changes.project_id)
    .bind(changes.offtaker_id)
    .bind(&changes.invoice_number)
    .bind(changes.period_start)
    .bind(changes.period_end)
    .bind(changes.units_kwh)
    .bind(changes.amount)
    .bind(changes.due_date)
    .bind(changes.status)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    if changes.amount.is_some() {
        if let Some(balance) = payments::repo::lock_invoice(&mut tx, id).await? {
            payments::repo::refresh_invoice_status(&mut tx, id, &balance).await?;
        }
    }
    let invoice = find_by_id(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    tx.commit().await?;
    Ok(invoice)
}

pub async fn set_status<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    status: i16,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE invoices SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
