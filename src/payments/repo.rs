use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{invoices, pagination::PageQuery};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub invoice_number: Option<String>,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub method: Option<String>,
    pub reference: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub paid_at: OffsetDateTime,
    pub status: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub invoice_id: Uuid,
    pub user_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub paid_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Invoice fields needed to book a payment, read under a row lock.
#[derive(Debug, FromRow)]
pub struct InvoiceBalance {
    pub offtaker_id: Uuid,
    pub amount: Decimal,
    pub status: i16,
}

const SELECT_PAYMENT: &str = r#"
    SELECT pay.id, pay.invoice_id, inv.invoice_number, pay.user_id, pay.amount,
           pay.method, pay.reference, pay.paid_at, pay.status,
           pay.created_at, pay.updated_at
    FROM payments pay
    LEFT JOIN invoices inv ON inv.id = pay.invoice_id
"#;

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(invoice_id) = filter.invoice_id {
        qb.push(" AND pay.invoice_id = ").push_bind(invoice_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND pay.user_id = ").push_bind(user_id);
    }
}

pub async fn list(
    db: &PgPool,
    filter: &PaymentFilter,
    page: &PageQuery,
) -> Result<(Vec<Payment>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM payments pay");
    push_filter(&mut count, filter);

    let mut rows = QueryBuilder::new(SELECT_PAYMENT);
    push_filter(&mut rows, filter);
    rows.push(" ORDER BY pay.paid_at DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let (total, payments) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(db),
        rows.build_query_as::<Payment>().fetch_all(db),
    )?;
    Ok((payments, total))
}

pub async fn find_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as::<_, Payment>(&format!("{SELECT_PAYMENT} WHERE pay.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn lock_invoice(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> Result<Option<InvoiceBalance>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceBalance>(
        "SELECT offtaker_id, amount, status FROM invoices WHERE id = $1 FOR UPDATE",
    )
    .bind(invoice_id)
    .fetch_optional(conn)
    .await
}

pub async fn insert(
    conn: &mut PgConnection,
    new: &NewPayment,
    user_id: Uuid,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO payments (invoice_id, user_id, amount, method, reference, paid_at, status)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()), 1)
        RETURNING id
        "#,
    )
    .bind(new.invoice_id)
    .bind(user_id)
    .bind(new.amount)
    .bind(&new.method)
    .bind(&new.reference)
    .bind(new.paid_at)
    .fetch_one(conn)
    .await
}

pub async fn total_paid(conn: &mut PgConnection, invoice_id: Uuid) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1")
        .bind(invoice_id)
        .fetch_one(conn)
        .await
}

/// Recomputes the invoice status from its payments. Cancelled invoices keep
/// their status. Returns the status the invoice ends up in.
pub async fn refresh_invoice_status(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    balance: &InvoiceBalance,
) -> Result<i16, sqlx::Error> {
    if balance.status == invoices::repo::CANCELLED {
        return Ok(balance.status);
    }
    let paid = total_paid(&mut *conn, invoice_id).await?;
    let status = invoices::repo::status_for_paid(paid, balance.amount);
    if status != balance.status {
        invoices::repo::set_status(&mut *conn, invoice_id, status).await?;
    }
    Ok(status)
}

/// Books the payment and moves the invoice to paid or partially paid in one
/// transaction. `Ok(None)` when the invoice does not exist.
pub async fn create(db: &PgPool, new: &NewPayment) -> Result<Option<(Payment, i16)>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let Some(balance) = lock_invoice(&mut tx, new.invoice_id).await? else {
        return Ok(None);
    };
    let user_id = new.user_id.unwrap_or(balance.offtaker_id);
    let id = insert(&mut tx, new, user_id).await?;
    let status = refresh_invoice_status(&mut tx, new.invoice_id, &balance).await?;
    let payment = find_by_id(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    tx.commit().await?;
    Ok(Some((payment, status)))
}

/// Removes the payment and recomputes the invoice status in one transaction.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let mut tx = db.begin().await?;

    let invoice_id: Option<Uuid> =
        sqlx::query_scalar("DELETE FROM payments WHERE id = $1 RETURNING invoice_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(invoice_id) = invoice_id else {
        return Ok(false);
    };
    if let Some(balance) = lock_invoice(&mut tx, invoice_id).await? {
        refresh_invoice_status(&mut tx, invoice_id, &balance).await?;
    }

    tx.commit().await?;
    Ok(true)
}
