use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo::{self, NewPayment, Payment, PaymentFilter};
use crate::{
    auth::{extractors::MANAGERS, AuthUser},
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    invoices,
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::required,
};

#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub method: Option<String>,
    pub reference: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
}

impl PaymentRequest {
    fn into_new(self) -> Result<NewPayment, ApiError> {
        let invoice_id = required(self.invoice_id, "invoice_id")?;
        let amount = required(self.amount, "amount")?;
        if amount <= Decimal::ZERO {
            return Err(ApiError::bad_request("amount must be greater than 0"));
        }
        let method = self
            .method
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        Ok(NewPayment {
            invoice_id,
            user_id: self.user_id,
            amount,
            method,
            reference: self.reference,
            paid_at: self.paid_at,
        })
    }
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/:id", get(get_payment).delete(delete_payment))
}

#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> ApiResult<Paginated<Payment>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, &filter, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    auth.require_role(MANAGERS)?;
    let payment = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    Ok(ApiResponse::ok(payment))
}

#[instrument(skip(state))]
pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<PaymentRequest>,
) -> ApiResult<Payment> {
    auth.require_role(MANAGERS)?;
    let new = body.into_new()?;

    if let Some(invoice) = invoices::repo::find_by_id(&state.db, new.invoice_id).await? {
        if invoice.status == invoices::repo::CANCELLED {
            warn!(invoice_id = %invoice.id, "payment against cancelled invoice");
            return Err(ApiError::bad_request("Invoice is cancelled"));
        }
    }

    let (payment, invoice_status) = repo::create(&state.db, &new)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice not found"))?;
    info!(
        payment_id = %payment.id,
        invoice_id = %payment.invoice_id,
        amount = %payment.amount,
        invoice_status,
        by = %auth.id,
        "payment recorded"
    );
    Ok(ApiResponse::created(payment))
}

#[instrument(skip(state))]
pub async fn delete_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Payment not found"));
    }
    info!(payment_id = %id, by = %auth.id, "payment deleted");
    Ok(ApiResponse::message("Payment deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_must_be_positive() {
        let req = PaymentRequest {
            invoice_id: Some(Uuid::new_v4()),
            amount: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn invoice_is_required() {
        let req = PaymentRequest {
            amount: Some(Decimal::new(500, 0)),
            ..Default::default()
        };
        assert_eq!(req.into_new().unwrap_err().to_string(), "invoice_id is required");
    }

    #[test]
    fn paid_at_parses_rfc3339() {
        let req: PaymentRequest = serde_json::from_str(
            r#"{"invoice_id":"6a1f4c2e-8a55-4f0e-9d33-1b2d3c4e5f60","amount":"250.00","paid_at":"2024-05-01T10:00:00Z"}"#,
        )
        .expect("parse");
        let new = req.into_new().expect("valid");
        assert_eq!(new.amount, Decimal::new(25000, 2));
        assert!(new.paid_at.is_some());
    }
}
