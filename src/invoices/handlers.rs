use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{InvoiceRequest, StatusRequest},
    repo::{self, Invoice, InvoiceFilter, MAX_STATUS},
};
use crate::{
    auth::{extractors::MANAGERS, AuthUser},
    error::{or_not_found, ApiError},
    extract::{ApiJson, ApiQuery},
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::{check_status, required},
};

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/invoices/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/invoices/:id/status", patch(update_invoice_status))
}

#[instrument(skip(state))]
pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
) -> ApiResult<Paginated<Invoice>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, &filter, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Invoice> {
    auth.require_role(MANAGERS)?;
    let invoice = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice not found"))?;
    Ok(ApiResponse::ok(invoice))
}

#[instrument(skip(state))]
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<InvoiceRequest>,
) -> ApiResult<Invoice> {
    auth.require_role(MANAGERS)?;
    let new = body.into_new()?;
    let invoice = repo::create(&state.db, &new).await?;
    info!(invoice_id = %invoice.id, number = %invoice.invoice_number, by = %auth.id, "invoice created");
    Ok(ApiResponse::created(invoice))
}

#[instrument(skip(state))]
pub async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<InvoiceRequest>,
) -> ApiResult<Invoice> {
    auth.require_role(MANAGERS)?;
    let changes = body.into_changes()?;
    let invoice = repo::update(&state.db, id, &changes)
        .await
        .map_err(or_not_found("Invoice"))?;
    info!(invoice_id = %id, by = %auth.id, "invoice updated");
    Ok(ApiResponse::ok(invoice))
}

#[instrument(skip(state))]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Invoice> {
    auth.require_role(MANAGERS)?;
    let status = check_status(required(body.status, "status")?, MAX_STATUS)?;
    if !repo::set_status(&state.db, id, status).await? {
        return Err(ApiError::not_found("Invoice not found"));
    }
    let invoice = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice not found"))?;
    info!(invoice_id = %id, status, by = %auth.id, "invoice status changed");
    Ok(ApiResponse::ok(invoice))
}

#[instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Invoice not found"));
    }
    info!(invoice_id = %id, by = %auth.id, "invoice deleted");
    Ok(ApiResponse::message("Invoice deleted"))
}
