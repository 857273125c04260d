use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{InverterRequest, StatusRequest},
    repo::{self, Inverter, InverterChanges, InverterFilter},
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

pub fn inverter_routes() -> Router<AppState> {
    Router::new()
        .route("/inverters", get(list_inverters).post(create_inverter))
        .route(
            "/inverters/:id",
            get(get_inverter).put(update_inverter).delete(delete_inverter),
        )
        .route("/inverters/:id/status", patch(update_inverter_status))
}

#[instrument(skip(state))]
pub async fn list_inverters(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<InverterFilter>,
) -> ApiResult<Paginated<Inverter>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, &filter, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_inverter(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Inverter> {
    auth.require_role(MANAGERS)?;
    let inverter = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inverter not found"))?;
    Ok(ApiResponse::ok(inverter))
}

#[instrument(skip(state))]
pub async fn create_inverter(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<InverterRequest>,
) -> ApiResult<Inverter> {
    auth.require_role(MANAGERS)?;
    let new = body.into_new()?;
    let inverter = repo::create(&state.db, &new).await?;
    info!(inverter_id = %inverter.id, serial = %inverter.serial_number, by = %auth.id, "inverter created");
    Ok(ApiResponse::created(inverter))
}

#[instrument(skip(state))]
pub async fn update_inverter(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<InverterRequest>,
) -> ApiResult<Inverter> {
    auth.require_role(MANAGERS)?;
    let changes = body.into_changes()?;
    let inverter = repo::update(&state.db, id, &changes)
        .await
        .map_err(or_not_found("Inverter"))?;
    info!(inverter_id = %id, by = %auth.id, "inverter updated");
    Ok(ApiResponse::ok(inverter))
}

#[instrument(skip(state))]
pub async fn update_inverter_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Inverter> {
    auth.require_role(MANAGERS)?;
    let status = check_status(required(body.status, "status")?, 1)?;
    let changes = InverterChanges {
        status: Some(status),
        ..Default::default()
    };
    let inverter = repo::update(&state.db, id, &changes)
        .await
        .map_err(or_not_found("Inverter"))?;
    info!(inverter_id = %id, status, by = %auth.id, "inverter status changed");
    Ok(ApiResponse::ok(inverter))
}

#[instrument(skip(state))]
pub async fn delete_inverter(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Inverter not found"));
    }
    info!(inverter_id = %id, by = %auth.id, "inverter deleted");
    Ok(ApiResponse::message("Inverter deleted"))
}
