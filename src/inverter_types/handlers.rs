use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, InverterType};
use crate::{
    auth::{extractors::MANAGERS, AuthUser},
    error::{or_not_found, ApiError},
    extract::{ApiJson, ApiQuery},
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::{check_status, required_str},
};

#[derive(Debug, Deserialize)]
pub struct InverterTypeRequest {
    pub name: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct InverterTypeFilter {
    pub status: Option<i16>,
}

pub fn inverter_type_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/inverter-types",
            get(list_inverter_types).post(create_inverter_type),
        )
        .route(
            "/inverter-types/:id",
            get(get_inverter_type)
                .put(update_inverter_type)
                .delete(delete_inverter_type),
        )
}

#[instrument(skip(state))]
pub async fn list_inverter_types(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<InverterTypeFilter>,
) -> ApiResult<Paginated<InverterType>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, filter.status, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_inverter_type(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<InverterType> {
    auth.require_role(MANAGERS)?;
    let kind = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inverter type not found"))?;
    Ok(ApiResponse::ok(kind))
}

#[instrument(skip(state))]
pub async fn create_inverter_type(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<InverterTypeRequest>,
) -> ApiResult<InverterType> {
    auth.require_role(MANAGERS)?;
    let name = required_str(body.name, "name")?;
    let status = check_status(body.status.unwrap_or(1), 1)?;
    let kind = repo::create(&state.db, &name, status).await?;
    info!(inverter_type_id = %kind.id, name = %kind.name, by = %auth.id, "inverter type created");
    Ok(ApiResponse::created(kind))
}

#[instrument(skip(state))]
pub async fn update_inverter_type(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<InverterTypeRequest>,
) -> ApiResult<InverterType> {
    auth.require_role(MANAGERS)?;
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let status = body.status.map(|s| check_status(s, 1)).transpose()?;
    let kind = repo::update(&state.db, id, name.as_deref(), status)
        .await
        .map_err(or_not_found("Inverter type"))?;
    info!(inverter_type_id = %id, by = %auth.id, "inverter type updated");
    Ok(ApiResponse::ok(kind))
}

#[instrument(skip(state))]
pub async fn delete_inverter_type(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Inverter type not found"));
    }
    info!(inverter_type_id = %id, by = %auth.id, "inverter type deleted");
    Ok(ApiResponse::message("Inverter type deleted"))
}
