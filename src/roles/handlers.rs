use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, Role};
use crate::{
    auth::{extractors::MANAGERS, AuthUser},
    error::{or_not_found, ApiError},
    extract::{ApiJson, ApiQuery},
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::{check_status, required, required_str},
};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct RoleFilter {
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<i16>,
}

pub fn role_routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/:id",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/roles/:id/status", patch(update_role_status))
}

/// Role names are stored as lowercase slugs (`super_admin`, `offtaker`).
fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

#[instrument(skip(state))]
pub async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<RoleFilter>,
) -> ApiResult<Paginated<Role>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, filter.status, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Role> {
    auth.require_role(MANAGERS)?;
    let role = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Role not found"))?;
    Ok(ApiResponse::ok(role))
}

#[instrument(skip(state))]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<RoleRequest>,
) -> ApiResult<Role> {
    auth.require_role(MANAGERS)?;
    let name = normalize_name(&required_str(body.name, "name")?);
    let status = check_status(body.status.unwrap_or(1), 1)?;

    if repo::find_by_name(&state.db, &name).await?.is_some() {
        return Err(ApiError::conflict("Role already exists"));
    }
    let role = repo::create(&state.db, &name, body.description.as_deref(), status).await?;
    info!(role_id = %role.id, name = %role.name, by = %auth.id, "role created");
    Ok(ApiResponse::created(role))
}

#[instrument(skip(state))]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> ApiResult<Role> {
    auth.require_role(MANAGERS)?;
    let name = body.name.as_deref().map(normalize_name).filter(|n| !n.is_empty());
    let status = body.status.map(|s| check_status(s, 1)).transpose()?;
    let role = repo::update(&state.db, id, name.as_deref(), body.description.as_deref(), status)
        .await
        .map_err(or_not_found("Role"))?;
    info!(role_id = %id, by = %auth.id, "role updated");
    Ok(ApiResponse::ok(role))
}

#[instrument(skip(state))]
pub async fn update_role_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Role> {
    auth.require_role(MANAGERS)?;
    let status = check_status(required(body.status, "status")?, 1)?;
    let role = repo::update(&state.db, id, None, None, Some(status))
        .await
        .map_err(or_not_found("Role"))?;
    Ok(ApiResponse::ok(role))
}

#[instrument(skip(state))]
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Role not found"));
    }
    info!(role_id = %id, by = %auth.id, "role deleted");
    Ok(ApiResponse::message("Role deleted"))
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn names_become_slugs() {
        assert_eq!(normalize_name(" Super Admin "), "super_admin");
        assert_eq!(normalize_name("off-taker"), "off_taker");
        assert_eq!(normalize_name("admin"), "admin");
    }
}
