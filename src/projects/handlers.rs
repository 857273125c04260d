use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateProjectRequest, StatusRequest, UpdateProjectRequest},
    repo::{self, Project, ProjectChanges, ProjectFilter},
};
use crate::{
    auth::{
        extractors::{MANAGERS, OFFTAKER},
        AuthUser,
    },
    error::{or_not_found, ApiError},
    extract::{ApiJson, ApiQuery},
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    users,
    validation::{check_status, required},
};

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/status", patch(update_project_status))
}

/// The referenced user must exist and hold the offtaker role.
async fn ensure_offtaker(state: &AppState, offtaker_id: Uuid) -> Result<(), ApiError> {
    match users::repo::find_by_id(&state.db, offtaker_id).await? {
        Some(user) if user.role_name == OFFTAKER => Ok(()),
        Some(user) => {
            warn!(%offtaker_id, role = %user.role_name, "offtaker_id does not reference an offtaker");
            Err(ApiError::bad_request("offtaker_id must reference an offtaker"))
        }
        None => Err(ApiError::bad_request("Offtaker not found")),
    }
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> ApiResult<Paginated<Project>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, &filter, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Project> {
    auth.require_role(MANAGERS)?;
    let project = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    Ok(ApiResponse::ok(project))
}

#[instrument(skip(state, body))]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateProjectRequest>,
) -> ApiResult<Project> {
    auth.require_role(MANAGERS)?;
    let new = body.validate()?;
    ensure_offtaker(&state, new.offtaker_id).await?;

    let project = repo::create(&state.db, &new).await?;
    info!(project_id = %project.id, name = %project.name, by = %auth.id, "project created");
    Ok(ApiResponse::created(project))
}

#[instrument(skip(state, body))]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Project> {
    auth.require_role(MANAGERS)?;
    let current = repo::find_by_id(&state.db, id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let changes = body.validate(&current)?;
    if let Some(offtaker_id) = changes.offtaker_id {
        ensure_offtaker(&state, offtaker_id).await?;
    }

    let project = repo::update(&state.db, id, &changes)
        .await
        .map_err(or_not_found("Project"))?;
    info!(project_id = %id, by = %auth.id, "project updated");
    Ok(ApiResponse::ok(project))
}

#[instrument(skip(state))]
pub async fn update_project_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Project> {
    auth.require_role(MANAGERS)?;
    let status = check_status(required(body.status, "status")?, 1)?;
    let changes = ProjectChanges {
        status: Some(status),
        ..Default::default()
    };
    let project = repo::update(&state.db, id, &changes)
        .await
        .map_err(or_not_found("Project"))?;
    info!(project_id = %id, status, by = %auth.id, "project status changed");
    Ok(ApiResponse::ok(project))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::soft_delete(&state.db, id).await? {
        return Err(ApiError::not_found("Project not found"));
    }
    info!(project_id = %id, by = %auth.id, "project deleted");
    Ok(ApiResponse::message("Project deleted"))
}
