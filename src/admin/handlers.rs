use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::{
    auth::{extractors::SUPER_ADMIN, AuthUser},
    error::ApiError,
    migrate::{self, DownReport, MigrationStatus},
    response::{ApiResponse, ApiResult},
    seed::{self, SeedOptions, SeedReport},
    state::AppState,
};

const SUPER_ADMIN_ONLY: &[&str] = &[SUPER_ADMIN];

#[derive(Debug, Default, Deserialize)]
pub struct UpRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownRequest {
    pub steps: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedRequest {
    #[serde(default)]
    pub demo: bool,
    #[serde(default)]
    pub force_password: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct UpResult {
    pub applied: Vec<String>,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/migrations", get(migration_status))
        .route("/admin/migrations/up", post(migrate_up))
        .route("/admin/migrations/down", post(migrate_down))
        .route("/admin/seed", post(run_seed))
}

#[instrument(skip(state))]
pub async fn migration_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<MigrationStatus> {
    auth.require_role(SUPER_ADMIN_ONLY)?;
    let status = migrate::postgres(state.db.clone(), &state.config.migrations_dir)
        .status()
        .await?;
    Ok(ApiResponse::ok(status))
}

#[instrument(skip(state))]
pub async fn migrate_up(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<UpRequest>>,
) -> ApiResult<UpResult> {
    auth.require_role(SUPER_ADMIN_ONLY)?;
    let Json(body) = body.unwrap_or_default();
    let applied = migrate::postgres(state.db.clone(), &state.config.migrations_dir)
        .up(body.limit)
        .await?;
    info!(count = applied.len(), by = %auth.id, "migrations applied from admin api");
    Ok(ApiResponse::ok(UpResult { applied }))
}

#[instrument(skip(state))]
pub async fn migrate_down(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<DownRequest>>,
) -> ApiResult<DownReport> {
    auth.require_role(SUPER_ADMIN_ONLY)?;
    let Json(body) = body.unwrap_or_default();
    let steps = body.steps.unwrap_or(1);
    if steps == 0 {
        return Err(ApiError::bad_request("steps must be at least 1"));
    }
    let report = migrate::postgres(state.db.clone(), &state.config.migrations_dir)
        .down(steps)
        .await?;
    info!(reverted = report.reverted.len(), by = %auth.id, "migrations reverted from admin api");
    Ok(ApiResponse::ok(report))
}

#[instrument(skip(state))]
pub async fn run_seed(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<SeedRequest>>,
) -> ApiResult<SeedReport> {
    auth.require_role(SUPER_ADMIN_ONLY)?;
    let Json(body) = body.unwrap_or_default();
    let opts = SeedOptions {
        demo: body.demo,
        force_password: body.force_password,
    };
    let report = seed::run(&state.db, &state.config.seed, opts).await?;
    info!(by = %auth.id, "seed run from admin api");
    Ok(ApiResponse::ok(report))
}
