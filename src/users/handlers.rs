use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, StatusRequest, UpdateUserRequest},
    repo::{self, NewUser, User, UserChanges, UserFilter},
};
use crate::{
    auth::{extractors::MANAGERS, password::hash_password_blocking, AuthUser},
    error::{or_not_found, ApiError},
    extract::{ApiJson, ApiQuery},
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::{
        check_email, check_password, check_status, non_blank, normalize_email, required,
        required_str,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/status", patch(update_user_status))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> ApiResult<Paginated<User>> {
    auth.require_role(MANAGERS)?;
    let (items, total) = repo::list(&state.db, &filter, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    auth.require_role(MANAGERS)?;
    let user = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult<User> {
    auth.require_role(MANAGERS)?;

    let first_name = required_str(body.first_name, "first_name")?;
    let email = normalize_email(&required_str(body.email, "email")?);
    check_email(&email)?;
    let password = required(body.password, "password")?;
    check_password(&password)?;
    let role_id = required(body.role_id, "role_id")?;
    let status = check_status(body.status.unwrap_or(1), 1)?;

    if repo::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password_blocking(password).await?;
    let user = repo::create(
        &state.db,
        &NewUser {
            role_id,
            first_name,
            last_name: body.last_name,
            email,
            phone: body.phone,
            password_hash,
            status,
            address_line1: body.address_line1,
            address_line2: body.address_line2,
            city_id: body.city_id,
            state_id: body.state_id,
            country_id: body.country_id,
            zip_code: body.zip_code,
        },
    )
    .await?;

    info!(user_id = %user.id, role = %user.role_name, by = %auth.id, "user created");
    Ok(ApiResponse::created(user))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult<User> {
    auth.require_role(MANAGERS)?;

    let email = match body.email {
        Some(e) => {
            let e = normalize_email(&e);
            check_email(&e)?;
            Some(e)
        }
        None => None,
    };
    let password_hash = match body.password {
        Some(p) => {
            check_password(&p)?;
            Some(hash_password_blocking(p).await?)
        }
        None => None,
    };
    let status = body.status.map(|s| check_status(s, 1)).transpose()?;

    let user = repo::update(
        &state.db,
        id,
        &UserChanges {
            role_id: body.role_id,
            first_name: non_blank(body.first_name),
            last_name: body.last_name,
            email,
            phone: body.phone,
            password_hash,
            status,
            address_line1: body.address_line1,
            address_line2: body.address_line2,
            city_id: body.city_id,
            state_id: body.state_id,
            country_id: body.country_id,
            zip_code: body.zip_code,
        },
    )
    .await
    .map_err(or_not_found("User"))?;

    info!(user_id = %id, by = %auth.id, "user updated");
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state))]
pub async fn update_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<User> {
    auth.require_role(MANAGERS)?;
    let status = check_status(required(body.status, "status")?, 1)?;
    if id == auth.id && status == 0 {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }
    let user = repo::set_status(&state.db, id, status)
        .await
        .map_err(or_not_found("User"))?;
    info!(user_id = %id, status, by = %auth.id, "user status changed");
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if id == auth.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    info!(user_id = %id, by = %auth.id, "user deleted");
    Ok(ApiResponse::message("User deleted"))
}
