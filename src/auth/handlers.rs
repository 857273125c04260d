use axum::{
    extract::{FromRef, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RefreshRequest},
    extractors::{AuthUser, TOKEN_COOKIE},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_password_blocking},
};
use crate::{
    error::ApiError,
    extract::ApiJson,
    response::{ApiResponse, ApiResult},
    state::AppState,
    users::repo::{self as users, User},
    validation::{check_email, check_password, normalize_email},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .route("/auth/password", put(change_password))
}

fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{TOKEN_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}")
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, ApiError> {
    let access_token = keys.sign_access(user.id, &user.role_name)?;
    let refresh_token = keys.sign_refresh(user.id, &user.role_name)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.email = normalize_email(&payload.email);
    check_email(&payload.email)?;

    let user = match users::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active() {
        warn!(user_id = %user.id, "login for inactive account");
        return Err(ApiError::forbidden("Account is inactive"));
    }

    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, user)?;
    let cookie = session_cookie(&body.access_token, keys.access_ttl.as_secs());

    info!(user_id = %body.user.id, role = %body.user.role, "user logged in");
    Ok(([(SET_COOKIE, cookie)], ApiResponse::ok(body)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<AuthResponse> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::unauthorized("Invalid or expired refresh token")
    })?;

    let user = users::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    if !user.is_active() {
        return Err(ApiError::forbidden("Account is inactive"));
    }

    Ok(ApiResponse::ok(issue_tokens(&keys, user)?))
}

pub async fn logout() -> impl IntoResponse {
    (
        [(SET_COOKIE, session_cookie("", 0))],
        ApiResponse::message("Logged out"),
    )
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<User> {
    let user = users::find_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> ApiResult<serde_json::Value> {
    check_password(&payload.new_password)?;

    let user = users::find_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    if !verify_password_blocking(payload.current_password, user.password_hash).await? {
        warn!(user_id = %auth.id, "password change with wrong current password");
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let hash = hash_password_blocking(payload.new_password).await?;
    users::set_password(&state.db, auth.id, &hash).await?;
    info!(user_id = %auth.id, "password changed");
    Ok(ApiResponse::message("Password updated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        auth_routes().with_state(AppState::fake())
    }

    #[tokio::test]
    async fn login_rejects_malformed_email_before_lookup() {
        let res = app()
            .oneshot(
                Request::post("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"nope","password":"whatever1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let access = keys.sign_access(uuid::Uuid::new_v4(), "admin").unwrap();
        let res = auth_routes()
            .with_state(state)
            .oneshot(
                Request::post("/auth/refresh")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"refresh_token":"{access}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_token() {
        let res = app()
            .oneshot(Request::get("/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let res = app()
            .oneshot(Request::post("/auth/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
