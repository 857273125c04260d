use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::{error::ApiError, state::AppState, users::repo as users};

pub const TOKEN_COOKIE: &str = "token";

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const OFFTAKER: &str = "offtaker";
pub const INVESTOR: &str = "investor";

/// Roles allowed to manage records through the admin API.
pub const MANAGERS: &[&str] = &[SUPER_ADMIN, ADMIN];

/// Authenticated, active user. The row is re-read on every request so a
/// deactivated or deleted account is rejected on its next call.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn has_role(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|r| *r == self.role)
    }

    pub fn require_role(&self, allowed: &[&str]) -> Result<(), ApiError> {
        if self.has_role(allowed) {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %self.role, ?allowed, "role not permitted");
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }
}

/// Bearer token from the Authorization header, falling back to the `token` cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"));
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify_access(&token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                return Err(ApiError::unauthorized("Invalid or expired token"));
            }
        };

        let user = users::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for unknown user");
                ApiError::unauthorized("User not found")
            })?;

        if !user.is_active() {
            warn!(user_id = %user.id, "inactive user rejected");
            return Err(ApiError::forbidden("Account is inactive"));
        }

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=zzz"));
        assert_eq!(token_from_headers(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def; lang=en"),
        );
        assert_eq!(token_from_headers(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(matches!(token_from_headers(&headers), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn nothing_is_rejected() {
        assert!(matches!(
            token_from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn role_checks() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "o@example.com".into(),
            role: OFFTAKER.into(),
        };
        assert!(user.has_role(&[OFFTAKER, INVESTOR]));
        assert!(matches!(user.require_role(MANAGERS), Err(ApiError::Forbidden(_))));
    }
}
