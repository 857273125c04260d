use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by route handlers, rendered as `{success: false, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadGateway(String),

    /// Generic message for the client, the detail is only shown in development.
    #[error("{message}")]
    Internal {
        message: String,
        detail: Option<String>,
    },
}

// Postgres SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message: "Internal server error".into(),
            detail: Some(detail.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Internal error detail carried on the response so the app layer can decide
/// whether to expose it (development only).
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Record not found"),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    tracing::warn!(error = %db, "unique constraint violated");
                    ApiError::conflict(match db.constraint() {
                        Some(c) => format!("Duplicate value violates {c}"),
                        None => "Duplicate value".to_string(),
                    })
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    tracing::warn!(error = %db, "foreign key violated");
                    ApiError::bad_request("Referenced record does not exist or is still in use")
                }
                _ => {
                    tracing::error!(error = %err, "database error");
                    ApiError::internal(&err)
                }
            },
            _ => {
                tracing::error!(error = %err, "database error");
                ApiError::internal(&err)
            }
        }
    }
}

/// Maps `RowNotFound` to a 404 naming the resource, everything else as usual.
pub fn or_not_found(what: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |e| match e {
        sqlx::Error::RowNotFound => ApiError::not_found(format!("{what} not found")),
        other => other.into(),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "internal error");
        ApiError::internal(format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({ "success": false, "message": self.to_string() });
        let mut res = (status, Json(body)).into_response();
        if let ApiError::Internal {
            detail: Some(detail),
            ..
        } = self
        {
            res.extensions_mut().insert(ErrorDetail(detail));
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_detail_travels_as_extension() {
        let res = ApiError::internal("connection refused").into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = res.extensions().get::<ErrorDetail>().expect("detail");
        assert_eq!(detail.0, "connection refused");
    }

    #[tokio::test]
    async fn renders_failure_envelope() {
        let res = ApiError::bad_request("offtaker_id is required").into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "offtaker_id is required");
        assert!(body.get("detail").is_none());
    }
}
