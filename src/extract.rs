//! `Json` and `Query` wrappers whose rejections render as the failure
//! envelope instead of axum's plain-text bodies.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct ProjectBody {
        #[allow(dead_code)]
        offtaker_id: Option<Uuid>,
    }

    #[derive(Debug, Deserialize)]
    struct Page {
        #[allow(dead_code)]
        page: Option<i64>,
    }

    fn router() -> Router {
        Router::new()
            .route("/json", post(|ApiJson(_): ApiJson<ProjectBody>| async { "ok" }))
            .route("/query", get(|ApiQuery(_): ApiQuery<Page>| async { "ok" }))
    }

    async fn envelope(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn malformed_json_field_is_a_bad_request_envelope() {
        let req = Request::post("/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"offtaker_id": ""}"#))
            .unwrap();
        let res = router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = envelope(res).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("offtaker_id"));
    }

    #[tokio::test]
    async fn missing_content_type_is_a_bad_request_envelope() {
        let req = Request::post("/json").body(Body::from("{}")).unwrap();
        let res = router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(envelope(res).await["success"], false);
    }

    #[tokio::test]
    async fn bad_query_value_is_a_bad_request_envelope() {
        let req = Request::get("/query?page=abc").body(Body::empty()).unwrap();
        let res = router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(envelope(res).await["success"], false);
    }

    #[tokio::test]
    async fn valid_input_passes_through() {
        let req = Request::get("/query?page=2").body(Body::empty()).unwrap();
        let res = router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
