use std::net::SocketAddr;

use axum::{
    body::Body,
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    admin, auth,
    error::ErrorDetail,
    inverter_types, inverters, invoices, locations, payments, projects,
    response::{ApiResponse, ApiResult},
    roles, settings,
    state::AppState,
    users,
};

const MAX_ERROR_BODY: usize = 64 * 1024;

async fn health() -> ApiResult<Value> {
    Ok(ApiResponse::ok(json!({ "status": "ok" })))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(users::router())
        .merge(roles::router())
        .merge(projects::router())
        .merge(inverter_types::router())
        .merge(inverters::router())
        .merge(invoices::router())
        .merge(payments::router())
        .merge(locations::router())
        .merge(settings::router())
        .merge(admin::router())
}

/// Adds the internal error detail to 500 bodies. Only installed in development.
async fn expose_error_detail(res: Response) -> Response {
    let Some(ErrorDetail(detail)) = res.extensions().get::<ErrorDetail>().cloned() else {
        return res;
    };
    let (parts, body) = res.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_ERROR_BODY).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let mut payload: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({}));
    payload["detail"] = Value::String(detail);

    let mut res = (parts.status, Json(payload)).into_response();
    res.headers_mut().extend(
        parts
            .headers
            .into_iter()
            .filter(|(name, _)| name.as_ref() != Some(&header::CONTENT_LENGTH)),
    );
    res
}

pub fn build_app(state: AppState) -> Router {
    let mut api = api_routes();
    if state.config.is_development() {
        api = api.layer(middleware::map_response(expose_error_detail));
    }

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
    let app = build_app(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn management_routes_require_auth() {
        for path in ["/api/users", "/api/projects", "/api/invoices", "/api/countries", "/api/settings"] {
            let app = build_app(AppState::fake());
            let res = app
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
            assert_eq!(body_json(res).await["success"], false);
        }
    }

    #[tokio::test]
    async fn internal_detail_only_in_development() {
        let failing = || async { crate::error::ApiError::internal("pool timed out") };

        let dev = Router::new()
            .route("/boom", get(failing))
            .layer(middleware::map_response(expose_error_detail));
        let res = dev
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["detail"], "pool timed out");

        let prod: Router = Router::new().route("/boom", get(failing));
        let res = prod
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_json(res).await.get("detail").is_none());
    }
}
