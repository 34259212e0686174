use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthStatus {
    ok: bool,
}

/// GET / and GET /health_check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthStatus { ok: true }))
}
