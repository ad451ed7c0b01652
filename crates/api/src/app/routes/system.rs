use axum::{Json, http::StatusCode, response::IntoResponse};

pub async fn health() -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
        .into_response()
}
