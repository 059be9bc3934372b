//! HTTP surface for the daily report.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::auth;
use crate::error::{Error, Result};
use crate::report::{DailyReportOutcome, DailyReportRequest};
use crate::AdPulse;

pub fn router(app: Arc<AdPulse>) -> Router {
    Router::new()
        .route("/api/ai/daily-report", post(daily_report))
        .route("/api/health", get(health))
        .with_state(app)
}

pub async fn serve(app: Arc<AdPulse>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("failed to bind {addr}: {e}")))?;
    log::info!("Listening on http://{addr}");
    axum::serve(listener, router(app))
        .await
        .map_err(|e| Error::Other(format!("server error: {e}")))
}

// ── Handlers ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DailyReportResponse {
    success: bool,
    #[serde(flatten)]
    outcome: DailyReportOutcome,
}

async fn daily_report(
    State(app): State<Arc<AdPulse>>,
    headers: HeaderMap,
    body: std::result::Result<Json<DailyReportRequest>, JsonRejection>,
) -> std::result::Result<Json<DailyReportResponse>, ApiError> {
    let user_id = auth::authenticate(app.db(), &headers, Utc::now()).await?;
    let Json(request) = body.map_err(|e| Error::Validation(e.body_text()))?;

    let outcome = app.daily_report(&user_id, request).await?;
    Ok(Json(DailyReportResponse {
        success: true,
        outcome,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "Brand not found"),
            Error::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate daily report",
            ),
        };
        if status.is_server_error() {
            log::error!("Daily report request failed: {}", self.0);
        }

        let body = Json(ErrorBody {
            error,
            details: self.0.to_string(),
        });
        let mut response = (status, body).into_response();
        if let Error::RateLimited { retry_after, .. } = &self.0 {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
