//! Health check endpoint

use std::sync::OnceLock;
use std::time::Instant;

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Record service start time; first call wins.
pub fn mark_started() {
    STARTED_AT.get_or_init(Instant::now);
}

/// Service status
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when the service is running normally
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Service health check. No auth; use for availability monitoring.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    let uptime_seconds = STARTED_AT.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
    })
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok_and_version() {
        mark_started();
        let Json(resp) = health_check().await;
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.version, env!("CARGO_PKG_VERSION"));
    }
}
