use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;
use crate::utils::response::{error, success};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Reports whether the store answers. A failed or slow ping yields 503 so
/// callers see the outage instead of stale data.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let failure = match tokio::time::timeout(PING_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => {
            let payload = HealthPayload {
                status: "healthy",
                service: "bandstage-api",
                database: "ok",
                error: None,
            };
            return success(payload, "Health check successful");
        }
        Ok(Err(e)) => {
            warn!(error = ?e, "Health check: database ping failed");
            "Database ping failed"
        }
        Err(_) => {
            warn!(timeout_secs = PING_TIMEOUT.as_secs(), "Health check: database ping timed out");
            "Database ping timed out"
        }
    };

    let payload = HealthPayload {
        status: "degraded",
        service: "bandstage-api",
        database: "error",
        error: Some(failure),
    };
    error(
        "SERVICE_UNAVAILABLE",
        "Service is degraded",
        serde_json::to_value(payload).ok(),
        StatusCode::SERVICE_UNAVAILABLE,
    )
}
