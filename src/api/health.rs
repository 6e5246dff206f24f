// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Whether the v4 HTTP API answered ("ok" or "unavailable").
    pub network: String,
    /// Whether the account sync has cached a fee configuration
    /// ("ok" or "pending"). Informational; never degrades the status.
    pub fee_config: String,
    /// Open transfer sessions.
    pub sessions: usize,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_network(state: &AppState) -> bool {
    match state.client.get_last_block().await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Health check: network unavailable");
            false
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if the network answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let network_ok = check_network(&state).await;
    let fee_config_cached = state.cached_fee_config().is_some();
    let sessions = state.sessions.len();

    let response = ReadyResponse {
        status: if network_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            network: if network_ok { "ok" } else { "unavailable" }.to_string(),
            fee_config: if fee_config_cached { "ok" } else { "pending" }.to_string(),
            sessions,
        },
    };

    let status = if network_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{app_state, MockTonClient};

    #[tokio::test]
    async fn healthy_when_network_answers() {
        let state = app_state(Arc::new(MockTonClient::new()));
        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.network, "ok");
        assert_eq!(body.checks.fee_config, "pending");
    }

    #[tokio::test]
    async fn degraded_when_network_fails() {
        let client = Arc::new(MockTonClient::new());
        client.fail_next(1);
        let (status, Json(body)) = health(State(app_state(client))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.checks.network, "unavailable");
    }
}
