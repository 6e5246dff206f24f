// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::{HeaderName, Request},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateSessionResponse, EstimateRequest, EstimateResponse, FeeQuoteResponse, OrderResponse,
        PendingTransactionResponse, RecordBroadcastRequest, RecordBroadcastResponse,
        ResolveRequest, ResolveResponse, ResolvedTargetResponse, TokenIntentRequest,
        TransferIntentRequest,
    },
    state::AppState,
    transfer::SignerKind,
};

pub mod health;
pub mod pending;
pub mod sessions;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/{session_id}", delete(sessions::close_session))
        .route("/sessions/{session_id}/resolve", post(sessions::resolve_target))
        .route("/sessions/{session_id}/target", get(sessions::current_target))
        .route("/sessions/{session_id}/orders", post(sessions::prepare_order))
        .route("/sessions/{session_id}/estimate", post(sessions::estimate_fee))
        .route("/sessions/{session_id}/fee", get(sessions::latest_fee))
        .route(
            "/pending",
            get(pending::list_pending).post(pending::record_broadcast),
        )
        .route(
            "/pending/{transaction_id}",
            get(pending::get_pending).delete(pending::remove_pending),
        )
        .route("/pending/{transaction_id}/sent", post(pending::mark_sent))
        .with_state(state.clone());

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        sessions::create_session,
        sessions::close_session,
        sessions::resolve_target,
        sessions::current_target,
        sessions::prepare_order,
        sessions::estimate_fee,
        sessions::latest_fee,
        pending::list_pending,
        pending::get_pending,
        pending::record_broadcast,
        pending::mark_sent,
        pending::remove_pending
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            CreateSessionResponse,
            ResolveRequest,
            ResolveResponse,
            ResolvedTargetResponse,
            SignerKind,
            TokenIntentRequest,
            TransferIntentRequest,
            OrderResponse,
            EstimateRequest,
            EstimateResponse,
            FeeQuoteResponse,
            PendingTransactionResponse,
            RecordBroadcastRequest,
            RecordBroadcastResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Sessions", description = "Recipient resolution, order building and fee estimation"),
        (name = "Pending", description = "Broadcast transfers awaiting confirmation")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::testing::{app_state, MockTonClient};

    fn app() -> Router {
        router(app_state(Arc::new(MockTonClient::new())))
    }

    #[tokio::test]
    async fn health_answers_with_request_id() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let app = app();
        let response = app
            .clone()
            .oneshot(Request::post("/v1/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let created: CreateSessionResponse = serde_json::from_slice(&bytes).unwrap();

        let uri = format!("/v1/sessions/{}", created.session_id);
        let response = app
            .clone()
            .oneshot(Request::delete(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(Request::delete(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let response = app()
            .oneshot(
                Request::post("/v1/pending")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"order\": 1}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/v1/sessions",
            "/v1/sessions/{session_id}/estimate",
            "/v1/pending/{transaction_id}/sent",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
