// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer session endpoints.
//!
//! A session mirrors one open transfer form: the recipient field is
//! resolved as the user types, the form is turned into an order, and the
//! order is priced. Closing the session cancels anything still in flight.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        CreateSessionResponse, EstimateRequest, EstimateResponse, OrderResponse, ResolveRequest,
        ResolveResponse, ResolvedTargetResponse, TransferIntentRequest,
    },
    state::AppState,
    transfer::{TransferIntent, TransferSession},
};

#[derive(Deserialize, IntoParams)]
pub struct FeeQuery {
    /// Only return a quote computed for this order.
    pub order_hash: Option<String>,
}

fn find_session(state: &AppState, session_id: Uuid) -> Result<Arc<TransferSession>, ApiError> {
    state
        .session(session_id)
        .ok_or_else(|| ApiError::not_found(format!("session {session_id} not found")))
}

#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "Sessions",
    responses((status = 201, body = CreateSessionResponse))
)]
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let session = Arc::new(TransferSession::new(state.client.clone(), &state.settings));
    let response = CreateSessionResponse {
        session_id: session.id,
        created_at: session.created_at,
    };
    state.sessions.insert(session);
    info!(session_id = %response.session_id, "Transfer session opened");
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session to close")
    ),
    tag = "Sessions",
    responses((status = 204), (status = 404))
)]
pub async fn close_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let session = state
        .sessions
        .remove(session_id)
        .ok_or_else(|| ApiError::not_found(format!("session {session_id} not found")))?;
    session.close();
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve the recipient input. An empty input clears the current target.
/// A request overtaken by a newer one for the same session answers 409.
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/resolve",
    params(
        ("session_id" = Uuid, Path, description = "Session the input belongs to")
    ),
    request_body = ResolveRequest,
    tag = "Sessions",
    responses(
        (status = 200, body = ResolveResponse),
        (status = 400, description = "Invalid address or domain"),
        (status = 404, description = "Unknown session or unlinked domain"),
        (status = 409, description = "Superseded by a newer input"),
        (status = 503, description = "Network unavailable")
    )
)]
pub async fn resolve_target(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let session = find_session(&state, session_id)?;
    let resolver = session.resolver();

    if request.input.trim().is_empty() {
        resolver.clear();
        return Ok(Json(ResolveResponse { target: None }));
    }

    let target = resolver
        .resolve(&request.input)
        .await?
        .ok_or_else(|| ApiError::conflict("superseded by a newer input"))?;
    Ok(Json(ResolveResponse {
        target: Some(ResolvedTargetResponse::new(target, state.is_testnet())),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}/target",
    params(
        ("session_id" = Uuid, Path, description = "Session to inspect")
    ),
    tag = "Sessions",
    responses((status = 200, body = ResolveResponse))
)]
pub async fn current_target(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let session = find_session(&state, session_id)?;
    Ok(Json(ResolveResponse {
        target: session
            .resolver()
            .current()
            .map(|t| ResolvedTargetResponse::new(t, state.is_testnet())),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/orders",
    params(
        ("session_id" = Uuid, Path, description = "Session the form belongs to")
    ),
    request_body = TransferIntentRequest,
    tag = "Sessions",
    responses(
        (status = 200, body = OrderResponse),
        (status = 400, description = "Invalid input"),
        (status = 422, description = "Insufficient balance")
    )
)]
pub async fn prepare_order(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<TransferIntentRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let session = find_session(&state, session_id)?;
    let intent = TransferIntent::try_from(request)?;
    let prepared = session.prepare(intent).await?;
    Ok(Json(OrderResponse::new(prepared, state.is_testnet())))
}

/// Price an order. A newer estimate for the same session supersedes this
/// one, which then answers with `fee: null`.
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/estimate",
    params(
        ("session_id" = Uuid, Path, description = "Session the order belongs to")
    ),
    request_body = EstimateRequest,
    tag = "Sessions",
    responses(
        (status = 200, body = EstimateResponse),
        (status = 400, description = "Malformed order")
    )
)]
pub async fn estimate_fee(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let session = find_session(&state, session_id)?;
    request
        .order
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let quote = session
        .estimator()
        .estimate(&request.order, &request.wallet, state.cached_fee_config())
        .await;
    Ok(Json(EstimateResponse {
        fee: quote.map(Into::into),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}/fee",
    params(
        ("session_id" = Uuid, Path, description = "Session to inspect"),
        FeeQuery
    ),
    tag = "Sessions",
    responses((status = 200, body = EstimateResponse))
)]
pub async fn latest_fee(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<FeeQuery>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let session = find_session(&state, session_id)?;
    let estimator = session.estimator();
    let quote = match query.order_hash.as_deref() {
        Some(hash) => estimator.quote_for(hash),
        None => estimator.quote(),
    };
    Ok(Json(EstimateResponse {
        fee: quote.map(Into::into),
    }))
}
