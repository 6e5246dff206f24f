// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        parse_optional_address, PendingTransactionResponse, RecordBroadcastRequest,
        RecordBroadcastResponse,
    },
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/pending",
    tag = "Pending",
    responses((status = 200, body = [PendingTransactionResponse]))
)]
pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingTransactionResponse>>, ApiError> {
    let entries = state.pending.snapshot();
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/pending/{transaction_id}",
    params(
        ("transaction_id" = Uuid, Path, description = "Pending transaction to fetch")
    ),
    tag = "Pending",
    responses((status = 200, body = PendingTransactionResponse), (status = 404))
)]
pub async fn get_pending(
    Path(transaction_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PendingTransactionResponse>, ApiError> {
    let tx = state
        .pending
        .get(transaction_id)
        .ok_or_else(|| ApiError::not_found(format!("pending transaction {transaction_id} not found")))?;
    Ok(Json(tx.into()))
}

/// Record the outcome of a broadcast. A successful broadcast adds a
/// pending entry; a failed one is only logged.
#[utoipa::path(
    post,
    path = "/v1/pending",
    request_body = RecordBroadcastRequest,
    tag = "Pending",
    responses(
        (status = 201, body = RecordBroadcastResponse, description = "Entry added"),
        (status = 200, body = RecordBroadcastResponse, description = "Broadcast failed; nothing added"),
        (status = 400, description = "Malformed order")
    )
)]
pub async fn record_broadcast(
    State(state): State<AppState>,
    Json(request): Json<RecordBroadcastRequest>,
) -> Result<(StatusCode, Json<RecordBroadcastResponse>), ApiError> {
    let token_master = parse_optional_address("token_master", request.token_master.as_deref())?;
    let added = state
        .pending
        .record_broadcast(&request.order, &request.outcome, token_master)?;
    let status = if added.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RecordBroadcastResponse {
            transaction: added.map(Into::into),
        }),
    ))
}

/// The transfer showed up in the wallet history. The entry stays visible
/// for the grace window, then disappears.
#[utoipa::path(
    post,
    path = "/v1/pending/{transaction_id}/sent",
    params(
        ("transaction_id" = Uuid, Path, description = "Pending transaction observed on chain")
    ),
    tag = "Pending",
    responses((status = 204), (status = 404))
)]
pub async fn mark_sent(
    Path(transaction_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.pending.mark_sent(transaction_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop an entry. Removing an unknown id is not an error.
#[utoipa::path(
    delete,
    path = "/v1/pending/{transaction_id}",
    params(
        ("transaction_id" = Uuid, Path, description = "Pending transaction to drop")
    ),
    tag = "Pending",
    responses((status = 204))
)]
pub async fn remove_pending(
    Path(transaction_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.pending.remove(transaction_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::blockchain::Address;
    use crate::storage::{BroadcastOutcome, PendingStatus};
    use crate::testing::{app_state, MockTonClient};
    use crate::transfer::order::{build_native_order, NativeTransfer};
    use crate::transfer::Order;

    fn order() -> Order {
        build_native_order(NativeTransfer {
            target: Address::new(0, [2; 32]),
            bounce: true,
            amount: 250_000_000,
            amount_all: false,
            comment: Some("rent".to_string()),
            state_init: None,
        })
        .unwrap()
        .into()
    }

    fn success(seqno: u32) -> BroadcastOutcome {
        BroadcastOutcome::Success {
            seqno,
            hash: "cafe".to_string(),
            fees: 4_000_000,
        }
    }

    async fn record(state: &AppState, outcome: BroadcastOutcome) -> (StatusCode, RecordBroadcastResponse) {
        let (status, Json(body)) = record_broadcast(
            State(state.clone()),
            Json(RecordBroadcastRequest {
                order: order(),
                outcome,
                token_master: None,
            }),
        )
        .await
        .unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn successful_broadcast_is_listed() {
        let state = app_state(Arc::new(MockTonClient::new()));
        let (status, body) = record(&state, success(4)).await;
        assert_eq!(status, StatusCode::CREATED);
        let tx = body.transaction.unwrap();
        assert_eq!(tx.amount, "250000000");
        assert_eq!(tx.fees, "4000000");
        assert_eq!(tx.status, PendingStatus::Pending);
        assert_eq!(tx.counterparty, Some(Address::new(0, [2; 32]).to_raw()));

        let Json(listed) = list_pending(State(state.clone())).await.unwrap();
        assert_eq!(listed, vec![tx.clone()]);

        let Json(fetched) = get_pending(Path(tx.id), State(state)).await.unwrap();
        assert_eq!(fetched, tx);
    }

    #[tokio::test]
    async fn failed_broadcast_adds_nothing() {
        let state = app_state(Arc::new(MockTonClient::new()));
        let (status, body) = record(
            &state,
            BroadcastOutcome::Failure {
                reason: "rejected by network".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.transaction.is_none());
        assert!(state.pending.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sent_entry_expires_after_grace() {
        let state = app_state(Arc::new(MockTonClient::new()));
        let (_, body) = record(&state, success(4)).await;
        let id = body.transaction.unwrap().id;

        assert_eq!(
            mark_sent(Path(id), State(state.clone())).await.unwrap(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(state.pending.get(id).unwrap().status, PendingStatus::Sent);

        tokio::time::sleep(crate::storage::DEFAULT_GRACE_PERIOD + std::time::Duration::from_millis(10)).await;
        let err = get_pending(Path(id), State(state)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_ids() {
        let state = app_state(Arc::new(MockTonClient::new()));
        let id = Uuid::new_v4();
        let err = mark_sent(Path(id), State(state.clone())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(
            remove_pending(Path(id), State(state)).await.unwrap(),
            StatusCode::NO_CONTENT
        );
    }
}
