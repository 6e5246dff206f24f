// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::PendingError;
use crate::transfer::TransferError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let message = format!("{}: {e}", e.user_message());
        match e {
            TransferError::DomainNotFound(_) => Self::not_found(message),
            TransferError::InsufficientBalance { .. } | TransferError::HardwareSigner(_) => {
                Self::unprocessable(message)
            }
            TransferError::NetworkUnavailable(_) => Self::service_unavailable(message),
            TransferError::Encoding(_) => Self::internal(message),
            TransferError::InvalidAddress(_)
            | TransferError::DomainInvalid(_)
            | TransferError::InvalidAmount(_)
            | TransferError::ZeroAmountRejected
            | TransferError::TooManyMessages(_) => Self::bad_request(message),
        }
    }
}

impl From<PendingError> for ApiError {
    fn from(e: PendingError) -> Self {
        match e {
            PendingError::DuplicateId(_) => Self::conflict(e.to_string()),
            PendingError::NotFound(_) => Self::not_found(e.to_string()),
            PendingError::InvalidOrder(_) => Self::bad_request(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
