// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exponential backoff for network reads.
//!
//! Each attempt that fails with a retryable [`ClientError`] is followed by a
//! delay of `min(base_delay * 2^attempt, max_delay)`. The delay is abandoned
//! as soon as the supplied cancellation token fires.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::ClientError;

/// Default maximum number of retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay for exponential backoff (100ms).
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;
/// Default maximum delay between retries (5 seconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Configuration for retry behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial request).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// No retries at all; used by tests that script exact call counts.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }
}

/// Builder for [`RetryConfig`].
#[derive(Clone, Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// The delay for attempt `n` will be `min(base_delay * 2^n, max_delay)`.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

/// Calculates the backoff duration for a given attempt.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt);
    let delay_ms = config
        .base_delay
        .as_millis()
        .saturating_mul(multiplier as u128);
    let capped_delay_ms = delay_ms.min(config.max_delay.as_millis()) as u64;
    Duration::from_millis(capped_delay_ms)
}

/// Run `op` until it succeeds, fails permanently, runs out of retries or
/// `cancel` fires. Cancellation yields [`ClientError::Cancelled`].
///
/// Only the backoff sleep is interrupted by `cancel`.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation: &'static str,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        // An in-flight request runs to completion; its result is dropped if
        // the caller cancelled meanwhile.
        let result = op().await;
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !error.is_retryable() => {
                debug!(operation, error = %error, "Non-retryable error, not retrying");
                return Err(error);
            }
            Err(error) if attempt >= config.max_retries => {
                warn!(
                    operation,
                    error = %error,
                    attempts = attempt + 1,
                    "Max retries exceeded"
                );
                return Err(error);
            }
            Err(error) => {
                let delay = calculate_backoff(attempt, config);
                warn!(
                    operation,
                    error = %error,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable error, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
