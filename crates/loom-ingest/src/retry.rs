// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::future::Future;
use std::time::Duration;

use loom_ingest_config::RetryConfig;
use tracing::warn;

use crate::object_store::ObjectStoreError;
use crate::sink::SinkError;

/// Error of an operation that may be worth retrying.
pub trait Retryable: std::fmt::Display {
	fn is_transient(&self) -> bool;

	fn timed_out(after: Duration) -> Self;
}

impl Retryable for ObjectStoreError {
	fn is_transient(&self) -> bool {
		ObjectStoreError::is_transient(self)
	}

	fn timed_out(after: Duration) -> Self {
		ObjectStoreError::Transient(format!("timed out after {}ms", after.as_millis()))
	}
}

impl Retryable for SinkError {
	fn is_transient(&self) -> bool {
		SinkError::is_transient(self)
	}

	fn timed_out(after: Duration) -> Self {
		SinkError::Transient(format!("timed out after {}ms", after.as_millis()))
	}
}

/// `base_delay * 2^(retry_count - 1)`, capped at `max_delay`.
pub fn calculate_backoff_delay(config: &RetryConfig, retry_count: u32) -> Duration {
	let exponent = retry_count.saturating_sub(1).min(31);
	let delay = config.base_delay().saturating_mul(1u32 << exponent);
	std::cmp::min(delay, config.max_delay())
}

/// Run `attempt` under the configured timeout, retrying transient failures
/// with exponential backoff. Permanent failures return immediately.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: &str, mut attempt: F) -> Result<T, E>
where
	E: Retryable,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let timeout = config.operation_timeout();
	let mut retry_count = 0u32;
	loop {
		let result = match tokio::time::timeout(timeout, attempt()).await {
			Ok(result) => result,
			Err(_) => Err(E::timed_out(timeout)),
		};
		match result {
			Ok(value) => return Ok(value),
			Err(e) if e.is_transient() && retry_count < config.max_retries => {
				retry_count += 1;
				let delay = calculate_backoff_delay(config, retry_count);
				warn!(
					operation,
					retry_count,
					max_retries = config.max_retries,
					delay_ms = delay.as_millis() as u64,
					error = %e,
					"Operation failed, scheduling retry"
				);
				tokio::time::sleep(delay).await;
			}
			Err(e) => return Err(e),
		}
	}
}
