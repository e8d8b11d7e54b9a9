// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry policy for object store and sink calls.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
	pub max_retries: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
	/// Timeout for a single list, get or forward call.
	pub operation_timeout_secs: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay_ms: 1000,
			max_delay_ms: 60_000,
			operation_timeout_secs: 30,
		}
	}
}

impl RetryConfig {
	pub fn base_delay(&self) -> Duration {
		Duration::from_millis(self.base_delay_ms)
	}

	pub fn max_delay(&self) -> Duration {
		Duration::from_millis(self.max_delay_ms)
	}

	pub fn operation_timeout(&self) -> Duration {
		Duration::from_secs(self.operation_timeout_secs)
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RetryConfigLayer {
	#[serde(default)]
	pub max_retries: Option<u32>,
	#[serde(default)]
	pub base_delay_ms: Option<u64>,
	#[serde(default)]
	pub max_delay_ms: Option<u64>,
	#[serde(default)]
	pub operation_timeout_secs: Option<u64>,
}

impl RetryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_retries.is_some() {
			self.max_retries = other.max_retries;
		}
		if other.base_delay_ms.is_some() {
			self.base_delay_ms = other.base_delay_ms;
		}
		if other.max_delay_ms.is_some() {
			self.max_delay_ms = other.max_delay_ms;
		}
		if other.operation_timeout_secs.is_some() {
			self.operation_timeout_secs = other.operation_timeout_secs;
		}
	}

	pub fn finalize(self) -> RetryConfig {
		let defaults = RetryConfig::default();
		RetryConfig {
			max_retries: self.max_retries.unwrap_or(defaults.max_retries),
			base_delay_ms: self.base_delay_ms.unwrap_or(defaults.base_delay_ms),
			max_delay_ms: self.max_delay_ms.unwrap_or(defaults.max_delay_ms),
			operation_timeout_secs: self
				.operation_timeout_secs
				.unwrap_or(defaults.operation_timeout_secs),
		}
	}
}
