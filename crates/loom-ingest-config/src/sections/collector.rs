// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collector scheduling configuration.

use loom_ingest_core::DEFAULT_RETAIN_COUNT;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
	/// Scopes processed concurrently per bucket.
	pub workers: usize,
	pub interval_secs: u64,
	pub maintenance_interval_secs: u64,
	/// Retention applied to buckets that do not set `retain_count`.
	pub default_retain_count: u32,
}

impl Default for CollectorConfig {
	fn default() -> Self {
		Self {
			workers: 4,
			interval_secs: 300,
			maintenance_interval_secs: 3600,
			default_retain_count: DEFAULT_RETAIN_COUNT,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CollectorConfigLayer {
	#[serde(default)]
	pub workers: Option<usize>,
	#[serde(default)]
	pub interval_secs: Option<u64>,
	#[serde(default)]
	pub maintenance_interval_secs: Option<u64>,
	#[serde(default)]
	pub default_retain_count: Option<u32>,
}

impl CollectorConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.workers.is_some() {
			self.workers = other.workers;
		}
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.maintenance_interval_secs.is_some() {
			self.maintenance_interval_secs = other.maintenance_interval_secs;
		}
		if other.default_retain_count.is_some() {
			self.default_retain_count = other.default_retain_count;
		}
	}

	pub fn finalize(self) -> CollectorConfig {
		let defaults = CollectorConfig::default();
		CollectorConfig {
			workers: self.workers.unwrap_or(defaults.workers),
			interval_secs: self.interval_secs.unwrap_or(defaults.interval_secs),
			maintenance_interval_secs: self
				.maintenance_interval_secs
				.unwrap_or(defaults.maintenance_interval_secs),
			default_retain_count: self
				.default_retain_count
				.unwrap_or(defaults.default_retain_count),
		}
	}
}
