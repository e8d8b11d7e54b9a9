// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Top-level configuration layer.

use serde::Deserialize;

use crate::sections::{
	BucketConfigLayer, CollectorConfigLayer, DatabaseConfigLayer, LoggingConfigLayer,
	RetryConfigLayer, SinkConfigLayer, StoreConfigLayer,
};

/// Partial configuration from one source, merged in precedence order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub collector: Option<CollectorConfigLayer>,
	#[serde(default)]
	pub retry: Option<RetryConfigLayer>,
	#[serde(default)]
	pub store: Option<StoreConfigLayer>,
	#[serde(default)]
	pub sink: Option<SinkConfigLayer>,
	/// Replaced wholesale by a higher-precedence source, never appended to.
	#[serde(default)]
	pub buckets: Option<Vec<BucketConfigLayer>>,
}

fn merge_section<T: Default>(slot: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	if let Some(other) = other {
		merge(slot.get_or_insert_with(T::default), other);
	}
}

impl IngestConfigLayer {
	pub fn merge(&mut self, other: IngestConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.collector, other.collector, CollectorConfigLayer::merge);
		merge_section(&mut self.retry, other.retry, RetryConfigLayer::merge);
		merge_section(&mut self.store, other.store, StoreConfigLayer::merge);
		merge_section(&mut self.sink, other.sink, SinkConfigLayer::merge);
		if other.buckets.is_some() {
			self.buckets = other.buckets;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_sections_field_by_field() {
		let mut base: IngestConfigLayer = toml::from_str(
			r#"
[collector]
workers = 2
interval_secs = 60

[[buckets]]
name = "a"
log_type = "cloudtrail"
"#,
		)
		.unwrap();
		let overlay = IngestConfigLayer {
			collector: Some(CollectorConfigLayer {
				workers: Some(16),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(overlay);

		let collector = base.collector.unwrap();
		assert_eq!(collector.workers, Some(16));
		assert_eq!(collector.interval_secs, Some(60));
		assert_eq!(base.buckets.unwrap().len(), 1);
	}

	#[test]
	fn test_merge_into_empty() {
		let mut base = IngestConfigLayer::default();
		base.merge(IngestConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite::memory:".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(base.database.unwrap().url.as_deref(), Some("sqlite::memory:"));
		assert!(base.logging.is_none());
	}
}
