// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for the collector integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use loom_ingest::testing::{MemoryObjectStore, RecordingSink};
use loom_ingest::BucketProcessor;
use loom_ingest_config::RetryConfig;
use loom_ingest_core::ScopeKey;
use loom_ingest_db::testing::create_test_ledger;
use loom_ingest_db::LedgerStore;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-east-1";

pub struct Harness {
	pub store: Arc<MemoryObjectStore>,
	pub sink: Arc<RecordingSink>,
	pub ledger: Arc<LedgerStore>,
	pub processor: BucketProcessor,
}

pub fn fast_retry() -> RetryConfig {
	RetryConfig {
		max_retries: 3,
		base_delay_ms: 1,
		max_delay_ms: 10,
		operation_timeout_secs: 5,
	}
}

pub async fn harness() -> Harness {
	harness_with_ledger(create_test_ledger().await).await
}

pub async fn harness_with_ledger(ledger: LedgerStore) -> Harness {
	let store = Arc::new(MemoryObjectStore::new().with_page_size(3));
	let sink = Arc::new(RecordingSink::new());
	let ledger = Arc::new(ledger);
	let processor = BucketProcessor::new(store.clone(), ledger.clone(), sink.clone(), fast_retry());
	Harness {
		store,
		sink,
		ledger,
		processor,
	}
}

pub fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
	NaiveDate::from_ymd_opt(y, m, d)
}

pub fn gzip(data: &[u8]) -> Bytes {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(data).unwrap();
	Bytes::from(encoder.finish().unwrap())
}

/// `AWSLogs/<account>/CloudTrail/<region>/<date_path>/<name>`
pub fn trail_key(date_path: &str, name: &str) -> String {
	format!("AWSLogs/{ACCOUNT}/CloudTrail/{REGION}/{date_path}/{name}")
}

/// Gzipped CloudTrail file with one record per event name.
pub fn cloudtrail_object(event_names: &[&str]) -> Bytes {
	let records: Vec<serde_json::Value> = event_names
		.iter()
		.map(|name| serde_json::json!({"eventName": name, "eventSource": "ec2.amazonaws.com"}))
		.collect();
	gzip(serde_json::json!({ "Records": records }).to_string().as_bytes())
}

/// One GuardDuty finding per line.
pub fn guardduty_object(ids: &[&str]) -> Bytes {
	let lines: String = ids
		.iter()
		.map(|id| format!("{{\"id\":\"{id}\",\"type\":\"Recon:EC2/PortProbeUnprotectedPort\"}}\n"))
		.collect();
	Bytes::from(lines)
}

/// Every key recorded for `scope`, ascending.
pub async fn ledger_keys(ledger: &LedgerStore, scope: &ScopeKey) -> Vec<String> {
	let session = ledger.session(scope).await;
	let keys = session.oldest_keys(scope, u64::MAX).await.unwrap();
	keys
}
