// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for the bucket processor.
//!
//! Tests cover:
//! - Ordered processing and ledger commits
//! - At-most-once forwarding across runs, unless reparsing
//! - Skip-on-error policy for unsupported compression and malformed records
//! - Fatal aborts (sink rejection, exhausted retries, schema mismatch)
//! - Cancellation at key boundaries
//! - Lower bound, suffix and discard filtering
//! - VPC flow log sub-scopes and post-run retention

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use common::*;
use loom_ingest::testing::RecordingSink;
use loom_ingest::{BucketProcessor, EventSink, IngestError, ScopeOutcome, SinkError};
use loom_ingest_core::{
	AccountSelection, BucketDescriptor, CancellationToken, DiscardRule, LogType, ParsedEvent,
};
use loom_ingest_db::testing::{create_test_ledger_with_version, create_test_pool};
use loom_ingest_db::{LedgerError, LedgerStore};

fn trail_bucket() -> BucketDescriptor {
	BucketDescriptor::new("trail", LogType::CloudTrail).with_only_logs_after(date(2024, 1, 1))
}

fn guardduty_bucket() -> BucketDescriptor {
	BucketDescriptor::new("findings", LogType::GuardDuty).with_only_logs_after(date(2024, 1, 1))
}

#[tokio::test]
async fn test_processes_keys_in_order_and_records_them() {
	let h = harness().await;
	let a = trail_key("2024/01/15", "a.json.gz");
	let b = trail_key("2024/01/15", "b.json.gz");
	h.store.insert("trail", b.clone(), cloudtrail_object(&["RunInstances"]));
	h.store.insert("trail", a.clone(), cloudtrail_object(&["ConsoleLogin", "AssumeRole"]));

	let descriptor = trail_bucket();
	let report = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();

	assert_eq!(report.scopes.len(), 1);
	let scope_report = &report.scopes[0];
	assert_eq!(scope_report.outcome, ScopeOutcome::Drained);
	assert_eq!(scope_report.keys_seen, 2);
	assert_eq!(scope_report.keys_processed, 2);
	assert_eq!(scope_report.events_forwarded, 3);

	assert_eq!(h.sink.keys(), vec![a.clone(), b.clone()]);
	let names: Vec<String> = h
		.sink
		.events()
		.iter()
		.map(|e| e.fields["eventName"].as_str().unwrap().to_string())
		.collect();
	assert_eq!(names, vec!["ConsoleLogin", "AssumeRole", "RunInstances"]);

	let scope = descriptor.account_scope(ACCOUNT, REGION);
	assert_eq!(ledger_keys(&h.ledger, &scope).await, vec![a, b]);
}

#[tokio::test]
async fn test_second_run_forwards_nothing_new() {
	let h = harness().await;
	let a = trail_key("2024/01/15", "a.json.gz");
	let b = trail_key("2024/01/16", "b.json.gz");
	h.store.insert("trail", a.clone(), cloudtrail_object(&["A"]));
	h.store.insert("trail", b.clone(), cloudtrail_object(&["B"]));
	let descriptor = trail_bucket();
	let cancel = CancellationToken::new();

	h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(h.sink.events().len(), 2);

	h.sink.clear();
	h.store.clear_gets();
	let report = h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(report.keys_processed(), 0);
	assert!(h.sink.events().is_empty());
	assert!(h.store.gets().is_empty(), "processed keys must not be fetched again");

	let c = trail_key("2024/01/17", "c.json.gz");
	h.store.insert("trail", c.clone(), cloudtrail_object(&["C"]));
	h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(h.sink.keys(), vec![c]);
}

#[tokio::test]
async fn test_reparse_forwards_recorded_keys_again() {
	let h = harness().await;
	let a = trail_key("2024/01/15", "a.json.gz");
	let b = trail_key("2024/01/16", "b.json.gz");
	h.store.insert("trail", a.clone(), cloudtrail_object(&["A"]));
	h.store.insert("trail", b.clone(), cloudtrail_object(&["B"]));
	let cancel = CancellationToken::new();
	h.processor.run_bucket(&trail_bucket(), &cancel).await.unwrap();

	h.sink.clear();
	let descriptor = trail_bucket().with_reparse(true);
	let report = h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(report.keys_processed(), 2);
	assert_eq!(h.sink.keys(), vec![a.clone(), b.clone()]);

	let scope = descriptor.account_scope(ACCOUNT, REGION);
	assert_eq!(ledger_keys(&h.ledger, &scope).await, vec![a, b]);
}

#[tokio::test]
async fn test_unsupported_compression_skipped_and_recorded() {
	let h = harness().await;
	let key = "2024/02/01/findings.snappy".to_string();
	h.store.insert("findings", key.clone(), Bytes::from_static(b"\x00\x01snappy"));
	let descriptor = guardduty_bucket().with_skip_on_error(true);

	let report = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();

	let scope_report = &report.scopes[0];
	assert_eq!(scope_report.keys_processed, 1);
	assert_eq!(scope_report.keys_skipped, 1);
	assert_eq!(scope_report.events_forwarded, 0);
	assert!(h.sink.events().is_empty());
	assert_eq!(ledger_keys(&h.ledger, &descriptor.flat_scope()).await, vec![key]);
}

#[tokio::test]
async fn test_unsupported_compression_fatal_without_skip() {
	let h = harness().await;
	h.store.insert("findings", "2024/02/01/a.json", guardduty_object(&["f-1"]));
	h.store.insert("findings", "2024/02/01/b.snappy", Bytes::from_static(b"xx"));
	h.store.insert("findings", "2024/02/01/c.json", guardduty_object(&["f-2"]));
	let descriptor = guardduty_bucket();

	let err = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap_err();
	match &err {
		IngestError::UnsupportedCompression { key, suffix } => {
			assert_eq!(key, "2024/02/01/b.snappy");
			assert_eq!(suffix, "snappy");
		}
		other => panic!("expected unsupported compression, got {other:?}"),
	}

	assert_eq!(
		ledger_keys(&h.ledger, &descriptor.flat_scope()).await,
		vec!["2024/02/01/a.json"]
	);
	assert_eq!(h.sink.keys(), vec!["2024/02/01/a.json"]);
	assert!(h.ledger.last_successful_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_record_fatal_without_skip() {
	let h = harness().await;
	let key = "2024/03/01/findings.json";
	let data = "{\"id\":\"f-1\",\"type\":\"T\"}\nnot json\n{\"id\":\"f-2\",\"type\":\"T\"}\n";
	h.store.insert("findings", key, Bytes::from(data));
	let descriptor = guardduty_bucket();

	let err = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap_err();
	assert!(matches!(err, IngestError::Parse(_)));
	assert_eq!(err.key(), Some(key));
	assert!(ledger_keys(&h.ledger, &descriptor.flat_scope()).await.is_empty());
}

#[tokio::test]
async fn test_malformed_record_skipped_with_skip_on_error() {
	let h = harness().await;
	let key = "2024/03/01/findings.json";
	let data = "{\"id\":\"f-1\",\"type\":\"T\"}\nnot json\n{\"id\":\"f-2\",\"type\":\"T\"}\n";
	h.store.insert("findings", key, Bytes::from(data));
	let descriptor = guardduty_bucket().with_skip_on_error(true);

	let report = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(report.events_forwarded(), 2);
	assert_eq!(ledger_keys(&h.ledger, &descriptor.flat_scope()).await, vec![key]);
}

#[tokio::test]
async fn test_sink_rejection_aborts_without_marking_key() {
	let h = harness().await;
	h.store.insert("findings", "2024/04/01/a.json", guardduty_object(&["f-1"]));
	h.store.insert("findings", "2024/04/01/b.json", guardduty_object(&["f-2"]));
	h.store.insert("findings", "2024/04/01/c.json", guardduty_object(&["f-3"]));
	h.sink.fail_on_key(Some("2024/04/01/b.json".to_string()));
	let descriptor = guardduty_bucket();
	let cancel = CancellationToken::new();

	let err = h.processor.run_bucket(&descriptor, &cancel).await.unwrap_err();
	match &err {
		IngestError::Sink { sink, key, source } => {
			assert_eq!(sink, "recording");
			assert_eq!(key, "2024/04/01/b.json");
			assert!(matches!(source, SinkError::Permanent(_)));
		}
		other => panic!("expected sink error, got {other:?}"),
	}
	assert_eq!(
		ledger_keys(&h.ledger, &descriptor.flat_scope()).await,
		vec!["2024/04/01/a.json"]
	);

	h.sink.fail_on_key(None);
	h.sink.clear();
	h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(h.sink.keys(), vec!["2024/04/01/b.json", "2024/04/01/c.json"]);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
	let h = harness().await;
	let key = "2024/05/01/a.json";
	h.store.insert("findings", key, guardduty_object(&["f-1"]));
	h.store.fail_get(key, 2);
	h.store.fail_list(1);
	h.sink.fail_transiently(2);

	let report = h
		.processor
		.run_bucket(&guardduty_bucket(), &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(report.events_forwarded(), 1);
	assert_eq!(h.store.gets(), vec![key, key, key]);
}

#[tokio::test]
async fn test_exhausted_retries_are_fatal() {
	let h = harness().await;
	let key = "2024/05/01/a.json";
	h.store.insert("findings", key, guardduty_object(&["f-1"]));
	h.store.fail_get(key, 100);
	let descriptor = guardduty_bucket();

	let err = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap_err();
	assert!(matches!(err, IngestError::ObjectStore { .. }));
	assert_eq!(h.store.gets().len(), 4);
	assert!(ledger_keys(&h.ledger, &descriptor.flat_scope()).await.is_empty());
}

#[tokio::test]
async fn test_schema_version_mismatch_is_fatal() {
	let pool = create_test_pool().await;
	let descriptor = guardduty_bucket();
	{
		let h = harness_with_ledger(LedgerStore::with_schema_version(pool.clone(), "1.0.0")).await;
		h.store.insert("findings", "2024/06/01/a.json", guardduty_object(&["f-1"]));
		h.processor
			.run_bucket(&descriptor, &CancellationToken::new())
			.await
			.unwrap();
	}

	let h = harness_with_ledger(LedgerStore::with_schema_version(pool, "2.0.0")).await;
	h.store.insert("findings", "2024/06/02/b.json", guardduty_object(&["f-2"]));
	let err = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap_err();
	match err {
		IngestError::Ledger(LedgerError::SchemaVersion { stored, expected, .. }) => {
			assert_eq!(stored, "1.0.0");
			assert_eq!(expected, "2.0.0");
		}
		other => panic!("expected schema version error, got {other:?}"),
	}
	assert!(h.sink.events().is_empty());
}

/// Cancels the run after the first forwarded event.
struct CancellingSink {
	inner: RecordingSink,
	cancel: CancellationToken,
}

#[async_trait]
impl EventSink for CancellingSink {
	fn name(&self) -> &str {
		"cancelling"
	}

	async fn forward(&self, event: &ParsedEvent) -> Result<(), SinkError> {
		self.inner.forward(event).await?;
		self.cancel.cancel();
		Ok(())
	}
}

#[tokio::test]
async fn test_cancellation_finishes_current_key_then_stops() {
	let ledger = Arc::new(create_test_ledger_with_version("test").await);
	let store = Arc::new(loom_ingest::testing::MemoryObjectStore::new());
	store.insert("findings", "2024/07/01/a.json", guardduty_object(&["f-1", "f-2"]));
	store.insert("findings", "2024/07/01/b.json", guardduty_object(&["f-3"]));
	let cancel = CancellationToken::new();
	let sink = Arc::new(CancellingSink {
		inner: RecordingSink::new(),
		cancel: cancel.clone(),
	});
	let processor = BucketProcessor::new(store, ledger.clone(), sink.clone(), fast_retry());
	let descriptor = guardduty_bucket();

	let report = processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert!(report.cancelled());
	assert_eq!(report.scopes[0].outcome, ScopeOutcome::Cancelled);
	assert_eq!(sink.inner.events().len(), 2, "the in-flight key is finished");
	assert_eq!(
		ledger_keys(&ledger, &descriptor.flat_scope()).await,
		vec!["2024/07/01/a.json"]
	);
	assert!(ledger.last_successful_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lower_bound_and_suffix_filtering() {
	let h = harness().await;
	for key in [
		"2023/12/31/old.json",
		"2024/01/01/first.json",
		"2024/01/02/second.json",
		"2024/01/02/second.json.tmp",
	] {
		h.store.insert("findings", key, guardduty_object(&[key]));
	}
	let descriptor = guardduty_bucket().with_suffix(".json");

	let report = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(report.scopes[0].keys_seen, 2);
	assert_eq!(
		h.sink.keys(),
		vec!["2024/01/01/first.json", "2024/01/02/second.json"]
	);
}

#[tokio::test]
async fn test_default_lower_bound_is_today() {
	let h = harness().await;
	let today = Utc::now().date_naive().format("%Y/%m/%d").to_string();
	let fresh = format!("{today}/fresh.json");
	h.store.insert("findings", "2020/01/01/stale.json", guardduty_object(&["stale"]));
	h.store.insert("findings", fresh.clone(), guardduty_object(&["fresh"]));
	let descriptor = BucketDescriptor::new("findings", LogType::GuardDuty);

	h.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(h.sink.keys(), vec![fresh]);
}

#[tokio::test]
async fn test_discard_rule_drops_matching_events() {
	let h = harness().await;
	h.store.insert(
		"trail",
		trail_key("2024/01/15", "a.json.gz"),
		cloudtrail_object(&["DescribeInstances", "RunInstances", "DescribeVolumes"]),
	);
	let rule = DiscardRule::new("eventName", "^Describe").unwrap();
	let descriptor = trail_bucket().with_discard(Some(rule));

	let report = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(report.scopes[0].events_forwarded, 1);
	assert_eq!(report.scopes[0].events_discarded, 2);
	assert_eq!(h.sink.events()[0].fields["eventName"], "RunInstances");
}

#[tokio::test]
async fn test_scopes_are_partitioned_by_account_and_region() {
	let h = harness().await;
	let other = "210987654321";
	h.store.insert("trail", trail_key("2024/01/15", "a.json.gz"), cloudtrail_object(&["A"]));
	h.store.insert(
		"trail",
		format!("AWSLogs/{other}/CloudTrail/eu-west-1/2024/01/15/b.json.gz"),
		cloudtrail_object(&["B"]),
	);
	let descriptor = trail_bucket();

	let report = h
		.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(report.scopes.len(), 2);
	assert_eq!(h.sink.events().len(), 2);
	assert_eq!(
		ledger_keys(&h.ledger, &descriptor.account_scope(other, "eu-west-1"))
			.await
			.len(),
		1
	);

	let only = descriptor.with_accounts(AccountSelection::Only(vec![ACCOUNT.to_string()]));
	let scopes = h.processor.discover_scopes(&only).await.unwrap();
	assert_eq!(scopes, vec![only.account_scope(ACCOUNT, REGION)]);
}

fn flow_key(day: u32, flow_log_id: &str, n: u32) -> String {
	format!(
		"AWSLogs/{ACCOUNT}/vpcflowlogs/{REGION}/2024/01/{day:02}/\
		 {ACCOUNT}_vpcflowlogs_{REGION}_{flow_log_id}_202401{day:02}T00{n:02}Z_hash.log.gz"
	)
}

fn flow_object() -> Bytes {
	gzip(
		b"version account-id interface-id srcaddr dstaddr srcport dstport protocol packets bytes start end action log-status\n\
		  2 123456789012 eni-1 10.0.0.1 10.0.0.2 443 49152 6 10 840 1704153600 1704153660 ACCEPT OK\n",
	)
}

#[tokio::test]
async fn test_vpc_flow_logs_track_sub_scopes_and_retention() {
	let h = harness().await;
	for day in 1..=3 {
		h.store.insert("flows", flow_key(day, "fl-aaa", 0), flow_object());
		h.store.insert("flows", flow_key(day, "fl-bbb", 0), flow_object());
	}
	let descriptor = BucketDescriptor::new("flows", LogType::VpcFlow)
		.with_only_logs_after(date(2024, 1, 1))
		.with_retain_count(2);
	let cancel = CancellationToken::new();

	let report = h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(report.keys_processed(), 6);
	assert_eq!(report.scopes[0].entries_evicted, 2);

	let scopes = h.ledger.scopes().await.unwrap();
	let sub_scopes: Vec<&str> = scopes.iter().map(|s| s.sub_scope.as_str()).collect();
	assert_eq!(sub_scopes, vec!["fl-aaa", "fl-bbb"]);

	let base = descriptor.account_scope(ACCOUNT, REGION);
	let aaa = ledger_keys(&h.ledger, &base.with_sub_scope("fl-aaa")).await;
	assert_eq!(aaa, vec![flow_key(2, "fl-aaa", 0), flow_key(3, "fl-aaa", 0)]);

	let flow_ids: Vec<String> = h
		.sink
		.events()
		.iter()
		.map(|e| e.fields["flow_log_id"].as_str().unwrap().to_string())
		.collect();
	assert_eq!(flow_ids.iter().filter(|id| *id == "fl-aaa").count(), 3);

	h.sink.clear();
	let report = h.processor.run_bucket(&descriptor, &cancel).await.unwrap();
	assert_eq!(report.keys_processed(), 0, "evicted keys are not reprocessed");
	assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn test_run_success_is_recorded_per_scope() {
	let h = harness().await;
	h.store.insert("findings", "2024/08/01/a.json", guardduty_object(&["f-1", "f-2"]));
	let descriptor = guardduty_bucket();

	let before = Utc::now();
	h.processor
		.run_bucket(&descriptor, &CancellationToken::new())
		.await
		.unwrap();

	let runs = h.ledger.last_successful_runs().await.unwrap();
	assert_eq!(runs.len(), 1);
	assert_eq!(runs[0].scope, descriptor.flat_scope());
	assert_eq!(runs[0].keys_processed, 1);
	assert!(runs[0].last_success_at >= before - chrono::Duration::seconds(1));
}
