// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-scope ingestion: enumerate, filter, fetch, decompress, parse,
//! forward and record, then apply retention.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use loom_ingest_config::RetryConfig;
use loom_ingest_core::{
	AccountSelection, BucketDescriptor, CancellationToken, CandidateKey, KeyLayout, LogType, ScopeKey,
};
use loom_ingest_db::{LedgerStore, ScopeSession};
use loom_ingest_logs::{decompress, parse, should_discard, Decompressed, ParseContext};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::error::{IngestError, Result};
use crate::maintenance::maintain;
use crate::object_store::{ListRequest, ObjectStore};
use crate::retry::with_retry;
use crate::sink::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeOutcome {
	/// Every candidate key was handled and run success recorded.
	Drained,
	/// Stopped at a key boundary; the remaining keys are picked up next run.
	Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeRunReport {
	pub scope: ScopeKey,
	/// Candidates within the lower bound and suffix filter.
	pub keys_seen: usize,
	/// Keys newly recorded in the ledger during this run.
	pub keys_processed: usize,
	/// Keys recorded without forwarding anything, under skip-on-error.
	pub keys_skipped: usize,
	pub events_forwarded: usize,
	pub events_discarded: usize,
	pub entries_evicted: usize,
	pub outcome: ScopeOutcome,
}

impl ScopeRunReport {
	fn new(scope: ScopeKey) -> Self {
		Self {
			scope,
			keys_seen: 0,
			keys_processed: 0,
			keys_skipped: 0,
			events_forwarded: 0,
			events_discarded: 0,
			entries_evicted: 0,
			outcome: ScopeOutcome::Drained,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketRunReport {
	pub bucket: String,
	pub scopes: Vec<ScopeRunReport>,
}

impl BucketRunReport {
	pub fn keys_processed(&self) -> usize {
		self.scopes.iter().map(|s| s.keys_processed).sum()
	}

	pub fn events_forwarded(&self) -> usize {
		self.scopes.iter().map(|s| s.events_forwarded).sum()
	}

	pub fn cancelled(&self) -> bool {
		self.scopes
			.iter()
			.any(|s| s.outcome == ScopeOutcome::Cancelled)
	}
}

pub struct BucketProcessor {
	store: Arc<dyn ObjectStore>,
	ledger: Arc<LedgerStore>,
	sink: Arc<dyn EventSink>,
	retry: RetryConfig,
	workers: usize,
}

impl BucketProcessor {
	pub fn new(
		store: Arc<dyn ObjectStore>,
		ledger: Arc<LedgerStore>,
		sink: Arc<dyn EventSink>,
		retry: RetryConfig,
	) -> Self {
		Self {
			store,
			ledger,
			sink,
			retry,
			workers: 1,
		}
	}

	/// Number of scopes of one bucket processed concurrently.
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers.max(1);
		self
	}

	pub fn ledger(&self) -> &Arc<LedgerStore> {
		&self.ledger
	}

	/// Run every scope of `descriptor`.
	///
	/// A failing scope does not stop the others; the first failure is
	/// returned once all scopes have settled.
	#[instrument(skip(self, descriptor, cancel), fields(bucket = %descriptor.bucket, log_type = %descriptor.log_type))]
	pub async fn run_bucket(
		&self,
		descriptor: &BucketDescriptor,
		cancel: &CancellationToken,
	) -> Result<BucketRunReport> {
		let scopes = self.discover_scopes(descriptor).await?;
		info!(
			store = self.store.name(),
			scopes = scopes.len(),
			workers = self.workers,
			"Starting bucket run"
		);

		let results: Vec<(ScopeKey, Result<ScopeRunReport>)> = stream::iter(scopes)
			.map(|scope| async move {
				let result = self.run_scope(descriptor, &scope, cancel).await;
				(scope, result)
			})
			.buffer_unordered(self.workers)
			.collect()
			.await;

		let mut reports = Vec::with_capacity(results.len());
		let mut first_error = None;
		for (scope, result) in results {
			match result {
				Ok(report) => reports.push(report),
				Err(e) => {
					error!(scope = %scope, key = e.key().unwrap_or_default(), error = %e, "Scope run failed");
					first_error.get_or_insert(e);
				}
			}
		}
		if let Some(e) = first_error {
			return Err(e);
		}

		reports.sort_by(|a, b| a.scope.cmp(&b.scope));
		let report = BucketRunReport {
			bucket: descriptor.bucket.clone(),
			scopes: reports,
		};
		info!(
			keys_processed = report.keys_processed(),
			events_forwarded = report.events_forwarded(),
			cancelled = report.cancelled(),
			"Bucket run complete"
		);
		Ok(report)
	}

	/// Base scopes present in the bucket for the configured accounts and regions.
	pub async fn discover_scopes(&self, descriptor: &BucketDescriptor) -> Result<Vec<ScopeKey>> {
		if descriptor.log_type.layout() == KeyLayout::Flat {
			return Ok(vec![descriptor.flat_scope()]);
		}

		let accounts = match &descriptor.accounts {
			AccountSelection::Only(ids) => ids.clone(),
			AccountSelection::All => self
				.child_dirs(&descriptor.bucket, &descriptor.accounts_root())
				.await?
				.into_iter()
				.filter(|account| {
					let numeric = account.chars().all(|c| c.is_ascii_digit());
					if !numeric {
						debug!(account = %account, "ignoring non-account directory");
					}
					numeric
				})
				.collect(),
		};

		let mut scopes = Vec::new();
		for account in &accounts {
			let regions = if descriptor.regions.is_empty() {
				self.child_dirs(&descriptor.bucket, &descriptor.regions_root(account))
					.await?
			} else {
				descriptor.regions.clone()
			};
			scopes.extend(
				regions
					.iter()
					.map(|region| descriptor.account_scope(account, region)),
			);
		}
		if scopes.is_empty() {
			info!(bucket = %descriptor.bucket, "No scopes found in bucket");
		}
		Ok(scopes)
	}

	async fn child_dirs(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
		let prefixes = with_retry(&self.retry, "list", || self.store.common_prefixes(bucket, prefix))
			.await
			.map_err(|source| IngestError::ObjectStore {
				bucket: bucket.to_string(),
				key: prefix.to_string(),
				source,
			})?;
		Ok(prefixes
			.iter()
			.filter_map(|p| p.strip_prefix(prefix))
			.map(|s| s.trim_end_matches('/').to_string())
			.filter(|s| !s.is_empty())
			.collect())
	}

	/// Run one base scope to completion, cancellation or the first fatal error.
	///
	/// Holds the ledger session for the base scope throughout, so retention
	/// and other runs of the same scope wait for it.
	#[instrument(skip_all, fields(scope = %scope))]
	pub async fn run_scope(
		&self,
		descriptor: &BucketDescriptor,
		scope: &ScopeKey,
		cancel: &CancellationToken,
	) -> Result<ScopeRunReport> {
		let base = scope.base();
		let session = self.ledger.session(&base).await;
		session.ensure_schema_version(&base).await?;

		let root = descriptor.scope_root(&base);
		let lower = self.lower_bound(descriptor, &session, &root).await?;
		let floors = retention_floors(&session, descriptor.log_type).await?;
		let candidates = self.enumerate(descriptor, &root, lower).await?;

		let mut report = ScopeRunReport::new(base.clone());
		report.keys_seen = candidates.len();
		debug!(root = %root, lower_bound = %lower, candidates = candidates.len(), "Enumerated scope");

		let mut initialized: HashSet<ScopeKey> = HashSet::from([base.clone()]);
		for candidate in &candidates {
			if cancel.is_cancelled() {
				info!(keys_processed = report.keys_processed, "Scope run cancelled");
				report.outcome = ScopeOutcome::Cancelled;
				return Ok(report);
			}

			let key = candidate.key.as_str();
			let key_scope = base.with_sub_scope(descriptor.log_type.sub_scope_of(key));
			if !descriptor.reparse
				&& floors
					.get(&key_scope)
					.is_some_and(|floor| descriptor.log_type.ledger_order_key(key) < *floor)
			{
				debug!(key, "below retained ledger window");
				continue;
			}
			if !initialized.contains(&key_scope) {
				session.ensure_schema_version(&key_scope).await?;
				initialized.insert(key_scope.clone());
			}
			if !descriptor.reparse && session.has(&key_scope, key).await? {
				debug!(key, "already processed");
				continue;
			}

			self.process_key(descriptor, &session, &key_scope, key, &mut report)
				.await?;
		}

		for full_scope in session.sub_scopes().await? {
			report.entries_evicted += maintain(&session, &full_scope, descriptor.retain_count).await?;
		}
		session
			.record_run_success(Utc::now(), report.keys_processed as u64)
			.await?;

		info!(
			keys_seen = report.keys_seen,
			keys_processed = report.keys_processed,
			keys_skipped = report.keys_skipped,
			events_forwarded = report.events_forwarded,
			events_discarded = report.events_discarded,
			entries_evicted = report.entries_evicted,
			"Scope run complete"
		);
		Ok(report)
	}

	/// `only_logs_after`, else the partition date of the oldest ledger key
	/// of the scope, else today.
	async fn lower_bound(
		&self,
		descriptor: &BucketDescriptor,
		session: &ScopeSession<'_>,
		root: &str,
	) -> Result<NaiveDate> {
		if let Some(date) = descriptor.only_logs_after {
			return Ok(date);
		}
		if let Some(first) = session.first_key().await? {
			let date = first
				.strip_prefix(root)
				.and_then(|relative| descriptor.log_type.partition_date(relative));
			if let Some(date) = date {
				return Ok(date);
			}
		}
		Ok(Utc::now().date_naive())
	}

	/// Every key under `root` on or after `lower`, ascending and suffix-filtered.
	async fn enumerate(
		&self,
		descriptor: &BucketDescriptor,
		root: &str,
		lower: NaiveDate,
	) -> Result<Vec<CandidateKey>> {
		let log_type = descriptor.log_type;
		let marker = format!("{root}{}", log_type.date_path(lower));
		let padded = log_type.zero_padded_dates();
		let start_after = padded.then(|| marker.clone());

		let mut candidates = Vec::new();
		let mut token = None;
		loop {
			let request = ListRequest::new(&descriptor.bucket, root)
				.start_after(start_after.clone())
				.continuation_token(token.take());
			let page = with_retry(&self.retry, "list", || self.store.list(&request))
				.await
				.map_err(|source| IngestError::ObjectStore {
					bucket: descriptor.bucket.clone(),
					key: root.to_string(),
					source,
				})?;

			for candidate in page.keys {
				if !descriptor.matches_suffix(&candidate.key) {
					continue;
				}
				let in_range = if padded {
					candidate.key >= marker
				} else {
					candidate
						.key
						.strip_prefix(root)
						.and_then(|relative| log_type.partition_date(relative))
						.is_some_and(|date| date >= lower)
				};
				if in_range {
					candidates.push(candidate);
				}
			}

			match page.next_token {
				Some(next) => token = Some(next),
				None => break,
			}
		}

		candidates.sort_by(|a, b| a.key.cmp(&b.key));
		candidates.dedup_by(|a, b| a.key == b.key);
		Ok(candidates)
	}

	#[instrument(skip_all, fields(key = %key))]
	async fn process_key(
		&self,
		descriptor: &BucketDescriptor,
		session: &ScopeSession<'_>,
		key_scope: &ScopeKey,
		key: &str,
		report: &mut ScopeRunReport,
	) -> Result<()> {
		let raw = with_retry(&self.retry, "get", || self.store.get(&descriptor.bucket, key))
			.await
			.map_err(|source| IngestError::ObjectStore {
				bucket: descriptor.bucket.clone(),
				key: key.to_string(),
				source,
			})?;

		let data = match decompress(key, raw, descriptor.skip_on_error)? {
			Decompressed::Data(data) => data,
			Decompressed::Skipped => {
				commit(descriptor, session, key_scope, key).await?;
				report.keys_processed += 1;
				report.keys_skipped += 1;
				return Ok(());
			}
		};

		let ctx = ParseContext::new(&descriptor.bucket, key);
		let mut forwarded = 0;
		let mut discarded = 0;
		for event in parse(descriptor.log_type, data, ctx, descriptor.skip_on_error) {
			let event = event?;
			if descriptor
				.discard
				.as_ref()
				.is_some_and(|rule| should_discard(rule, &event))
			{
				discarded += 1;
				continue;
			}
			with_retry(&self.retry, "forward", || self.sink.forward(&event))
				.await
				.map_err(|source| IngestError::Sink {
					sink: self.sink.name().to_string(),
					key: key.to_string(),
					source,
				})?;
			forwarded += 1;
		}

		commit(descriptor, session, key_scope, key).await?;
		report.keys_processed += 1;
		report.events_forwarded += forwarded;
		report.events_discarded += discarded;
		debug!(forwarded, discarded, "Object processed");
		Ok(())
	}
}

/// Record a processed key. Reparsed keys may already be present.
async fn commit(
	descriptor: &BucketDescriptor,
	session: &ScopeSession<'_>,
	key_scope: &ScopeKey,
	key: &str,
) -> Result<()> {
	if descriptor.reparse {
		session.record_processed(key_scope, key).await?;
	} else {
		session.mark_processed(key_scope, key).await?;
	}
	Ok(())
}

/// Order key of the oldest retained entry per full scope.
///
/// Retention evicts the chronologically oldest keys, so anything below the
/// oldest survivor was either evicted or predates the ledger window.
async fn retention_floors(session: &ScopeSession<'_>, log_type: LogType) -> Result<HashMap<ScopeKey, String>> {
	let mut floors = HashMap::new();
	for scope in session.sub_scopes().await? {
		if let Some(oldest) = session.oldest_keys(&scope, 1).await?.into_iter().next() {
			floors.insert(scope, log_type.ledger_order_key(&oldest));
		}
	}
	Ok(floors)
}
