// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger retention: keep only the newest `retain_count` keys per scope.

use std::collections::HashMap;
use std::sync::Arc;

use loom_ingest_core::{BucketDescriptor, ScopeKey};
use loom_ingest_db::{LedgerStore, Result, ScopeSession};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Evict the chronologically oldest keys of `scope` until at most
/// `retain_count` remain. Returns the number of evicted entries.
///
/// Runs inside the caller's session so no processing of the same scope can
/// interleave with it.
pub async fn maintain(session: &ScopeSession<'_>, scope: &ScopeKey, retain_count: u32) -> Result<usize> {
	let count = session.count(scope).await?;
	let retain = u64::from(retain_count);
	if count <= retain {
		debug!(scope = %scope, count, retain, "scope within retention");
		return Ok(0);
	}

	let victims = session.oldest_keys(scope, count - retain).await?;
	let mut evicted = 0;
	for key in &victims {
		if session.delete(scope, key).await? {
			evicted += 1;
		}
	}

	info!(scope = %scope, evicted, retained = retain, "Trimmed ledger scope");
	Ok(evicted)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
	pub scopes_checked: usize,
	/// Scopes stamped with another schema version, left untouched.
	pub scopes_skipped: usize,
	pub entries_evicted: usize,
}

/// Applies retention to every scope in the ledger.
///
/// Buckets registered with [`Maintainer::with_bucket`] use their own
/// `retain_count`; every other scope falls back to the default.
pub struct Maintainer {
	ledger: Arc<LedgerStore>,
	default_retain: u32,
	per_bucket: HashMap<String, u32>,
}

impl Maintainer {
	pub fn new(ledger: Arc<LedgerStore>, default_retain: u32) -> Self {
		Self {
			ledger,
			default_retain,
			per_bucket: HashMap::new(),
		}
	}

	pub fn with_bucket(mut self, descriptor: &BucketDescriptor) -> Self {
		self.per_bucket
			.insert(descriptor.bucket_path(), descriptor.retain_count);
		self
	}

	pub fn with_buckets<'a>(self, descriptors: impl IntoIterator<Item = &'a BucketDescriptor>) -> Self {
		descriptors.into_iter().fold(self, |m, d| m.with_bucket(d))
	}

	pub fn retain_for(&self, scope: &ScopeKey) -> u32 {
		self.per_bucket
			.get(&scope.bucket_path)
			.copied()
			.unwrap_or(self.default_retain)
	}

	#[instrument(skip(self))]
	pub async fn run_all(&self) -> Result<MaintenanceReport> {
		let mut report = MaintenanceReport::default();
		let expected = self.ledger.expected_schema_version();
		for scope in self.ledger.scopes().await? {
			let session = self.ledger.session(&scope).await;
			match session.get_schema_version(&scope).await? {
				Some(stored) if stored != expected => {
					warn!(
						scope = %scope,
						stored = %stored,
						expected,
						"Skipping ledger scope with mismatched schema version"
					);
					report.scopes_skipped += 1;
					continue;
				}
				_ => {}
			}
			report.entries_evicted += maintain(&session, &scope, self.retain_for(&scope)).await?;
			report.scopes_checked += 1;
		}
		info!(
			scopes_checked = report.scopes_checked,
			scopes_skipped = report.scopes_skipped,
			entries_evicted = report.entries_evicted,
			"Ledger maintenance complete"
		);
		Ok(report)
	}
}
