// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic driver: runs every configured bucket on an interval and applies
//! ledger retention on a second, slower interval.

use std::sync::Arc;
use std::time::Duration;

use loom_ingest_config::{CollectorConfig, IngestConfig};
use loom_ingest_core::{BucketDescriptor, CancellationToken};
use loom_ingest_db::LedgerStore;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, instrument};

use crate::error::{IngestError, Result};
use crate::maintenance::{MaintenanceReport, Maintainer};
use crate::object_store::ObjectStore;
use crate::processor::{BucketProcessor, BucketRunReport};
use crate::sink::EventSink;
use crate::status::CollectorStatus;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct Collector {
	processor: BucketProcessor,
	maintainer: Maintainer,
	buckets: Vec<BucketDescriptor>,
	interval: Duration,
	maintenance_interval: Duration,
}

impl Collector {
	pub fn new(processor: BucketProcessor, buckets: Vec<BucketDescriptor>, config: &CollectorConfig) -> Self {
		let processor = processor.with_workers(config.workers);
		let maintainer = Maintainer::new(Arc::clone(processor.ledger()), config.default_retain_count)
			.with_buckets(&buckets);
		Self {
			processor,
			maintainer,
			buckets,
			interval: Duration::from_secs(config.interval_secs).max(MIN_INTERVAL),
			maintenance_interval: Duration::from_secs(config.maintenance_interval_secs).max(MIN_INTERVAL),
		}
	}

	pub fn from_config(
		config: &IngestConfig,
		store: Arc<dyn ObjectStore>,
		ledger: Arc<LedgerStore>,
		sink: Arc<dyn EventSink>,
	) -> Self {
		let processor = BucketProcessor::new(store, ledger, sink, config.retry.clone());
		Self::new(processor, config.buckets.clone(), &config.collector)
	}

	/// Run every bucket once.
	///
	/// Buckets are independent: a failing bucket is logged and the rest still
	/// run. The first failure is returned at the end.
	#[instrument(skip_all, fields(buckets = self.buckets.len()))]
	pub async fn run_once(&self, cancel: &CancellationToken) -> Result<Vec<BucketRunReport>> {
		let mut reports = Vec::with_capacity(self.buckets.len());
		let mut first_error: Option<IngestError> = None;
		for descriptor in &self.buckets {
			if cancel.is_cancelled() {
				info!("Cancellation requested, skipping remaining buckets");
				break;
			}
			match self.processor.run_bucket(descriptor, cancel).await {
				Ok(report) => reports.push(report),
				Err(e) => {
					error!(bucket = %descriptor.bucket, error = %e, "Bucket run failed");
					first_error.get_or_insert(e);
				}
			}
		}
		match first_error {
			Some(e) => Err(e),
			None => Ok(reports),
		}
	}

	pub async fn maintain(&self) -> Result<MaintenanceReport> {
		Ok(self.maintainer.run_all().await?)
	}

	pub async fn status(&self) -> Result<CollectorStatus> {
		Ok(CollectorStatus::collect(self.processor.ledger()).await?)
	}

	/// Run until `shutdown` fires or a run fails.
	///
	/// The first run starts immediately; maintenance first fires one
	/// maintenance interval after start.
	pub async fn run(&self, cancel: &CancellationToken, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
		info!(
			buckets = self.buckets.len(),
			interval_secs = self.interval.as_secs(),
			maintenance_interval_secs = self.maintenance_interval.as_secs(),
			"Collector started"
		);

		let mut run_tick = tokio::time::interval(self.interval);
		run_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut maintenance_tick =
			tokio::time::interval_at(Instant::now() + self.maintenance_interval, self.maintenance_interval);
		maintenance_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = run_tick.tick() => {
					if cancel.is_cancelled() {
						break;
					}
					let reports = self.run_once(cancel).await?;
					info!(
						buckets = reports.len(),
						keys_processed = reports.iter().map(|r| r.keys_processed()).sum::<usize>(),
						"Collector run complete"
					);
				}
				_ = maintenance_tick.tick() => {
					self.maintain().await?;
				}
				_ = shutdown.recv() => {
					info!("Shutting down collector");
					break;
				}
			}
		}
		Ok(())
	}
}
