// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Loom bucket log collector.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Validation of `[[buckets]]` entries into [`BucketDescriptor`]s
//! - Consistent environment variable naming (`LOOM_INGEST_*`)
//!
//! # Usage
//!
//! ```ignore
//! use loom_ingest_config::load_config_with_file;
//!
//! let config = load_config_with_file("/etc/loom/ingest.toml")?;
//! for bucket in &config.buckets {
//!     println!("{} ({})", bucket.bucket, bucket.log_type);
//! }
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::IngestConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use loom_ingest_core::BucketDescriptor;
use tracing::{debug, info};

/// Fully resolved collector configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub collector: CollectorConfig,
	pub retry: RetryConfig,
	pub store: StoreConfig,
	pub sink: SinkConfig,
	pub buckets: Vec<BucketDescriptor>,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_INGEST_*`)
/// 2. Config file (`/etc/loom/ingest.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<IngestConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<IngestConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<IngestConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = IngestConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved, validated configuration.
pub fn finalize(layer: IngestConfigLayer) -> Result<IngestConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let collector = layer.collector.unwrap_or_default().finalize();
	let retry = layer.retry.unwrap_or_default().finalize();
	let store = layer.store.unwrap_or_default().finalize();
	let sink = layer.sink.unwrap_or_default().finalize();

	validate_config(&collector, &sink)?;

	let buckets = layer
		.buckets
		.unwrap_or_default()
		.into_iter()
		.enumerate()
		.map(|(index, bucket)| bucket.finalize(index, collector.default_retain_count))
		.collect::<Result<Vec<_>, _>>()?;

	info!(
		database = %database.url,
		workers = collector.workers,
		interval_secs = collector.interval_secs,
		sink = ?sink.kind,
		buckets = buckets.len(),
		"Ingest configuration loaded"
	);

	Ok(IngestConfig {
		database,
		logging,
		collector,
		retry,
		store,
		sink,
		buckets,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(collector: &CollectorConfig, sink: &SinkConfig) -> Result<(), ConfigError> {
	if collector.workers == 0 {
		return Err(ConfigError::Validation(
			"collector.workers must be at least 1".to_string(),
		));
	}
	if collector.default_retain_count == 0 {
		return Err(ConfigError::Validation(
			"collector.default_retain_count must be greater than zero".to_string(),
		));
	}
	if sink.kind == SinkKind::File && sink.path.is_none() {
		return Err(ConfigError::Validation(
			"sink.kind = \"file\" requires sink.path (LOOM_INGEST_SINK_PATH)".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_ingest_core::LogType;

	fn parse(toml_str: &str) -> Result<IngestConfig, ConfigError> {
		finalize(toml::from_str(toml_str).unwrap())
	}

	#[test]
	fn test_empty_config_uses_defaults() {
		let config = parse("").unwrap();
		assert_eq!(config.database.url, "sqlite:./loom-ingest.db");
		assert_eq!(config.collector.workers, 4);
		assert_eq!(config.sink.kind, SinkKind::Stdout);
		assert!(config.buckets.is_empty());
	}

	#[test]
	fn test_buckets_inherit_default_retain_count() {
		let config = parse(
			r#"
[collector]
default_retain_count = 42

[[buckets]]
name = "a"
log_type = "vpcflow"

[[buckets]]
name = "b"
log_type = "guardduty"
retain_count = 7
"#,
		)
		.unwrap();
		assert_eq!(config.buckets.len(), 2);
		assert_eq!(config.buckets[0].log_type, LogType::VpcFlow);
		assert_eq!(config.buckets[0].retain_count, 42);
		assert_eq!(config.buckets[1].retain_count, 7);
	}

	#[test]
	fn test_zero_workers_rejected() {
		let err = parse("[collector]\nworkers = 0").unwrap_err();
		assert!(err.to_string().contains("workers"));
	}

	#[test]
	fn test_file_sink_requires_path() {
		let err = parse("[sink]\nkind = \"file\"").unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
		assert!(parse("[sink]\nkind = \"file\"\npath = \"/tmp/events.jsonl\"").is_ok());
	}

	#[test]
	fn test_invalid_bucket_rejected() {
		let err = parse("[[buckets]]\nname = \"a\"\nlog_type = \"nope\"").unwrap_err();
		assert!(err.to_string().contains("buckets[0]"));
	}

	#[test]
	fn test_load_config_with_missing_file() {
		let config = load_config_with_file("/nonexistent/ingest.toml");
		assert!(config.is_ok());
	}
}
