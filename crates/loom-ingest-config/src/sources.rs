// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::IngestConfigLayer;
use crate::sections::{
	CollectorConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, RetryConfigLayer,
	SinkConfigLayer, StoreConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<IngestConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<IngestConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(IngestConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/ingest.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<IngestConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(IngestConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: IngestConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(buckets = layer.buckets.as_ref().map_or(0, Vec::len), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `LOOM_INGEST_<SECTION>_<FIELD>`. Buckets are only read from
/// the config file.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<IngestConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from_env(&Env(|name: &str| std::env::var(name).ok()))
	}
}

/// Variable lookup that ignores empty values.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
	fn var(&self, name: &str) -> Option<String> {
		(self.0)(name).filter(|s| !s.is_empty())
	}

	fn parsed<T>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
	{
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn u32(&self, name: &str) -> Result<Option<u32>, ConfigError> {
		self.parsed(name, "u32")
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		self.parsed(name, "u64")
	}

	fn usize(&self, name: &str) -> Result<Option<usize>, ConfigError> {
		self.parsed(name, "usize")
	}

	fn choice<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr<Err = String>,
	{
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|message| ConfigError::InvalidValue {
				key: name.to_string(),
				message,
			}),
			None => Ok(None),
		}
	}
}

fn load_from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<IngestConfigLayer, ConfigError> {
	Ok(IngestConfigLayer {
		database: Some(DatabaseConfigLayer {
			url: env.var("LOOM_INGEST_DATABASE_URL"),
		}),
		logging: Some(LoggingConfigLayer {
			level: env.var("LOOM_INGEST_LOGGING_LEVEL"),
			format: env.choice("LOOM_INGEST_LOGGING_FORMAT")?,
		}),
		collector: Some(CollectorConfigLayer {
			workers: env.usize("LOOM_INGEST_COLLECTOR_WORKERS")?,
			interval_secs: env.u64("LOOM_INGEST_COLLECTOR_INTERVAL_SECS")?,
			maintenance_interval_secs: env.u64("LOOM_INGEST_COLLECTOR_MAINTENANCE_INTERVAL_SECS")?,
			default_retain_count: env.u32("LOOM_INGEST_COLLECTOR_DEFAULT_RETAIN_COUNT")?,
		}),
		retry: Some(RetryConfigLayer {
			max_retries: env.u32("LOOM_INGEST_RETRY_MAX_RETRIES")?,
			base_delay_ms: env.u64("LOOM_INGEST_RETRY_BASE_DELAY_MS")?,
			max_delay_ms: env.u64("LOOM_INGEST_RETRY_MAX_DELAY_MS")?,
			operation_timeout_secs: env.u64("LOOM_INGEST_RETRY_OPERATION_TIMEOUT_SECS")?,
		}),
		store: Some(StoreConfigLayer {
			root: env.var("LOOM_INGEST_STORE_ROOT").map(PathBuf::from),
		}),
		sink: Some(SinkConfigLayer {
			kind: env.choice("LOOM_INGEST_SINK_KIND")?,
			path: env.var("LOOM_INGEST_SINK_PATH").map(PathBuf::from),
		}),
		buckets: None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sections::{LogFormat, SinkKind};
	use std::collections::HashMap;

	fn env_from(vars: &[(&str, &str)]) -> Result<IngestConfigLayer, ConfigError> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		load_from_env(&Env(move |name: &str| vars.get(name).cloned()))
	}

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.buckets.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/ingest.toml").load().unwrap();
		assert!(layer.collector.is_none());
	}

	#[test]
	fn test_toml_source_reads_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ingest.toml");
		std::fs::write(
			&path,
			r#"
[database]
url = "sqlite:/tmp/ledger.db"

[[buckets]]
name = "waf-logs"
log_type = "waf"
"#,
		)
		.unwrap();

		let layer = TomlSource::new(&path).load().unwrap();
		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite:/tmp/ledger.db")
		);
		assert_eq!(layer.buckets.unwrap().len(), 1);
	}

	#[test]
	fn test_toml_source_parse_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ingest.toml");
		std::fs::write(&path, "[collector\nworkers = 1").unwrap();
		assert!(matches!(
			TomlSource::new(&path).load(),
			Err(ConfigError::TomlParse { .. })
		));
	}

	#[test]
	fn test_env_values() {
		let layer = env_from(&[
			("LOOM_INGEST_DATABASE_URL", "sqlite:/data/ingest.db"),
			("LOOM_INGEST_LOGGING_FORMAT", "json"),
			("LOOM_INGEST_COLLECTOR_WORKERS", "12"),
			("LOOM_INGEST_RETRY_MAX_RETRIES", "5"),
			("LOOM_INGEST_SINK_KIND", "tracing"),
			("LOOM_INGEST_STORE_ROOT", ""),
		])
		.unwrap();

		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite:/data/ingest.db")
		);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
		assert_eq!(layer.collector.unwrap().workers, Some(12));
		assert_eq!(layer.retry.unwrap().max_retries, Some(5));
		assert_eq!(layer.sink.unwrap().kind, Some(SinkKind::Tracing));
		assert!(layer.store.unwrap().root.is_none());
	}

	#[test]
	fn test_env_invalid_number() {
		match env_from(&[("LOOM_INGEST_COLLECTOR_WORKERS", "many")]) {
			Err(ConfigError::InvalidValue { key, message }) => {
				assert_eq!(key, "LOOM_INGEST_COLLECTOR_WORKERS");
				assert!(message.contains("many"));
			}
			other => panic!("expected invalid value, got {other:?}"),
		}
	}

	#[test]
	fn test_env_invalid_choice() {
		assert!(matches!(
			env_from(&[("LOOM_INGEST_SINK_KIND", "kafka")]),
			Err(ConfigError::InvalidValue { .. })
		));
	}
}
