// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Downstream destinations for parsed events.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use loom_ingest_config::{SinkConfig, SinkKind};
use loom_ingest_core::ParsedEvent;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum SinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}

impl SinkError {
	pub fn is_transient(&self) -> bool {
		matches!(self, SinkError::Transient(_))
	}
}

/// Receives events in the order they were parsed.
///
/// A key is only recorded as processed after every one of its events was
/// accepted, so implementations should not acknowledge before the event is
/// durable on their side.
#[async_trait]
pub trait EventSink: Send + Sync {
	fn name(&self) -> &str;

	async fn forward(&self, event: &ParsedEvent) -> Result<(), SinkError>;
}

/// Build the sink described by `config`.
pub fn from_config(config: &SinkConfig) -> Result<Arc<dyn EventSink>, SinkError> {
	match config.kind {
		SinkKind::Stdout => Ok(Arc::new(StdoutEventSink::new())),
		SinkKind::Tracing => Ok(Arc::new(TracingEventSink)),
		SinkKind::File => {
			let path = config
				.path
				.clone()
				.ok_or_else(|| SinkError::Permanent("file sink requires a path".to_string()))?;
			Ok(Arc::new(FileEventSink::new(path)))
		}
	}
}

/// Serialize the event envelope as one JSON line.
pub fn format_json_line(event: &ParsedEvent) -> Result<String, SinkError> {
	let json = serde_json::to_string(&event.to_message())
		.map_err(|e| SinkError::Permanent(format!("JSON serialization failed: {e}")))?;
	Ok(format!("{json}\n"))
}

/// Appends JSON lines to a file, opened lazily on the first event.
pub struct FileEventSink {
	path: PathBuf,
	file: Mutex<Option<tokio::fs::File>>,
}

impl FileEventSink {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			file: Mutex::new(None),
		}
	}
}

#[async_trait]
impl EventSink for FileEventSink {
	fn name(&self) -> &str {
		"file"
	}

	async fn forward(&self, event: &ParsedEvent) -> Result<(), SinkError> {
		let line = format_json_line(event)?;
		let mut guard = self.file.lock().await;

		if guard.is_none() {
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(&self.path)
				.await
				.map_err(|e| SinkError::Transient(format!("failed to open file: {e}")))?;
			*guard = Some(file);
		}
		let file = guard
			.as_mut()
			.ok_or_else(|| SinkError::Permanent("file handle not initialized".to_string()))?;

		let result = match file.write_all(line.as_bytes()).await {
			Ok(()) => file
				.flush()
				.await
				.map_err(|e| SinkError::Transient(format!("failed to flush file: {e}"))),
			Err(e) => Err(SinkError::Transient(format!("failed to write to file: {e}"))),
		};
		if result.is_err() {
			// Reopen on the next event.
			*guard = None;
		}
		result
	}
}

/// Writes JSON lines to standard output.
pub struct StdoutEventSink {
	out: Mutex<tokio::io::Stdout>,
}

impl StdoutEventSink {
	pub fn new() -> Self {
		Self {
			out: Mutex::new(tokio::io::stdout()),
		}
	}
}

impl Default for StdoutEventSink {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl EventSink for StdoutEventSink {
	fn name(&self) -> &str {
		"stdout"
	}

	async fn forward(&self, event: &ParsedEvent) -> Result<(), SinkError> {
		let line = format_json_line(event)?;
		let mut out = self.out.lock().await;
		out.write_all(line.as_bytes())
			.await
			.map_err(|e| SinkError::Transient(format!("failed to write to stdout: {e}")))?;
		out.flush()
			.await
			.map_err(|e| SinkError::Transient(format!("failed to flush stdout: {e}")))
	}
}

/// Emits each event as a structured `tracing` record at info level.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn forward(&self, event: &ParsedEvent) -> Result<(), SinkError> {
		let message = event.to_message();
		tracing::info!(
			target: "loom_ingest::events",
			log_type = %event.log_type,
			bucket = %event.bucket,
			key = %event.key,
			event = %message,
			"event"
		);
		Ok(())
	}
}
