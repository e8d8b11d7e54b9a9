// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only access to buckets of log objects.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use loom_ingest_core::CandidateKey;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),

	#[error("object not found: {bucket}/{key}")]
	NotFound { bucket: String, key: String },
}

impl ObjectStoreError {
	pub fn is_transient(&self) -> bool {
		matches!(self, ObjectStoreError::Transient(_))
	}
}

/// One page of a listing under `prefix`, in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
	pub bucket: String,
	pub prefix: String,
	/// Only keys strictly greater than this are wanted. Stores may treat it
	/// as a hint; callers still filter.
	pub start_after: Option<String>,
	pub continuation_token: Option<String>,
}

impl ListRequest {
	pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
		Self {
			bucket: bucket.into(),
			prefix: prefix.into(),
			start_after: None,
			continuation_token: None,
		}
	}

	pub fn start_after(mut self, key: Option<String>) -> Self {
		self.start_after = key;
		self
	}

	pub fn continuation_token(mut self, token: Option<String>) -> Self {
		self.continuation_token = token;
		self
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
	pub keys: Vec<CandidateKey>,
	/// Set when more keys remain; pass back in the next request.
	pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
	fn name(&self) -> &str;

	async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError>;

	async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, ObjectStoreError>;

	/// Distinct `<prefix><segment>/` directories directly below `prefix`.
	async fn common_prefixes(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
		let mut prefixes = BTreeSet::new();
		let mut token = None;
		loop {
			let request = ListRequest::new(bucket, prefix).continuation_token(token);
			let page = self.list(&request).await?;
			for candidate in &page.keys {
				let Some(rest) = candidate.key.strip_prefix(prefix) else {
					continue;
				};
				if let Some((segment, _)) = rest.split_once('/') {
					if !segment.is_empty() {
						prefixes.insert(format!("{prefix}{segment}/"));
					}
				}
			}
			match page.next_token {
				Some(next) => token = Some(next),
				None => break,
			}
		}
		Ok(prefixes.into_iter().collect())
	}
}

/// Paginate an ascending, already filtered key set.
///
/// The continuation token is the last key of the previous page.
pub(crate) fn paginate(
	mut keys: Vec<CandidateKey>,
	request: &ListRequest,
	page_size: usize,
) -> ListPage {
	keys.retain(|c| c.key.starts_with(&request.prefix));
	let floor = match (&request.start_after, &request.continuation_token) {
		(Some(a), Some(b)) => Some(a.max(b).clone()),
		(Some(a), None) => Some(a.clone()),
		(None, Some(b)) => Some(b.clone()),
		(None, None) => None,
	};
	if let Some(floor) = floor {
		keys.retain(|c| c.key > floor);
	}
	keys.sort_by(|a, b| a.key.cmp(&b.key));

	let next_token = if keys.len() > page_size {
		keys.truncate(page_size);
		keys.last().map(|c| c.key.clone())
	} else {
		None
	};
	ListPage { keys, next_token }
}

/// Buckets stored as directories under a local root: `<root>/<bucket>/<key>`.
pub struct LocalObjectStore {
	root: PathBuf,
	page_size: usize,
}

impl LocalObjectStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			page_size: DEFAULT_PAGE_SIZE,
		}
	}

	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.max(1);
		self
	}

	fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, ObjectStoreError> {
		if bucket.is_empty() || !is_plain_relative(Path::new(bucket)) {
			return Err(ObjectStoreError::Permanent(format!("invalid bucket name '{bucket}'")));
		}
		Ok(self.root.join(bucket))
	}
}

fn is_plain_relative(path: &Path) -> bool {
	path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn walk(dir: &Path, base: &Path, out: &mut Vec<CandidateKey>) -> std::io::Result<()> {
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		let file_type = entry.file_type()?;
		if file_type.is_dir() {
			walk(&path, base, out)?;
		} else if file_type.is_file() {
			let Ok(relative) = path.strip_prefix(base) else {
				continue;
			};
			let key = relative
				.components()
				.map(|c| c.as_os_str().to_string_lossy())
				.collect::<Vec<_>>()
				.join("/");
			let metadata = entry.metadata()?;
			out.push(CandidateKey {
				key,
				last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
				size: metadata.len(),
			});
		}
	}
	Ok(())
}

fn io_error(context: &str, e: std::io::Error) -> ObjectStoreError {
	match e.kind() {
		std::io::ErrorKind::Interrupted
		| std::io::ErrorKind::TimedOut
		| std::io::ErrorKind::WouldBlock => ObjectStoreError::Transient(format!("{context}: {e}")),
		_ => ObjectStoreError::Permanent(format!("{context}: {e}")),
	}
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
	fn name(&self) -> &str {
		"local"
	}

	async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError> {
		let dir = self.bucket_dir(&request.bucket)?;
		if !tokio::fs::try_exists(&dir)
			.await
			.map_err(|e| io_error("failed to stat bucket", e))?
		{
			return Err(ObjectStoreError::Permanent(format!(
				"bucket '{}' does not exist under {}",
				request.bucket,
				self.root.display()
			)));
		}

		let keys = tokio::task::spawn_blocking(move || {
			let mut keys = Vec::new();
			walk(&dir, &dir, &mut keys).map(|_| keys)
		})
		.await
		.map_err(|e| ObjectStoreError::Transient(format!("listing task failed: {e}")))?
		.map_err(|e| io_error("failed to list bucket", e))?;

		let page = paginate(keys, request, self.page_size);
		debug!(
			bucket = %request.bucket,
			prefix = %request.prefix,
			keys = page.keys.len(),
			more = page.next_token.is_some(),
			"listed objects"
		);
		Ok(page)
	}

	async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
		if key.is_empty() || !is_plain_relative(Path::new(key)) {
			return Err(ObjectStoreError::Permanent(format!("invalid object key '{key}'")));
		}
		let path = self.bucket_dir(bucket)?.join(key);
		match tokio::fs::read(&path).await {
			Ok(data) => Ok(Bytes::from(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ObjectStoreError::NotFound {
				bucket: bucket.to_string(),
				key: key.to_string(),
			}),
			Err(e) => Err(io_error("failed to read object", e)),
		}
	}
}
