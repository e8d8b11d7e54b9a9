// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory object store and recording sink for exercising the collector
//! without real buckets.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use loom_ingest_core::{CandidateKey, ParsedEvent};
use parking_lot::Mutex;

use crate::object_store::{paginate, ListPage, ListRequest, ObjectStore, ObjectStoreError, DEFAULT_PAGE_SIZE};
use crate::sink::{EventSink, SinkError};

#[derive(Default)]
struct Failures {
	list: u32,
	get: HashMap<String, u32>,
}

pub struct MemoryObjectStore {
	objects: Mutex<BTreeMap<(String, String), Bytes>>,
	failures: Mutex<Failures>,
	gets: Mutex<Vec<String>>,
	page_size: usize,
}

impl MemoryObjectStore {
	pub fn new() -> Self {
		Self {
			objects: Mutex::new(BTreeMap::new()),
			failures: Mutex::new(Failures::default()),
			gets: Mutex::new(Vec::new()),
			page_size: DEFAULT_PAGE_SIZE,
		}
	}

	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.max(1);
		self
	}

	pub fn insert(&self, bucket: impl Into<String>, key: impl Into<String>, data: impl Into<Bytes>) {
		self.objects
			.lock()
			.insert((bucket.into(), key.into()), data.into());
	}

	pub fn remove(&self, bucket: &str, key: &str) {
		self.objects
			.lock()
			.remove(&(bucket.to_string(), key.to_string()));
	}

	/// Fail the next `times` listings with a transient error.
	pub fn fail_list(&self, times: u32) {
		self.failures.lock().list = times;
	}

	/// Fail the next `times` reads of `key` with a transient error.
	pub fn fail_get(&self, key: impl Into<String>, times: u32) {
		self.failures.lock().get.insert(key.into(), times);
	}

	/// Keys read so far, in order, including failed attempts.
	pub fn gets(&self) -> Vec<String> {
		self.gets.lock().clone()
	}

	pub fn clear_gets(&self) {
		self.gets.lock().clear();
	}
}

impl Default for MemoryObjectStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
	fn name(&self) -> &str {
		"memory"
	}

	async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError> {
		{
			let mut failures = self.failures.lock();
			if failures.list > 0 {
				failures.list -= 1;
				return Err(ObjectStoreError::Transient("injected list failure".to_string()));
			}
		}
		let keys = self
			.objects
			.lock()
			.iter()
			.filter(|((bucket, _), _)| *bucket == request.bucket)
			.map(|((_, key), data)| CandidateKey {
				key: key.clone(),
				last_modified: Some(Utc::now()),
				size: data.len() as u64,
			})
			.collect();
		Ok(paginate(keys, request, self.page_size))
	}

	async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
		self.gets.lock().push(key.to_string());
		{
			let mut failures = self.failures.lock();
			if let Some(remaining) = failures.get.get_mut(key) {
				if *remaining > 0 {
					*remaining -= 1;
					return Err(ObjectStoreError::Transient(format!("injected failure for {key}")));
				}
			}
		}
		self.objects
			.lock()
			.get(&(bucket.to_string(), key.to_string()))
			.cloned()
			.ok_or_else(|| ObjectStoreError::NotFound {
				bucket: bucket.to_string(),
				key: key.to_string(),
			})
	}
}

#[derive(Default)]
struct SinkFailures {
	permanent: bool,
	transient: u32,
	on_key: Option<String>,
}

/// Collects forwarded events; can be told to reject them.
#[derive(Default)]
pub struct RecordingSink {
	events: Mutex<Vec<ParsedEvent>>,
	failures: Mutex<SinkFailures>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<ParsedEvent> {
		self.events.lock().clone()
	}

	/// Distinct object keys of the recorded events, in first-seen order.
	pub fn keys(&self) -> Vec<String> {
		let mut keys: Vec<String> = Vec::new();
		for event in self.events.lock().iter() {
			if !keys.contains(&event.key) {
				keys.push(event.key.clone());
			}
		}
		keys
	}

	pub fn clear(&self) {
		self.events.lock().clear();
	}

	/// Reject every event with a permanent error while set.
	pub fn fail_permanently(&self, fail: bool) {
		self.failures.lock().permanent = fail;
	}

	/// Reject the next `times` events with a transient error.
	pub fn fail_transiently(&self, times: u32) {
		self.failures.lock().transient = times;
	}

	/// Reject events from `key` with a permanent error.
	pub fn fail_on_key(&self, key: Option<String>) {
		self.failures.lock().on_key = key;
	}
}

#[async_trait]
impl EventSink for RecordingSink {
	fn name(&self) -> &str {
		"recording"
	}

	async fn forward(&self, event: &ParsedEvent) -> Result<(), SinkError> {
		{
			let mut failures = self.failures.lock();
			if failures.permanent {
				return Err(SinkError::Permanent("sink rejected event".to_string()));
			}
			if failures.on_key.as_deref() == Some(event.key.as_str()) {
				return Err(SinkError::Permanent(format!("sink rejected event from {}", event.key)));
			}
			if failures.transient > 0 {
				failures.transient -= 1;
				return Err(SinkError::Transient("sink busy".to_string()));
			}
		}
		self.events.lock().push(event.clone());
		Ok(())
	}
}
