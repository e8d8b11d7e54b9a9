// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::log_type::LogType;

/// An object key returned by a bucket listing. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKey {
	pub key: String,
	pub last_modified: Option<DateTime<Utc>>,
	pub size: u64,
}

/// One event extracted from a log object, tagged with its log type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedEvent {
	pub log_type: LogType,
	pub bucket: String,
	pub key: String,
	pub fields: Map<String, Value>,
}

impl ParsedEvent {
	pub fn new(
		log_type: LogType,
		bucket: impl Into<String>,
		key: impl Into<String>,
		fields: Map<String, Value>,
	) -> Self {
		Self {
			log_type,
			bucket: bucket.into(),
			key: key.into(),
			fields,
		}
	}

	/// Look up a dotted field path such as `httpRequest.clientIp`.
	pub fn get(&self, path: &str) -> Option<&Value> {
		let mut parts = path.split('.');
		let mut current = self.fields.get(parts.next()?)?;
		for part in parts {
			current = current.as_object()?.get(part)?;
		}
		Some(current)
	}

	/// Envelope handed to the downstream analysis engine.
	pub fn to_message(&self) -> Value {
		let mut aws = self.fields.clone();
		aws.insert("source".to_string(), Value::from(self.log_type.as_str()));
		aws.insert(
			"log_info".to_string(),
			serde_json::json!({
				"log_file": self.key,
				"s3bucket": self.bucket,
			}),
		);
		serde_json::json!({
			"integration": "aws",
			"aws": Value::Object(aws),
		})
	}
}
