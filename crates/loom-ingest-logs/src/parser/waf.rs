// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WAF logs delivered through Firehose.
//!
//! An object holds either a JSON array of records or records written back to
//! back (usually newline separated). Request headers arrive as a list of
//! `{"name", "value"}` pairs and are folded into a single object.

use serde_json::{Map, Value};

use super::{as_object, DocumentResult, Fields};
use crate::error::RecordError;

pub(crate) fn records(data: &[u8]) -> DocumentResult {
	let first = data.iter().find(|b| !b.is_ascii_whitespace());
	let values: Vec<Value> = if first == Some(&b'[') {
		serde_json::from_slice(data).map_err(|e| (1usize, RecordError::from(e)))?
	} else {
		serde_json::Deserializer::from_slice(data)
			.into_iter::<Value>()
			.enumerate()
			.map(|(i, value)| value.map_err(|e| (i + 1, RecordError::from(e))))
			.collect::<Result<_, _>>()?
	};

	values
		.into_iter()
		.enumerate()
		.map(|(i, value)| normalize(value).map_err(|e| (i + 1, e)))
		.collect()
}

fn normalize(value: Value) -> Result<Fields, RecordError> {
	let mut record = as_object(value)?;
	let headers = record
		.get_mut("httpRequest")
		.and_then(Value::as_object_mut)
		.and_then(|request| request.get_mut("headers"))
		.ok_or(RecordError::MissingField("httpRequest.headers"))?;

	let list = match headers {
		Value::Array(list) => std::mem::take(list),
		_ => {
			return Err(RecordError::Malformed(
				"httpRequest.headers is not a list".to_string(),
			))
		}
	};

	let mut folded = Map::new();
	for header in list {
		let name = header
			.get("name")
			.and_then(Value::as_str)
			.ok_or(RecordError::MissingField("httpRequest.headers.name"))?;
		let value = header
			.get("value")
			.cloned()
			.ok_or(RecordError::MissingField("httpRequest.headers.value"))?;
		folded.insert(name.to_string(), value);
	}
	*headers = Value::Object(folded);
	Ok(record)
}
