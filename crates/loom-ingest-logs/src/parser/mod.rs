// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log-type parsers.
//!
//! Every parser turns one decompressed object into an [`EventStream`]. There
//! are two framings: single-document formats (CloudTrail, Config, WAF) are
//! decoded in one go, record-delimited formats (VPC flow, GuardDuty,
//! Inspector, custom) one line at a time as the stream is pulled.

mod cloudtrail;
mod config;
mod custom;
mod guardduty;
mod inspector;
mod vpcflow;
mod waf;

use bytes::Bytes;
use loom_ingest_core::{LogType, ParsedEvent};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ParseError, RecordError};

/// Single-pass sequence of events from one object.
///
/// Yields at most one error, after which it is exhausted.
pub type EventStream = Box<dyn Iterator<Item = Result<ParsedEvent, ParseError>> + Send>;

pub(crate) type Fields = Map<String, Value>;

/// Records of a single-document format, or the failing record's position.
pub(crate) type DocumentResult = Result<Vec<Fields>, (usize, RecordError)>;

/// Where the bytes being parsed came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
	pub bucket: String,
	pub key: String,
}

impl ParseContext {
	pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
		Self {
			bucket: bucket.into(),
			key: key.into(),
		}
	}

	fn event(&self, log_type: LogType, fields: Fields) -> ParsedEvent {
		ParsedEvent::new(log_type, self.bucket.clone(), self.key.clone(), fields)
	}
}

/// Decoder for one line of a record-delimited format.
///
/// A line may produce no records (a header) or several (a split finding).
pub(crate) trait LineDecoder: Send {
	fn decode(&mut self, line: &str) -> Result<Vec<Fields>, RecordError>;
}

/// Parse a decompressed object of `log_type`.
///
/// With `skip_on_error`, malformed records (or, for single-document formats,
/// the whole malformed document) are logged and dropped. Without it, the
/// stream ends with the first [`ParseError`].
pub fn parse(log_type: LogType, data: Bytes, ctx: ParseContext, skip_on_error: bool) -> EventStream {
	match log_type {
		LogType::CloudTrail => document(log_type, cloudtrail::records(&data), ctx, skip_on_error),
		LogType::Config => document(log_type, config::records(&data), ctx, skip_on_error),
		LogType::Waf => document(log_type, waf::records(&data), ctx, skip_on_error),
		LogType::VpcFlow => {
			let decoder = vpcflow::VpcFlowDecoder::new(log_type.sub_scope_of(&ctx.key));
			lines(log_type, data, ctx, skip_on_error, decoder)
		}
		LogType::GuardDuty => lines(log_type, data, ctx, skip_on_error, guardduty::GuardDutyDecoder),
		LogType::Inspector => lines(log_type, data, ctx, skip_on_error, inspector::InspectorDecoder),
		LogType::Custom => lines(log_type, data, ctx, skip_on_error, custom::CustomDecoder),
	}
}

fn document(log_type: LogType, result: DocumentResult, ctx: ParseContext, skip_on_error: bool) -> EventStream {
	match result {
		Ok(records) => {
			debug!(key = %ctx.key, records = records.len(), "parsed document");
			Box::new(
				records
					.into_iter()
					.map(move |fields| Ok::<_, ParseError>(ctx.event(log_type, fields))),
			)
		}
		Err((record, err)) => {
			let err = err.at(&ctx.key, record);
			if skip_on_error {
				warn!(key = %ctx.key, error = %err, "skipping malformed document");
				Box::new(std::iter::empty::<Result<ParsedEvent, ParseError>>())
			} else {
				Box::new(std::iter::once(Err(err)))
			}
		}
	}
}

fn lines<D: LineDecoder + 'static>(
	log_type: LogType,
	data: Bytes,
	ctx: ParseContext,
	skip_on_error: bool,
	decoder: D,
) -> EventStream {
	Box::new(LineStream {
		log_type,
		data,
		pos: 0,
		line_no: 0,
		ctx,
		skip_on_error,
		decoder,
		pending: std::collections::VecDeque::new(),
		done: false,
	})
}

struct LineStream<D> {
	log_type: LogType,
	data: Bytes,
	pos: usize,
	line_no: usize,
	ctx: ParseContext,
	skip_on_error: bool,
	decoder: D,
	pending: std::collections::VecDeque<Fields>,
	done: bool,
}

impl<D> LineStream<D> {
	fn next_line(&mut self) -> Option<Bytes> {
		if self.pos >= self.data.len() {
			return None;
		}
		let rest = &self.data[self.pos..];
		let len = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
		let line = self.data.slice(self.pos..self.pos + len);
		self.pos += len + 1;
		self.line_no += 1;
		Some(line)
	}
}

impl<D: LineDecoder> Iterator for LineStream<D> {
	type Item = Result<ParsedEvent, ParseError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(fields) = self.pending.pop_front() {
				return Some(Ok(self.ctx.event(self.log_type, fields)));
			}
			if self.done {
				return None;
			}
			let Some(raw) = self.next_line() else {
				self.done = true;
				return None;
			};

			let result = match std::str::from_utf8(&raw) {
				Ok(line) => {
					let line = line.trim();
					if line.is_empty() {
						continue;
					}
					self.decoder
						.decode(line)
						.map_err(|e| e.at(&self.ctx.key, self.line_no))
				}
				Err(_) => Err(ParseError::InvalidUtf8 {
					key: self.ctx.key.clone(),
					record: self.line_no,
				}),
			};

			match result {
				Ok(records) => self.pending.extend(records),
				Err(err) if self.skip_on_error => {
					warn!(key = %self.ctx.key, record = self.line_no, error = %err, "skipping malformed record");
				}
				Err(err) => {
					self.done = true;
					self.pending.clear();
					return Some(Err(err));
				}
			}
		}
	}
}

pub(crate) fn as_object(value: Value) -> Result<Fields, RecordError> {
	match value {
		Value::Object(fields) => Ok(fields),
		other => Err(RecordError::Malformed(format!(
			"expected a JSON object, found {}",
			json_kind(&other)
		))),
	}
}

pub(crate) fn require_str(fields: &Fields, field: &'static str) -> Result<(), RecordError> {
	match fields.get(field) {
		Some(Value::String(_)) => Ok(()),
		_ => Err(RecordError::MissingField(field)),
	}
}

/// A document of the form `{"<field>": [ {..}, {..} ]}`.
pub(crate) fn array_document(data: &[u8], field: &'static str) -> DocumentResult {
	let doc: Value = serde_json::from_slice(data).map_err(|e| (1usize, RecordError::from(e)))?;
	let mut doc = as_object(doc).map_err(|e| (1usize, e))?;
	let Some(Value::Array(records)) = doc.remove(field) else {
		return Err((1, RecordError::MissingField(field)));
	};
	records
		.into_iter()
		.enumerate()
		.map(|(i, record)| as_object(record).map_err(|e| (i + 1, e)))
		.collect()
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn collect(
		log_type: LogType,
		data: &[u8],
		key: &str,
		skip_on_error: bool,
	) -> Vec<Result<ParsedEvent, ParseError>> {
		parse(
			log_type,
			Bytes::copy_from_slice(data),
			ParseContext::new("bucket", key),
			skip_on_error,
		)
		.collect()
	}

	pub(crate) fn events(log_type: LogType, data: &[u8], skip_on_error: bool) -> Vec<ParsedEvent> {
		collect(log_type, data, "2024/01/01/object", skip_on_error)
			.into_iter()
			.collect::<Result<_, _>>()
			.unwrap()
	}

	#[test]
	fn test_stream_stops_after_first_error() {
		let data = b"{\"a\":1}\nnot json\n{\"a\":2}\n";
		let results = collect(LogType::Custom, data, "k", false);
		assert_eq!(results.len(), 2);
		assert!(results[0].is_ok());
		match &results[1] {
			Err(ParseError::InvalidJson { record, key, .. }) => {
				assert_eq!(*record, 2);
				assert_eq!(key, "k");
			}
			other => panic!("expected invalid json, got {other:?}"),
		}
	}

	#[test]
	fn test_skip_on_error_drops_only_bad_records() {
		let data = b"{\"a\":1}\nnot json\n[1,2]\n{\"a\":2}\n";
		let events = events(LogType::Custom, data, true);
		assert_eq!(events.len(), 2);
		assert_eq!(events[1].fields["a"], 2);
	}

	#[test]
	fn test_blank_lines_and_crlf_are_ignored() {
		let data = b"\n{\"a\":1}\r\n\r\n   \n{\"a\":2}";
		assert_eq!(events(LogType::Custom, data, false).len(), 2);
	}

	#[test]
	fn test_invalid_utf8_line_is_malformed() {
		let data = b"{\"a\":1}\n\xff\xfe\n";
		let results = collect(LogType::Custom, data, "k", false);
		assert!(matches!(
			results.last(),
			Some(Err(ParseError::InvalidUtf8 { record: 2, .. }))
		));
		assert_eq!(events(LogType::Custom, data, true).len(), 1);
	}

	#[test]
	fn test_events_carry_source() {
		let results = collect(LogType::Custom, b"{\"a\":1}", "dir/x.json", false);
		let event = results.into_iter().next().unwrap().unwrap();
		assert_eq!(event.log_type, LogType::Custom);
		assert_eq!(event.bucket, "bucket");
		assert_eq!(event.key, "dir/x.json");
	}

	#[test]
	fn test_malformed_document_yields_one_error_or_nothing() {
		for log_type in [LogType::CloudTrail, LogType::Config, LogType::Waf] {
			let results = collect(log_type, b"{ not json", "k", false);
			assert_eq!(results.len(), 1, "{log_type}");
			assert!(results[0].is_err());
			assert!(collect(log_type, b"{ not json", "k", true).is_empty());
		}
	}

	proptest::proptest! {
		#[test]
		fn every_object_line_becomes_one_event(values in proptest::collection::vec(0i64..1_000_000, 0..40)) {
			let data: String = values.iter().map(|v| format!("{{\"n\":{v}}}\n")).collect();
			let events = events(LogType::Custom, data.as_bytes(), false);
			proptest::prop_assert_eq!(events.len(), values.len());
			for (event, value) in events.iter().zip(&values) {
				proptest::prop_assert_eq!(&event.fields["n"], &Value::from(*value));
			}
		}
	}
}
