// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! VPC flow logs.
//!
//! S3 exports are plain text: an optional header naming the fields followed
//! by space-separated rows. Files without a header use the default version 2
//! format. Exports re-encoded as JSON lines are accepted as well.

use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

use super::{as_object, Fields, LineDecoder};
use crate::error::RecordError;

const DEFAULT_FIELDS: [&str; 14] = [
	"version",
	"account-id",
	"interface-id",
	"srcaddr",
	"dstaddr",
	"srcport",
	"dstport",
	"protocol",
	"packets",
	"bytes",
	"start",
	"end",
	"action",
	"log-status",
];

/// Field names of flow log versions 3 to 5, beyond the version 2 defaults.
const EXTENDED_FIELDS: &[&str] = &[
	"vpc-id",
	"subnet-id",
	"instance-id",
	"tcp-flags",
	"type",
	"pkt-srcaddr",
	"pkt-dstaddr",
	"region",
	"az-id",
	"sublocation-type",
	"sublocation-id",
	"pkt-src-aws-service",
	"pkt-dst-aws-service",
	"flow-direction",
	"traffic-path",
];

const NUMERIC_FIELDS: &[&str] = &[
	"version",
	"srcport",
	"dstport",
	"protocol",
	"packets",
	"bytes",
	"tcp-flags",
	"traffic-path",
];

const TIMESTAMP_FIELDS: &[&str] = &["start", "end"];

/// Value AWS writes for a field with no data.
const NO_DATA: &str = "-";

enum Format {
	Json,
	Text(Vec<String>),
}

pub(crate) struct VpcFlowDecoder {
	flow_log_id: String,
	format: Option<Format>,
}

impl VpcFlowDecoder {
	pub(crate) fn new(flow_log_id: String) -> Self {
		Self {
			flow_log_id,
			format: None,
		}
	}

	/// Pick the format from the first non-blank line. Returns whether that
	/// line was a header.
	fn detect(&mut self, line: &str) -> bool {
		if line.starts_with('{') {
			self.format = Some(Format::Json);
			return false;
		}
		let columns: Vec<String> = line.split_whitespace().map(str::to_string).collect();
		let is_header = columns.iter().any(|column| is_field_name(column));
		if is_header {
			self.format = Some(Format::Text(columns));
		} else {
			self.format = Some(Format::Text(
				DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
			));
		}
		is_header
	}
}

impl LineDecoder for VpcFlowDecoder {
	fn decode(&mut self, line: &str) -> Result<Vec<Fields>, RecordError> {
		if self.format.is_none() && self.detect(line) {
			return Ok(Vec::new());
		}

		let mut fields = match &self.format {
			Some(Format::Text(columns)) => text_row(columns, line)?,
			_ => as_object(serde_json::from_str(line)?)?,
		};
		if !self.flow_log_id.is_empty() {
			fields
				.entry("flow_log_id")
				.or_insert_with(|| Value::from(self.flow_log_id.clone()));
		}
		Ok(vec![fields])
	}
}

fn is_field_name(column: &str) -> bool {
	DEFAULT_FIELDS.contains(&column) || EXTENDED_FIELDS.contains(&column)
}

fn text_row(columns: &[String], line: &str) -> Result<Fields, RecordError> {
	let values: Vec<&str> = line.split_whitespace().collect();
	if values.len() != columns.len() {
		return Err(RecordError::Malformed(format!(
			"expected {} fields, found {}",
			columns.len(),
			values.len()
		)));
	}

	let mut fields = Fields::new();
	for (column, raw) in columns.iter().zip(values) {
		fields.insert(column.clone(), convert(column, raw)?);
	}
	Ok(fields)
}

fn convert(column: &str, raw: &str) -> Result<Value, RecordError> {
	if raw == NO_DATA {
		return Ok(Value::Null);
	}
	if TIMESTAMP_FIELDS.contains(&column) {
		let secs: i64 = raw
			.parse()
			.map_err(|_| RecordError::Malformed(format!("{column} is not a timestamp: {raw}")))?;
		let at = DateTime::from_timestamp(secs, 0)
			.ok_or_else(|| RecordError::Malformed(format!("{column} is out of range: {raw}")))?;
		return Ok(Value::from(at.to_rfc3339_opts(SecondsFormat::Secs, true)));
	}
	if NUMERIC_FIELDS.contains(&column) {
		if let Ok(n) = raw.parse::<i64>() {
			return Ok(Value::from(n));
		}
	}
	Ok(Value::from(raw))
}
