// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::Value;

use super::{as_object, Fields, LineDecoder};
use crate::error::RecordError;

/// Inspector findings, one JSON object per line.
///
/// Findings are identified by `findingArn` (Inspector v2) or `arn` (Classic).
pub(crate) struct InspectorDecoder;

impl LineDecoder for InspectorDecoder {
	fn decode(&mut self, line: &str) -> Result<Vec<Fields>, RecordError> {
		let finding = as_object(serde_json::from_str(line)?)?;
		let identified = ["findingArn", "arn"]
			.iter()
			.any(|field| matches!(finding.get(*field), Some(Value::String(_))));
		if !identified {
			return Err(RecordError::MissingField("findingArn"));
		}
		Ok(vec![finding])
	}
}

#[cfg(test)]
mod tests {
	use crate::error::ParseError;
	use crate::parser::tests::{collect, events};
	use loom_ingest_core::LogType;

	#[test]
	fn test_v2_and_classic_findings() {
		let data = br#"{"findingArn":"arn:aws:inspector2:us-east-1:1:finding/a","severity":"HIGH"}
{"arn":"arn:aws:inspector:us-east-1:1:target/t/finding/b","severity":"Low"}"#;
		let events = events(LogType::Inspector, data, false);
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].fields["severity"], "HIGH");
	}

	#[test]
	fn test_finding_without_arn() {
		let data = b"{\"severity\":\"HIGH\"}\n{\"arn\":\"x\"}\n";
		let results = collect(LogType::Inspector, data, "k", false);
		assert!(matches!(
			results.as_slice(),
			[Err(ParseError::MissingField { record: 1, .. })]
		));
		assert_eq!(events(LogType::Inspector, data, true).len(), 1);
	}
}
