// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AWS Config history and snapshot files: `{"configurationItems": [ ... ]}`.

use super::{array_document, DocumentResult};

pub(crate) fn records(data: &[u8]) -> DocumentResult {
	array_document(data, "configurationItems")
}

#[cfg(test)]
mod tests {
	use crate::error::ParseError;
	use crate::parser::tests::{collect, events};
	use loom_ingest_core::LogType;

	#[test]
	fn test_configuration_items() {
		let data = br#"{"fileVersion":"1.0","configurationItems":[
			{"resourceType":"AWS::EC2::Instance","resourceId":"i-1","configurationItemStatus":"OK"},
			{"resourceType":"AWS::S3::Bucket","resourceId":"logs"}
		]}"#;
		let events = events(LogType::Config, data, false);
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].fields["resourceId"], "i-1");
		assert!(!events[0].fields.contains_key("fileVersion"));
	}

	#[test]
	fn test_wrong_structure() {
		let data = br#"{"configurationItems":{"resourceId":"i-1"}}"#;
		let results = collect(LogType::Config, data, "k", false);
		assert!(matches!(
			results.as_slice(),
			[Err(ParseError::MissingField { .. })]
		));
		assert!(collect(LogType::Config, data, "k", true).is_empty());
	}
}
