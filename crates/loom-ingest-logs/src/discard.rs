// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_ingest_core::{DiscardRule, ParsedEvent};
use serde_json::Value;

/// Whether `event` matches the discard rule and must not be forwarded.
///
/// Strings are matched as-is, numbers and booleans by their textual form and
/// arrays when any element matches. Objects, nulls and missing fields never
/// match.
pub fn should_discard(rule: &DiscardRule, event: &ParsedEvent) -> bool {
	event
		.get(&rule.field)
		.is_some_and(|value| value_matches(rule, value))
}

fn value_matches(rule: &DiscardRule, value: &Value) -> bool {
	match value {
		Value::String(s) => rule.regex.is_match(s),
		Value::Number(n) => rule.regex.is_match(&n.to_string()),
		Value::Bool(b) => rule.regex.is_match(if *b { "true" } else { "false" }),
		Value::Array(items) => items.iter().any(|item| value_matches(rule, item)),
		Value::Null | Value::Object(_) => false,
	}
}
