// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `[[buckets]]` entries.

use chrono::NaiveDate;
use loom_ingest_core::{AccountSelection, BucketDescriptor, DiscardRule, LogType};
use serde::Deserialize;

use crate::error::ConfigError;

/// One bucket as written in the config file. Only loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BucketConfigLayer {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub log_type: Option<String>,
	#[serde(default)]
	pub prefix: Option<String>,
	#[serde(default)]
	pub suffix: Option<String>,
	#[serde(default)]
	pub accounts: Option<Vec<String>>,
	#[serde(default)]
	pub regions: Option<Vec<String>>,
	#[serde(default)]
	pub organization_id: Option<String>,
	#[serde(default)]
	pub only_logs_after: Option<String>,
	#[serde(default)]
	pub discard_field: Option<String>,
	#[serde(default)]
	pub discard_regex: Option<String>,
	#[serde(default)]
	pub skip_on_error: Option<bool>,
	#[serde(default)]
	pub reparse: Option<bool>,
	#[serde(default)]
	pub retain_count: Option<u32>,
}

impl BucketConfigLayer {
	/// Validate the entry and build its descriptor.
	///
	/// `index` is the entry's position in `[[buckets]]`, used in error messages.
	pub fn finalize(self, index: usize, default_retain_count: u32) -> Result<BucketDescriptor, ConfigError> {
		let invalid = |message: String| ConfigError::Validation(format!("buckets[{index}]: {message}"));

		let name = self
			.name
			.filter(|n| !n.trim().is_empty())
			.ok_or_else(|| invalid("name is required".to_string()))?;
		let log_type: LogType = self
			.log_type
			.ok_or_else(|| invalid("log_type is required".to_string()))?
			.parse()
			.map_err(invalid)?;

		let only_logs_after = self
			.only_logs_after
			.as_deref()
			.map(parse_only_logs_after)
			.transpose()
			.map_err(invalid)?;

		let discard = match (self.discard_field, self.discard_regex) {
			(None, None) => None,
			(Some(field), Some(pattern)) => Some(
				DiscardRule::new(field, &pattern)
					.map_err(|e| invalid(format!("invalid discard_regex: {e}")))?,
			),
			_ => {
				return Err(invalid(
					"discard_field and discard_regex must be set together".to_string(),
				))
			}
		};

		let retain_count = self.retain_count.unwrap_or(default_retain_count);
		if retain_count == 0 {
			return Err(invalid("retain_count must be greater than zero".to_string()));
		}

		let accounts = match self.accounts {
			Some(ids) if !ids.is_empty() => AccountSelection::Only(ids),
			_ => AccountSelection::All,
		};

		Ok(BucketDescriptor::new(name, log_type)
			.with_prefix(self.prefix.unwrap_or_default())
			.with_suffix(self.suffix.unwrap_or_default())
			.with_accounts(accounts)
			.with_regions(self.regions.unwrap_or_default())
			.with_organization_id(self.organization_id)
			.with_only_logs_after(only_logs_after)
			.with_discard(discard)
			.with_skip_on_error(self.skip_on_error.unwrap_or(false))
			.with_reparse(self.reparse.unwrap_or(false))
			.with_retain_count(retain_count))
	}
}

/// Parse `2024-JAN-31` (month abbreviation, any case) or `2024-01-31`.
pub fn parse_only_logs_after(value: &str) -> Result<NaiveDate, String> {
	let value = value.trim();
	NaiveDate::parse_from_str(value, "%Y-%b-%d")
		.or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
		.map_err(|_| format!("invalid only_logs_after '{value}' (expected YYYY-MMM-DD or YYYY-MM-DD)"))
}
