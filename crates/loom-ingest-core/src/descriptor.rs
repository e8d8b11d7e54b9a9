// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-run bucket configuration.

use chrono::NaiveDate;
use regex::Regex;

use crate::log_type::{KeyLayout, LogType};
use crate::scope::{ScopeKey, GLOBAL_REGION, UNSPECIFIED_ACCOUNT};

pub const DEFAULT_RETAIN_COUNT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelection {
	/// Every account found under `AWSLogs/`.
	All,
	Only(Vec<String>),
}

/// Drop events whose `field` value matches `regex` before they are forwarded.
#[derive(Debug, Clone)]
pub struct DiscardRule {
	pub field: String,
	pub regex: Regex,
}

impl DiscardRule {
	pub fn new(field: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
		Ok(Self {
			field: field.into(),
			regex: Regex::new(pattern)?,
		})
	}
}

/// Immutable description of one bucket to ingest from.
#[derive(Debug, Clone)]
pub struct BucketDescriptor {
	pub bucket: String,
	pub log_type: LogType,
	/// Key prefix, always empty or ending with `/`.
	pub prefix: String,
	pub suffix: String,
	pub accounts: AccountSelection,
	/// Regions to ingest; empty means every region found in the bucket.
	pub regions: Vec<String>,
	pub organization_id: Option<String>,
	pub only_logs_after: Option<NaiveDate>,
	pub discard: Option<DiscardRule>,
	pub skip_on_error: bool,
	/// Process keys again even when the ledger already records them.
	pub reparse: bool,
	pub retain_count: u32,
}

impl BucketDescriptor {
	pub fn new(bucket: impl Into<String>, log_type: LogType) -> Self {
		Self {
			bucket: bucket.into(),
			log_type,
			prefix: String::new(),
			suffix: String::new(),
			accounts: AccountSelection::All,
			regions: Vec::new(),
			organization_id: None,
			only_logs_after: None,
			discard: None,
			skip_on_error: false,
			reparse: false,
			retain_count: DEFAULT_RETAIN_COUNT,
		}
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = normalize_prefix(prefix.into());
		self
	}

	pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.suffix = suffix.into();
		self
	}

	pub fn with_accounts(mut self, accounts: AccountSelection) -> Self {
		self.accounts = accounts;
		self
	}

	pub fn with_regions(mut self, regions: Vec<String>) -> Self {
		self.regions = regions;
		self
	}

	pub fn with_organization_id(mut self, organization_id: Option<String>) -> Self {
		self.organization_id = organization_id;
		self
	}

	pub fn with_only_logs_after(mut self, date: Option<NaiveDate>) -> Self {
		self.only_logs_after = date;
		self
	}

	pub fn with_discard(mut self, rule: Option<DiscardRule>) -> Self {
		self.discard = rule;
		self
	}

	pub fn with_skip_on_error(mut self, skip_on_error: bool) -> Self {
		self.skip_on_error = skip_on_error;
		self
	}

	pub fn with_reparse(mut self, reparse: bool) -> Self {
		self.reparse = reparse;
		self
	}

	pub fn with_retain_count(mut self, retain_count: u32) -> Self {
		self.retain_count = retain_count;
		self
	}

	/// Bucket name joined with the prefix; the ledger's bucket dimension.
	pub fn bucket_path(&self) -> String {
		format!("{}/{}", self.bucket, self.prefix)
	}

	/// `<prefix>AWSLogs/[<org>/]`, under which account directories live.
	pub fn accounts_root(&self) -> String {
		match &self.organization_id {
			Some(org) => format!("{}AWSLogs/{}/", self.prefix, org),
			None => format!("{}AWSLogs/", self.prefix),
		}
	}

	/// `<prefix>AWSLogs/[<org>/]<account>/<service>/`, under which region directories live.
	pub fn regions_root(&self, account_id: &str) -> String {
		let service = self.log_type.service_dir().unwrap_or_default();
		format!("{}{}/{}/", self.accounts_root(), account_id, service)
	}

	/// Root under which the date partitions of `scope` live.
	pub fn scope_root(&self, scope: &ScopeKey) -> String {
		match self.log_type.layout() {
			KeyLayout::Account => format!("{}{}/", self.regions_root(&scope.account_id), scope.region),
			KeyLayout::Flat => self.prefix.clone(),
		}
	}

	/// The single scope of a flat-layout bucket.
	pub fn flat_scope(&self) -> ScopeKey {
		let account = match &self.accounts {
			AccountSelection::Only(ids) if !ids.is_empty() => ids[0].clone(),
			_ => UNSPECIFIED_ACCOUNT.to_string(),
		};
		ScopeKey::new(self.bucket_path(), account, GLOBAL_REGION, self.log_type)
	}

	pub fn account_scope(&self, account_id: &str, region: &str) -> ScopeKey {
		ScopeKey::new(self.bucket_path(), account_id, region, self.log_type)
	}

	pub fn matches_suffix(&self, key: &str) -> bool {
		self.suffix.is_empty() || key.ends_with(&self.suffix)
	}
}

fn normalize_prefix(prefix: String) -> String {
	if prefix.is_empty() || prefix.ends_with('/') {
		prefix
	} else {
		format!("{prefix}/")
	}
}
