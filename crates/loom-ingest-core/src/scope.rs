// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::log_type::LogType;

/// Region recorded for log types whose keys carry no region.
pub const GLOBAL_REGION: &str = "global";

/// Account recorded for flat-layout buckets configured without an account.
pub const UNSPECIFIED_ACCOUNT: &str = "unspecified";

/// Ledger partition under which processed keys and retention are tracked.
///
/// `bucket_path` is the bucket name joined with the configured prefix so two
/// buckets (or two prefixes of one bucket) never share ledger rows.
/// `sub_scope` is empty except for VPC flow logs, where it holds the flow log id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
	pub bucket_path: String,
	pub account_id: String,
	pub region: String,
	pub log_type: LogType,
	pub sub_scope: String,
}

impl ScopeKey {
	pub fn new(
		bucket_path: impl Into<String>,
		account_id: impl Into<String>,
		region: impl Into<String>,
		log_type: LogType,
	) -> Self {
		Self {
			bucket_path: bucket_path.into(),
			account_id: account_id.into(),
			region: region.into(),
			log_type,
			sub_scope: String::new(),
		}
	}

	pub fn with_sub_scope(&self, sub_scope: impl Into<String>) -> Self {
		Self {
			sub_scope: sub_scope.into(),
			..self.clone()
		}
	}

	/// The scope without its sub-dimension.
	pub fn base(&self) -> Self {
		self.with_sub_scope(String::new())
	}

	pub fn same_base(&self, other: &ScopeKey) -> bool {
		self.bucket_path == other.bucket_path
			&& self.account_id == other.account_id
			&& self.region == other.region
			&& self.log_type == other.log_type
	}
}

impl std::fmt::Display for ScopeKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{}:{}/{}/{}",
			self.bucket_path, self.account_id, self.region, self.log_type
		)?;
		if !self.sub_scope.is_empty() {
			write!(f, "/{}", self.sub_scope)?;
		}
		Ok(())
	}
}
