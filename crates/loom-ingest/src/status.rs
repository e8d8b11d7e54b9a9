// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only collector status for the control plane.

use loom_ingest_db::{LedgerStore, Result, ScopeRunStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorStatus {
	pub version: String,
	pub scopes: Vec<ScopeRunStatus>,
}

impl CollectorStatus {
	/// Last successful run of every scope recorded in `ledger`.
	pub async fn collect(ledger: &LedgerStore) -> Result<Self> {
		let scopes = ledger.last_successful_runs().await?;
		Ok(Self {
			version: env!("CARGO_PKG_VERSION").to_string(),
			scopes,
		})
	}
}

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"loom-ingest version: {}\n\
		 Ledger schema:       {}\n\
		 Log types:           {}",
		env!("CARGO_PKG_VERSION"),
		loom_ingest_core::LEDGER_SCHEMA_VERSION,
		loom_ingest_core::LogType::ALL
			.iter()
			.map(|t| t.as_str())
			.collect::<Vec<_>>()
			.join(", "),
	)
}
