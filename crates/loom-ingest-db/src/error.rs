// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_ingest_core::ScopeKey;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Conflict: '{key}' is already recorded for scope {scope}")]
	Conflict { scope: ScopeKey, key: String },

	#[error(
		"Schema version mismatch for scope {scope}: ledger has {stored}, collector expects {expected}; \
		 the ledger must be migrated before this scope can be processed"
	)]
	SchemaVersion {
		scope: ScopeKey,
		stored: String,
		expected: String,
	},

	#[error("Scope {requested} is not covered by the session for {session}")]
	ScopeMismatch {
		session: ScopeKey,
		requested: ScopeKey,
	},

	#[error("Internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
