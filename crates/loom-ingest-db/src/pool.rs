// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::LedgerError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./loom-ingest.db")
///
/// # Errors
/// Returns `LedgerError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, LedgerError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| LedgerError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("ledger pool created");
	Ok(pool)
}

/// Create the ledger tables if they do not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<(), LedgerError> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS processed_objects (
			bucket_path TEXT NOT NULL,
			account_id TEXT NOT NULL,
			region TEXT NOT NULL,
			log_type TEXT NOT NULL,
			sub_scope TEXT NOT NULL DEFAULT '',
			object_key TEXT NOT NULL,
			sort_key TEXT NOT NULL,
			processed_at TEXT NOT NULL,
			schema_version TEXT NOT NULL,
			PRIMARY KEY (bucket_path, account_id, region, log_type, sub_scope, object_key)
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE INDEX IF NOT EXISTS idx_processed_objects_sort
			ON processed_objects (bucket_path, account_id, region, log_type, sub_scope, sort_key)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS scope_metadata (
			bucket_path TEXT NOT NULL,
			account_id TEXT NOT NULL,
			region TEXT NOT NULL,
			log_type TEXT NOT NULL,
			sub_scope TEXT NOT NULL DEFAULT '',
			schema_version TEXT NOT NULL,
			created_at TEXT NOT NULL,
			PRIMARY KEY (bucket_path, account_id, region, log_type, sub_scope)
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS scope_runs (
			bucket_path TEXT NOT NULL,
			account_id TEXT NOT NULL,
			region TEXT NOT NULL,
			log_type TEXT NOT NULL,
			last_success_at TEXT NOT NULL,
			keys_processed INTEGER NOT NULL DEFAULT 0,
			PRIMARY KEY (bucket_path, account_id, region, log_type)
		)
		"#,
	)
	.execute(pool)
	.await?;

	tracing::debug!("ledger schema ready");
	Ok(())
}
