// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_ingest_core::ScopeKey;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::ledger::{LedgerStore, ScopeSession};

/// In-memory pool with the ledger schema applied.
///
/// Limited to one connection: every `:memory:` connection is its own database.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	crate::pool::migrate(&pool).await.unwrap();
	pool
}

pub async fn create_test_ledger() -> LedgerStore {
	LedgerStore::new(create_test_pool().await)
}

pub async fn create_test_ledger_with_version(version: &str) -> LedgerStore {
	LedgerStore::with_schema_version(create_test_pool().await, version)
}

pub async fn seed_keys(session: &ScopeSession<'_>, scope: &ScopeKey, keys: &[&str]) {
	for key in keys {
		session.mark_processed(scope, key).await.unwrap();
	}
}
