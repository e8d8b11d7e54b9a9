// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use loom_ingest_core::{LogType, ScopeKey, LEDGER_SCHEMA_VERSION};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteQueryResult, SqliteRow};
use sqlx::{Row, Sqlite};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{LedgerError, Result};

const BASE_FILTER: &str = "bucket_path = ? AND account_id = ? AND region = ? AND log_type = ?";
const SCOPE_FILTER: &str =
	"bucket_path = ? AND account_id = ? AND region = ? AND log_type = ? AND sub_scope = ?";

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_base<'q>(query: SqliteQuery<'q>, scope: &'q ScopeKey) -> SqliteQuery<'q> {
	query
		.bind(scope.bucket_path.as_str())
		.bind(scope.account_id.as_str())
		.bind(scope.region.as_str())
		.bind(scope.log_type.as_str())
}

fn bind_scope<'q>(query: SqliteQuery<'q>, scope: &'q ScopeKey) -> SqliteQuery<'q> {
	bind_base(query, scope).bind(scope.sub_scope.as_str())
}

fn scope_from_row(row: &SqliteRow, with_sub_scope: bool) -> Result<ScopeKey> {
	let log_type: String = row.try_get("log_type")?;
	let log_type: LogType = log_type.parse().map_err(LedgerError::Internal)?;
	let scope = ScopeKey::new(
		row.try_get::<String, _>("bucket_path")?,
		row.try_get::<String, _>("account_id")?,
		row.try_get::<String, _>("region")?,
		log_type,
	);
	if with_sub_scope {
		Ok(scope.with_sub_scope(row.try_get::<String, _>("sub_scope")?))
	} else {
		Ok(scope)
	}
}

/// Last successful run of a base scope, surfaced by the status API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeRunStatus {
	pub scope: ScopeKey,
	pub last_success_at: DateTime<Utc>,
	pub keys_processed: u64,
}

/// SQLite-backed record of processed object keys.
pub struct LedgerStore {
	pool: SqlitePool,
	expected_version: String,
	locks: Mutex<HashMap<ScopeKey, Arc<AsyncMutex<()>>>>,
}

impl LedgerStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self::with_schema_version(pool, LEDGER_SCHEMA_VERSION)
	}

	pub fn with_schema_version(pool: SqlitePool, expected_version: impl Into<String>) -> Self {
		Self {
			pool,
			expected_version: expected_version.into(),
			locks: Mutex::new(HashMap::new()),
		}
	}

	/// Open (creating if needed) the ledger database at `database_url`.
	#[tracing::instrument(skip(database_url))]
	pub async fn open(database_url: &str) -> Result<Self> {
		let pool = crate::pool::create_pool(database_url).await?;
		crate::pool::migrate(&pool).await?;
		Ok(Self::new(pool))
	}

	pub fn expected_schema_version(&self) -> &str {
		&self.expected_version
	}

	/// Acquire exclusive access to the base scope of `scope`.
	///
	/// Waits while another session holds the same base scope.
	pub async fn session(&self, scope: &ScopeKey) -> ScopeSession<'_> {
		let base = scope.base();
		let lock = {
			let mut locks = self.locks.lock();
			Arc::clone(
				locks
					.entry(base.clone())
					.or_insert_with(|| Arc::new(AsyncMutex::new(()))),
			)
		};
		let guard = lock.lock_owned().await;
		tracing::trace!(scope = %base, "ledger session acquired");
		ScopeSession {
			store: self,
			base,
			_guard: guard,
		}
	}

	/// Every full scope (including sub-scopes) that has ledger rows.
	#[tracing::instrument(skip(self))]
	pub async fn scopes(&self) -> Result<Vec<ScopeKey>> {
		let rows = sqlx::query(
			r#"
			SELECT DISTINCT bucket_path, account_id, region, log_type, sub_scope
			FROM processed_objects
			ORDER BY bucket_path, account_id, region, log_type, sub_scope
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|row| scope_from_row(row, true)).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn last_successful_runs(&self) -> Result<Vec<ScopeRunStatus>> {
		let rows = sqlx::query(
			r#"
			SELECT bucket_path, account_id, region, log_type, last_success_at, keys_processed
			FROM scope_runs
			ORDER BY bucket_path, account_id, region, log_type
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows
			.iter()
			.map(|row| {
				Ok(ScopeRunStatus {
					scope: scope_from_row(row, false)?,
					last_success_at: row.try_get("last_success_at")?,
					keys_processed: row.try_get::<i64, _>("keys_processed")?.max(0) as u64,
				})
			})
			.collect()
	}
}

/// Exclusive handle on one base scope and its sub-scopes.
///
/// Released when dropped, on every exit path of the holder.
pub struct ScopeSession<'a> {
	store: &'a LedgerStore,
	base: ScopeKey,
	_guard: OwnedMutexGuard<()>,
}

impl ScopeSession<'_> {
	pub fn base_scope(&self) -> &ScopeKey {
		&self.base
	}

	fn check(&self, scope: &ScopeKey) -> Result<()> {
		if scope.same_base(&self.base) {
			Ok(())
		} else {
			Err(LedgerError::ScopeMismatch {
				session: self.base.clone(),
				requested: scope.clone(),
			})
		}
	}

	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn has(&self, scope: &ScopeKey, object_key: &str) -> Result<bool> {
		self.check(scope)?;
		let sql = format!("SELECT 1 FROM processed_objects WHERE {SCOPE_FILTER} AND object_key = ?");
		let row = bind_scope(sqlx::query(&sql), scope)
			.bind(object_key)
			.fetch_optional(&self.store.pool)
			.await?;
		Ok(row.is_some())
	}

	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn mark_processed(&self, scope: &ScopeKey, object_key: &str) -> Result<()> {
		self.check(scope)?;
		let result = self.insert(scope, object_key, "INSERT").await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
				Err(LedgerError::Conflict {
					scope: scope.clone(),
					key: object_key.to_string(),
				})
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Record `object_key` unless it is already present. Returns whether a
	/// row was inserted.
	///
	/// Used when reparsing, where keys already in the ledger are processed
	/// again.
	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn record_processed(&self, scope: &ScopeKey, object_key: &str) -> Result<bool> {
		self.check(scope)?;
		let result = self.insert(scope, object_key, "INSERT OR IGNORE").await?;
		Ok(result.rows_affected() > 0)
	}

	async fn insert(
		&self,
		scope: &ScopeKey,
		object_key: &str,
		verb: &str,
	) -> std::result::Result<SqliteQueryResult, sqlx::Error> {
		let sql = format!(
			"{verb} INTO processed_objects \
			 (bucket_path, account_id, region, log_type, sub_scope, object_key, sort_key, processed_at, schema_version) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
		);
		bind_scope(sqlx::query(&sql), scope)
			.bind(object_key)
			.bind(scope.log_type.ledger_order_key(object_key))
			.bind(Utc::now())
			.bind(self.store.expected_version.as_str())
			.execute(&self.store.pool)
			.await
	}

	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn get_schema_version(&self, scope: &ScopeKey) -> Result<Option<String>> {
		self.check(scope)?;
		let sql = format!("SELECT schema_version FROM scope_metadata WHERE {SCOPE_FILTER}");
		let row = bind_scope(sqlx::query(&sql), scope)
			.fetch_optional(&self.store.pool)
			.await?;
		Ok(row.map(|r| r.try_get("schema_version")).transpose()?)
	}

	/// Stamp `scope` with `version`. A scope is stamped exactly once.
	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn set_schema_version(&self, scope: &ScopeKey, version: &str) -> Result<()> {
		self.check(scope)?;
		let result = bind_scope(
			sqlx::query(
				r#"
				INSERT INTO scope_metadata
					(bucket_path, account_id, region, log_type, sub_scope, schema_version, created_at)
				VALUES (?, ?, ?, ?, ?, ?, ?)
				"#,
			),
			scope,
		)
		.bind(version)
		.bind(Utc::now())
		.execute(&self.store.pool)
		.await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
				Err(LedgerError::Conflict {
					scope: scope.clone(),
					key: "schema_version".to_string(),
				})
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Stamp an unstamped scope with the collector's version, or verify the stamp.
	///
	/// # Errors
	/// `LedgerError::SchemaVersion` when the stored version differs. The scope is
	/// left untouched.
	pub async fn ensure_schema_version(&self, scope: &ScopeKey) -> Result<()> {
		let expected = self.store.expected_version.as_str();
		match self.get_schema_version(scope).await? {
			None => {
				self.set_schema_version(scope, expected).await?;
				tracing::debug!(scope = %scope, version = expected, "ledger scope initialized");
				Ok(())
			}
			Some(stored) if stored == expected => Ok(()),
			Some(stored) => Err(LedgerError::SchemaVersion {
				scope: scope.clone(),
				stored,
				expected: expected.to_string(),
			}),
		}
	}

	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn count(&self, scope: &ScopeKey) -> Result<u64> {
		self.check(scope)?;
		let sql = format!("SELECT COUNT(*) AS cnt FROM processed_objects WHERE {SCOPE_FILTER}");
		let row = bind_scope(sqlx::query(&sql), scope)
			.fetch_one(&self.store.pool)
			.await?;
		let count: i64 = row.try_get("cnt")?;
		Ok(count.max(0) as u64)
	}

	/// The `n` oldest object keys of `scope`, in chronological key order.
	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn oldest_keys(&self, scope: &ScopeKey, n: u64) -> Result<Vec<String>> {
		self.check(scope)?;
		let limit = i64::try_from(n).unwrap_or(i64::MAX);
		let sql = format!(
			"SELECT object_key FROM processed_objects WHERE {SCOPE_FILTER} \
			 ORDER BY sort_key ASC, object_key ASC LIMIT ?"
		);
		let rows = bind_scope(sqlx::query(&sql), scope)
			.bind(limit)
			.fetch_all(&self.store.pool)
			.await?;
		rows
			.iter()
			.map(|row| row.try_get("object_key").map_err(LedgerError::from))
			.collect()
	}

	/// Remove one entry. Returns whether a row existed.
	#[tracing::instrument(skip(self, scope), fields(scope = %scope))]
	pub async fn delete(&self, scope: &ScopeKey, object_key: &str) -> Result<bool> {
		self.check(scope)?;
		let sql = format!("DELETE FROM processed_objects WHERE {SCOPE_FILTER} AND object_key = ?");
		let result = bind_scope(sqlx::query(&sql), scope)
			.bind(object_key)
			.execute(&self.store.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Oldest key recorded anywhere under the session's base scope.
	#[tracing::instrument(skip(self), fields(scope = %self.base))]
	pub async fn first_key(&self) -> Result<Option<String>> {
		let sql = format!(
			"SELECT object_key FROM processed_objects WHERE {BASE_FILTER} \
			 ORDER BY sort_key ASC, object_key ASC LIMIT 1"
		);
		let row = bind_base(sqlx::query(&sql), &self.base)
			.fetch_optional(&self.store.pool)
			.await?;
		Ok(row.map(|r| r.try_get("object_key")).transpose()?)
	}

	/// Full scopes with ledger rows under the session's base scope.
	#[tracing::instrument(skip(self), fields(scope = %self.base))]
	pub async fn sub_scopes(&self) -> Result<Vec<ScopeKey>> {
		let sql = format!(
			"SELECT DISTINCT sub_scope FROM processed_objects WHERE {BASE_FILTER} ORDER BY sub_scope"
		);
		let rows = bind_base(sqlx::query(&sql), &self.base)
			.fetch_all(&self.store.pool)
			.await?;
		rows
			.iter()
			.map(|row| {
				let sub_scope: String = row.try_get("sub_scope")?;
				Ok(self.base.with_sub_scope(sub_scope))
			})
			.collect()
	}

	#[tracing::instrument(skip(self), fields(scope = %self.base))]
	pub async fn record_run_success(&self, at: DateTime<Utc>, keys_processed: u64) -> Result<()> {
		bind_base(
			sqlx::query(
				r#"
				INSERT INTO scope_runs
					(bucket_path, account_id, region, log_type, last_success_at, keys_processed)
				VALUES (?, ?, ?, ?, ?, ?)
				ON CONFLICT(bucket_path, account_id, region, log_type) DO UPDATE SET
					last_success_at = excluded.last_success_at,
					keys_processed = excluded.keys_processed
				"#,
			),
			&self.base,
		)
		.bind(at)
		.bind(i64::try_from(keys_processed).unwrap_or(i64::MAX))
		.execute(&self.store.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(scope = %self.base))]
	pub async fn last_success(&self) -> Result<Option<DateTime<Utc>>> {
		let sql = format!("SELECT last_success_at FROM scope_runs WHERE {BASE_FILTER}");
		let row = bind_base(sqlx::query(&sql), &self.base)
			.fetch_optional(&self.store.pool)
			.await?;
		Ok(row.map(|r| r.try_get("last_success_at")).transpose()?)
	}
}
