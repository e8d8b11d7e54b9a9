// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Processed-object ledger for Loom bucket log ingestion.
//!
//! Object storage has no change feed, so the collector records every object
//! key it has forwarded in a local SQLite database. Rows are partitioned by
//! [`ScopeKey`](loom_ingest_core::ScopeKey); all access to one scope goes
//! through a [`ScopeSession`], which serializes readers and writers of that
//! scope while leaving other scopes free to proceed.

pub mod error;
pub mod ledger;
pub mod pool;
pub mod testing;

pub use error::{LedgerError, Result};
pub use ledger::{LedgerStore, ScopeRunStatus, ScopeSession};
pub use pool::{create_pool, migrate};
