// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom bucket log ingestion.
//!
//! This crate holds the data model shared by the ledger, the log parsers and
//! the bucket processor:
//! - [`LogType`]: the closed set of supported log types and their key layouts
//! - [`ScopeKey`]: the (bucket, account, region, log type[, sub-scope]) ledger partition
//! - [`BucketDescriptor`]: immutable per-run bucket configuration
//! - [`ParsedEvent`]: a single event extracted from a log object

pub mod context;
pub mod descriptor;
pub mod event;
pub mod log_type;
pub mod scope;

pub use context::CancellationToken;
pub use descriptor::{AccountSelection, BucketDescriptor, DiscardRule, DEFAULT_RETAIN_COUNT};
pub use event::{CandidateKey, ParsedEvent};
pub use log_type::{KeyLayout, LogType};
pub use scope::{ScopeKey, GLOBAL_REGION, UNSPECIFIED_ACCOUNT};

/// Ledger schema version written by this build of the collector.
///
/// A ledger scope stamped with a different version must be migrated by an
/// operator before this collector will touch it.
pub const LEDGER_SCHEMA_VERSION: &str = env!("CARGO_PKG_VERSION");
