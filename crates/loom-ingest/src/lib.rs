// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Security log collector for object-storage buckets.
//!
//! Enumerates date-partitioned log objects, decompresses and parses them per
//! log type, forwards the resulting events to an [`EventSink`] and records
//! each processed key in the ledger so it is never forwarded twice.
//!
//! The pieces compose as:
//! - [`ObjectStore`]: listing and fetching objects
//! - [`BucketProcessor`]: the per-scope ingestion run
//! - [`maintenance`]: bounded ledger retention
//! - [`Collector`]: periodic scheduling of all configured buckets

pub mod collector;
pub mod error;
pub mod maintenance;
pub mod object_store;
pub mod processor;
pub mod retry;
pub mod sink;
pub mod status;
pub mod testing;

pub use collector::Collector;
pub use error::{IngestError, Result};
pub use maintenance::{maintain, MaintenanceReport, Maintainer};
pub use object_store::{ListPage, ListRequest, LocalObjectStore, ObjectStore, ObjectStoreError};
pub use processor::{BucketProcessor, BucketRunReport, ScopeOutcome, ScopeRunReport};
pub use retry::{calculate_backoff_delay, with_retry, Retryable};
pub use sink::{EventSink, FileEventSink, SinkError, StdoutEventSink, TracingEventSink};
pub use status::{format_version_info, CollectorStatus};
