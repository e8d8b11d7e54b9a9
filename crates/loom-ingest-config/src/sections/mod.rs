// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod buckets;
mod collector;
mod database;
mod logging;
mod retry;
mod sink;
mod store;

pub use buckets::{parse_only_logs_after, BucketConfigLayer};
pub use collector::{CollectorConfig, CollectorConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use retry::{RetryConfig, RetryConfigLayer};
pub use sink::{SinkConfig, SinkConfigLayer, SinkKind};
pub use store::{StoreConfig, StoreConfigLayer};
