// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_ingest_db::LedgerError;
use loom_ingest_logs::{DecompressError, DecompressionError, ParseError};
use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::sink::SinkError;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure that aborts the run of the scope it happened in.
#[derive(Error, Debug)]
pub enum IngestError {
	#[error("object store error on {bucket}/{key}: {source}")]
	ObjectStore {
		bucket: String,
		key: String,
		#[source]
		source: ObjectStoreError,
	},

	#[error("failed to decompress {key}: {source}")]
	Decompression {
		key: String,
		#[source]
		source: DecompressionError,
	},

	#[error("unsupported compression '{suffix}' for {key}")]
	UnsupportedCompression { key: String, suffix: String },

	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error("sink '{sink}' rejected event from {key}: {source}")]
	Sink {
		sink: String,
		key: String,
		#[source]
		source: SinkError,
	},

	#[error(transparent)]
	Ledger(#[from] LedgerError),
}

impl IngestError {
	/// Object key the failure is attributed to, when there is one.
	pub fn key(&self) -> Option<&str> {
		match self {
			IngestError::ObjectStore { key, .. }
			| IngestError::Decompression { key, .. }
			| IngestError::UnsupportedCompression { key, .. }
			| IngestError::Sink { key, .. } => Some(key),
			IngestError::Parse(e) => Some(e.key()),
			IngestError::Ledger(_) => None,
		}
	}
}

impl From<DecompressError> for IngestError {
	fn from(e: DecompressError) -> Self {
		match e {
			DecompressError::Unsupported { key, suffix } => {
				IngestError::UnsupportedCompression { key, suffix }
			}
			DecompressError::Corrupt { key, source } => IngestError::Decompression { key, source },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unsupported_compression_keeps_key_and_suffix() {
		let err: IngestError = DecompressError::Unsupported {
			key: "a/b.snappy".to_string(),
			suffix: "snappy".to_string(),
		}
		.into();
		assert_eq!(err.key(), Some("a/b.snappy"));
		assert_eq!(err.to_string(), "unsupported compression 'snappy' for a/b.snappy");
	}

	#[test]
	fn test_corrupt_archive_maps_to_decompression() {
		let err: IngestError = DecompressError::Corrupt {
			key: "a.zip".to_string(),
			source: DecompressionError::EmptyArchive,
		}
		.into();
		assert!(matches!(err, IngestError::Decompression { .. }));
		assert_eq!(err.key(), Some("a.zip"));
	}

	#[test]
	fn test_ledger_error_has_no_key() {
		let err: IngestError = LedgerError::Internal("boom".to_string()).into();
		assert_eq!(err.key(), None);
	}
}
