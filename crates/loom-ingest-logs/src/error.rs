// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// A supported container whose contents could not be read.
#[derive(Debug, thiserror::Error)]
pub enum DecompressionError {
	#[error("gzip stream is corrupt: {0}")]
	Gzip(#[source] std::io::Error),

	#[error("zip archive is corrupt: {0}")]
	Zip(#[from] zip::result::ZipError),

	#[error("zip entry could not be read: {0}")]
	ZipEntry(#[source] std::io::Error),

	#[error("zip archive has no entries")]
	EmptyArchive,
}

#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
	#[error("unsupported compression '{suffix}' for {key}")]
	Unsupported { key: String, suffix: String },

	#[error("failed to decompress {key}: {source}")]
	Corrupt {
		key: String,
		#[source]
		source: DecompressionError,
	},
}

/// A malformed record or document.
///
/// `record` is the 1-based line number for line-delimited formats and the
/// 1-based position within the document for single-document formats.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
	#[error("invalid JSON in {key} (record {record}): {source}")]
	InvalidJson {
		key: String,
		record: usize,
		#[source]
		source: serde_json::Error,
	},

	#[error("record {record} of {key} is missing required field '{field}'")]
	MissingField {
		key: String,
		record: usize,
		field: String,
	},

	#[error("record {record} of {key} is malformed: {message}")]
	Malformed {
		key: String,
		record: usize,
		message: String,
	},

	#[error("line {record} of {key} is not valid UTF-8")]
	InvalidUtf8 { key: String, record: usize },
}

impl ParseError {
	pub fn key(&self) -> &str {
		match self {
			ParseError::InvalidJson { key, .. }
			| ParseError::MissingField { key, .. }
			| ParseError::Malformed { key, .. }
			| ParseError::InvalidUtf8 { key, .. } => key,
		}
	}
}

/// Failure of one record, before the object key and position are attached.
#[derive(Debug)]
pub(crate) enum RecordError {
	Json(serde_json::Error),
	MissingField(&'static str),
	Malformed(String),
}

impl RecordError {
	pub(crate) fn at(self, key: &str, record: usize) -> ParseError {
		let key = key.to_string();
		match self {
			RecordError::Json(source) => ParseError::InvalidJson {
				key,
				record,
				source,
			},
			RecordError::MissingField(field) => ParseError::MissingField {
				key,
				record,
				field: field.to_string(),
			},
			RecordError::Malformed(message) => ParseError::Malformed {
				key,
				record,
				message,
			},
		}
	}
}

impl From<serde_json::Error> for RecordError {
	fn from(e: serde_json::Error) -> Self {
		RecordError::Json(e)
	}
}
