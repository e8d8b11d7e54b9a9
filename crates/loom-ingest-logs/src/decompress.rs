// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::{Cursor, Read};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use tracing::warn;

use crate::error::{DecompressError, DecompressionError};

/// Containers we recognize but cannot read.
const UNSUPPORTED_SUFFIXES: &[&str] = &["snappy", "parquet"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decompressed {
	Data(Bytes),
	/// Unsupported container skipped under skip-on-error.
	Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
	Gzip,
	Zip,
	Plain,
	Unsupported,
}

fn suffix_of(key: &str) -> Option<String> {
	let name = key.rsplit('/').next().unwrap_or(key);
	name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

fn container_for(suffix: Option<&str>) -> Container {
	match suffix {
		Some("gz") => Container::Gzip,
		Some("zip") => Container::Zip,
		Some(s) if UNSUPPORTED_SUFFIXES.contains(&s) => Container::Unsupported,
		_ => Container::Plain,
	}
}

/// Decompress `raw` according to the suffix of `key`.
///
/// Keys with an unknown suffix pass through unchanged. A recognized but
/// unsupported container yields [`Decompressed::Skipped`] when `skip_on_error`
/// is set and [`DecompressError::Unsupported`] otherwise. Corrupt `.gz` and
/// `.zip` objects are always errors.
pub fn decompress(key: &str, raw: Bytes, skip_on_error: bool) -> Result<Decompressed, DecompressError> {
	let suffix = suffix_of(key);
	let corrupt = |source| DecompressError::Corrupt {
		key: key.to_string(),
		source,
	};

	match container_for(suffix.as_deref()) {
		Container::Gzip => gunzip(&raw).map(Decompressed::Data).map_err(corrupt),
		Container::Zip => unzip_first(&raw).map(Decompressed::Data).map_err(corrupt),
		Container::Plain => Ok(Decompressed::Data(raw)),
		Container::Unsupported => {
			let suffix = suffix.unwrap_or_default();
			if skip_on_error {
				warn!(key = %key, suffix = %suffix, "skipping object with unsupported compression");
				Ok(Decompressed::Skipped)
			} else {
				Err(DecompressError::Unsupported {
					key: key.to_string(),
					suffix,
				})
			}
		}
	}
}

/// Decode every member of a possibly multi-member gzip stream.
fn gunzip(raw: &[u8]) -> Result<Bytes, DecompressionError> {
	let mut decoder = MultiGzDecoder::new(raw);
	let mut out = Vec::new();
	decoder
		.read_to_end(&mut out)
		.map_err(DecompressionError::Gzip)?;
	Ok(Bytes::from(out))
}

fn unzip_first(raw: &[u8]) -> Result<Bytes, DecompressionError> {
	let mut archive = zip::ZipArchive::new(Cursor::new(raw))?;
	if archive.is_empty() {
		return Err(DecompressionError::EmptyArchive);
	}
	let mut entry = archive.by_index(0)?;
	let mut out = Vec::new();
	entry
		.read_to_end(&mut out)
		.map_err(DecompressionError::ZipEntry)?;
	Ok(Bytes::from(out))
}
