// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Downstream event sink configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
	#[default]
	Stdout,
	File,
	Tracing,
}

impl std::str::FromStr for SinkKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"stdout" => Ok(SinkKind::Stdout),
			"file" => Ok(SinkKind::File),
			"tracing" => Ok(SinkKind::Tracing),
			_ => Err(format!("unknown sink kind '{s}' (expected stdout, file or tracing)")),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkConfig {
	pub kind: SinkKind,
	/// Output file, required for [`SinkKind::File`].
	pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SinkConfigLayer {
	#[serde(default)]
	pub kind: Option<SinkKind>,
	#[serde(default)]
	pub path: Option<PathBuf>,
}

impl SinkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.kind.is_some() {
			self.kind = other.kind;
		}
		if other.path.is_some() {
			self.path = other.path;
		}
	}

	pub fn finalize(self) -> SinkConfig {
		SinkConfig {
			kind: self.kind.unwrap_or_default(),
			path: self.path,
		}
	}
}
