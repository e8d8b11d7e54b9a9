// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Object store configuration.

use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_ROOT: &str = "./buckets";

/// Directory holding one subdirectory per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
	pub root: PathBuf,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			root: PathBuf::from(DEFAULT_ROOT),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StoreConfigLayer {
	#[serde(default)]
	pub root: Option<PathBuf>,
}

impl StoreConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.root.is_some() {
			self.root = other.root;
		}
	}

	pub fn finalize(self) -> StoreConfig {
		StoreConfig {
			root: self.root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
		}
	}
}
