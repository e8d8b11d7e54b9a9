// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use super::{as_object, Fields, LineDecoder};
use crate::error::RecordError;

/// Newline-delimited JSON objects with no further structure.
pub(crate) struct CustomDecoder;

impl LineDecoder for CustomDecoder {
	fn decode(&mut self, line: &str) -> Result<Vec<Fields>, RecordError> {
		Ok(vec![as_object(serde_json::from_str(line)?)?])
	}
}
