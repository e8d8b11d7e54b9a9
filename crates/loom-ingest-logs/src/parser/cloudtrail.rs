// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CloudTrail log files: `{"Records": [ {event}, ... ]}`.

use super::{array_document, DocumentResult};

pub(crate) fn records(data: &[u8]) -> DocumentResult {
	array_document(data, "Records")
}
