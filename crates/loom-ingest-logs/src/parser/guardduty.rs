// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::Value;

use super::{as_object, require_str, Fields, LineDecoder};
use crate::error::RecordError;

const PORT_PROBE: &str = "PORT_PROBE";

/// GuardDuty findings exported through Firehose, one JSON object per line.
///
/// A port-probe finding lists every probed port under
/// `service.action.portProbeAction.portProbeDetails`; each detail becomes its
/// own event carrying that single detail.
pub(crate) struct GuardDutyDecoder;

impl LineDecoder for GuardDutyDecoder {
	fn decode(&mut self, line: &str) -> Result<Vec<Fields>, RecordError> {
		let finding = as_object(serde_json::from_str(line)?)?;
		require_str(&finding, "id")?;
		require_str(&finding, "type")?;
		Ok(split_port_probe(finding))
	}
}

fn split_port_probe(finding: Fields) -> Vec<Fields> {
	let details = match finding.get("service").and_then(|s| s.get("action")) {
		Some(action) if action.get("actionType").and_then(Value::as_str) == Some(PORT_PROBE) => action
			.pointer("/portProbeAction/portProbeDetails")
			.and_then(Value::as_array)
			.cloned()
			.unwrap_or_default(),
		_ => Vec::new(),
	};
	if details.len() <= 1 {
		return vec![finding];
	}

	details
		.into_iter()
		.map(|detail| {
			let mut event = finding.clone();
			if let Some(slot) = event
				.get_mut("service")
				.and_then(|s| s.pointer_mut("/action/portProbeAction/portProbeDetails"))
			{
				*slot = detail;
			}
			event
		})
		.collect()
}
