// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Supported log types and how their objects are laid out in a bucket.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How object keys of a log type are partitioned inside a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
	/// `<prefix>AWSLogs/[<org>/]<account>/<service>/<region>/<Y>/<M>/<D>/...`
	Account,
	/// `<prefix><YYYY>/<MM>/<DD>/...`
	Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogType {
	#[serde(rename = "cloudtrail")]
	CloudTrail,
	#[serde(rename = "config")]
	Config,
	#[serde(rename = "vpcflow")]
	VpcFlow,
	#[serde(rename = "custom")]
	Custom,
	#[serde(rename = "guardduty")]
	GuardDuty,
	#[serde(rename = "inspector")]
	Inspector,
	#[serde(rename = "waf")]
	Waf,
}

impl LogType {
	pub const ALL: [LogType; 7] = [
		LogType::CloudTrail,
		LogType::Config,
		LogType::VpcFlow,
		LogType::Custom,
		LogType::GuardDuty,
		LogType::Inspector,
		LogType::Waf,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			LogType::CloudTrail => "cloudtrail",
			LogType::Config => "config",
			LogType::VpcFlow => "vpcflow",
			LogType::Custom => "custom",
			LogType::GuardDuty => "guardduty",
			LogType::Inspector => "inspector",
			LogType::Waf => "waf",
		}
	}

	pub fn layout(&self) -> KeyLayout {
		match self {
			LogType::CloudTrail | LogType::Config | LogType::VpcFlow => KeyLayout::Account,
			LogType::Custom | LogType::GuardDuty | LogType::Inspector | LogType::Waf => KeyLayout::Flat,
		}
	}

	/// Service directory under `AWSLogs/<account>/` for account-layout types.
	pub fn service_dir(&self) -> Option<&'static str> {
		match self {
			LogType::CloudTrail => Some("CloudTrail"),
			LogType::Config => Some("Config"),
			LogType::VpcFlow => Some("vpcflowlogs"),
			_ => None,
		}
	}

	/// Whether the date partition uses zero-padded months and days.
	///
	/// Config history objects are written under `2024/3/7/`, which does not
	/// sort lexicographically in date order.
	pub fn zero_padded_dates(&self) -> bool {
		!matches!(self, LogType::Config)
	}

	/// Date partition path for `date`, without a trailing slash.
	pub fn date_path(&self, date: NaiveDate) -> String {
		if self.zero_padded_dates() {
			format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day())
		} else {
			format!("{}/{}/{}", date.year(), date.month(), date.day())
		}
	}

	/// Parse the date partition at the start of a key relative to its scope root.
	pub fn partition_date(&self, relative_key: &str) -> Option<NaiveDate> {
		let mut parts = relative_key.split('/');
		let year: i32 = parts.next()?.parse().ok()?;
		let month: u32 = parts.next()?.parse().ok()?;
		let day: u32 = parts.next()?.parse().ok()?;
		NaiveDate::from_ymd_opt(year, month, day)
	}

	/// Key under which ledger entries of this type sort chronologically.
	///
	/// Identity for zero-padded layouts. For Config, single-digit numeric
	/// path segments are padded to two digits so `2024/9/30` sorts before
	/// `2024/10/1`.
	pub fn ledger_order_key(&self, key: &str) -> String {
		if self.zero_padded_dates() {
			return key.to_string();
		}
		key.split('/')
			.map(|segment| {
				if segment.len() == 1 && segment.bytes().all(|b| b.is_ascii_digit()) {
					format!("0{segment}")
				} else {
					segment.to_string()
				}
			})
			.collect::<Vec<_>>()
			.join("/")
	}

	/// Sub-dimension of the ledger scope carried by an object key.
	///
	/// Only VPC flow logs have one: the flow log id embedded in the object
	/// name `<account>_vpcflowlogs_<region>_<flow-log-id>_<timestamp>_<hash>.log.gz`.
	pub fn sub_scope_of(&self, key: &str) -> String {
		if *self != LogType::VpcFlow {
			return String::new();
		}
		let name = key.rsplit('/').next().unwrap_or(key);
		let parts: Vec<&str> = name.split('_').collect();
		if parts.len() >= 5 && parts[1] == "vpcflowlogs" {
			parts[3].to_string()
		} else {
			String::new()
		}
	}
}

impl std::fmt::Display for LogType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for LogType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"cloudtrail" => Ok(LogType::CloudTrail),
			"config" => Ok(LogType::Config),
			"vpcflow" => Ok(LogType::VpcFlow),
			"custom" => Ok(LogType::Custom),
			"guardduty" => Ok(LogType::GuardDuty),
			"inspector" => Ok(LogType::Inspector),
			"waf" => Ok(LogType::Waf),
			_ => Err(format!("unknown log type: {s}")),
		}
	}
}
