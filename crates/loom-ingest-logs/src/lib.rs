// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turning raw log objects into events.
//!
//! An object's bytes first go through [`decompress`], which picks a
//! container format from the key suffix, then through [`parse`], which
//! selects the parser for the bucket's [`LogType`](loom_ingest_core::LogType).
//! Both honor the bucket's skip-on-error policy: with it set, unsupported
//! containers and malformed records are logged and skipped; without it they
//! surface as typed errors.

pub mod decompress;
pub mod discard;
pub mod error;
pub mod parser;

pub use decompress::{decompress, Decompressed};
pub use discard::should_discard;
pub use error::{DecompressError, DecompressionError, ParseError};
pub use parser::{parse, EventStream, ParseContext};
