// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bit-level encoding and decoding.
//!
//! - [`bitset`] - MSB-first bit accumulator
//! - [`field`] - Per-kind field codecs and the null sentinel convention
//! - [`header`] - Standard header parts
//! - [`message`] - Flat message encode/decode over a compiled schema
//! - [`traverse`] - Recursive encode/decode of nested messages

pub mod bitset;
pub mod field;
pub mod header;
pub mod message;
pub mod traverse;

use chrono::{DateTime, Utc};

pub use bitset::Bitset;
pub use field::{FieldCodec, NumericCodec};
pub use header::{expand_time, HeaderPart};
pub use message::peek_message_id;
pub use traverse::{
    DescriptorRegistry, DynamicMessage, FieldDescriptor, FieldOptions, FieldType, FieldValue,
    MessageDescriptor, Part, Reflect, Traversal,
};

/// Contextual defaults for header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeContext {
    /// Local modem id, the default `_src_id`
    pub modem_id: u32,
    /// Encode time, or receive time when decoding
    pub now: DateTime<Utc>,
}

impl EncodeContext {
    /// Context for the local modem at the current time.
    pub fn new(modem_id: u32) -> Self {
        Self::at(modem_id, Utc::now())
    }

    /// Context with a fixed clock.
    pub fn at(modem_id: u32, now: DateTime<Utc>) -> Self {
        Self { modem_id, now }
    }
}

impl Default for EncodeContext {
    fn default() -> Self {
        Self::new(0)
    }
}
