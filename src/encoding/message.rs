// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Flat message encode/decode.
//!
//! Wire format: header bits then body bits, each packed MSB-first and padded
//! to a whole byte. Fields are appended in declaration order; each field
//! writes all of its values (every array element of every repeat instance)
//! before the next field. Trailing zero bytes of the body are trimmed and
//! zero-filled again on decode.
//!
//! Malformed or truncated input is not detected by [`CompiledSchema::decode`]:
//! missing bits read as zero, extra bytes are ignored. Use
//! [`CompiledSchema::decode_checked`] to reject input shorter than the header.

use std::fmt::Write as _;

use super::bitset::Bitset;
use super::header::{expand_time, HeaderPart};
use super::EncodeContext;
use crate::algorithm::AlgorithmRegistry;
use crate::core::{DcclError, Result, Value, ValueMap};
use crate::schema::{CompiledField, CompiledSchema};

impl CompiledSchema {
    /// Encode `values` into wire bytes.
    ///
    /// Header parts without a value take their contextual default. Each
    /// field's algorithms run before encoding; absent or out-of-range values
    /// become the null sentinel.
    pub fn encode(
        &self,
        values: &ValueMap,
        registry: &AlgorithmRegistry,
        ctx: &EncodeContext,
    ) -> Result<Vec<u8>> {
        let inputs = self.with_header_defaults(values, ctx);

        let mut head = Bitset::new();
        for field in &self.header {
            let prepared = prepare(field, &inputs, registry);
            head.append(&field.codec.encode_array(&field.name, &prepared, field.array_length, 1)?);
        }

        let mut body = Bitset::new();
        for field in &self.layout {
            let prepared = prepare(field, &inputs, registry);
            body.append(&field.codec.encode_array(
                &field.name,
                &prepared,
                field.array_length,
                self.repeat,
            )?);
        }

        let mut bytes = head.to_bytes();
        let mut body_bytes = body.to_bytes();
        while body_bytes.last() == Some(&0) {
            body_bytes.pop();
        }
        bytes.extend_from_slice(&body_bytes);
        Ok(bytes)
    }

    /// Decode wire bytes into field values.
    ///
    /// Best effort: short input is zero-filled, so a truncated message
    /// decodes with absent trailing fields. `_time` is expanded to seconds
    /// since the epoch using `ctx.now`.
    pub fn decode(&self, bytes: &[u8], ctx: &EncodeContext) -> ValueMap {
        let split = self.header_bytes().min(bytes.len());
        let (head_bytes, body_bytes) = bytes.split_at(split);
        let mut out = ValueMap::new();

        let mut head = Bitset::from_bytes_len(head_bytes, self.header_bits);
        for field in self.header.iter().rev() {
            let bits = head.take_back(field.instance_bits());
            let mut values = field.codec.decode_array(&bits, field.array_length, 1);
            if field.header_part() == Some(HeaderPart::Time) {
                for v in &mut values {
                    if let Some(secs) = v.as_i64() {
                        *v = Value::Long(expand_time(secs, ctx.now));
                    }
                }
            }
            out.insert(field.name.clone(), values);
        }

        let mut body = Bitset::from_bytes_len(body_bytes, self.body_bits);
        for field in self.layout.iter().rev() {
            let bits = body.take_back(field.instance_bits() * self.repeat);
            let values = field
                .codec
                .decode_array(&bits, field.array_length, self.repeat);
            out.insert(field.name.clone(), values);
        }
        out
    }

    /// Like [`decode`](Self::decode), but rejects input shorter than the header.
    pub fn decode_checked(&self, bytes: &[u8], ctx: &EncodeContext) -> Result<ValueMap> {
        if bytes.len() < self.header_bytes() {
            return Err(DcclError::length_exceeded(self.header_bytes(), bytes.len()));
        }
        Ok(self.decode(bytes, ctx))
    }

    /// Smallest and largest encoded size in bytes.
    ///
    /// The minimum is the header alone (an all-absent body trims away); the
    /// maximum is every field at full width.
    pub fn size_bounds(&self) -> (usize, usize) {
        (self.header_bytes(), self.header_bytes() + self.body_bytes())
    }

    /// Human-readable field-by-field dump.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "///////////////////////////////");
        let _ = writeln!(s, "message {}: {{{}}}", self.id, self.name);
        let _ = writeln!(s, "requested size {{bytes}} [bits]: {{{}}} [{}]", self.size, self.size * 8);
        let (min, max) = self.size_bounds();
        let _ = writeln!(
            s,
            "actual size {{bytes}} [bits]: min {{{min}}} max {{{max}}} [{}]",
            self.header_bits + self.body_bits
        );
        if self.repeatable {
            let _ = writeln!(s, "repeat: {{{}}}", self.repeat);
        }
        let _ = writeln!(s, ">>>> HEADER <<<<");
        for field in &self.header {
            describe_field(&mut s, field);
        }
        let _ = writeln!(s, ">>>> LAYOUT (message_vars) <<<<");
        for field in &self.layout {
            describe_field(&mut s, field);
        }
        if !self.publish.is_empty() {
            let _ = writeln!(s, ">>>> PUBLISHES <<<<");
            for rule in &self.publish {
                let _ = writeln!(s, "\t{}", rule.describe());
            }
        }
        let _ = writeln!(s, "///////////////////////////////");
        s
    }

    fn with_header_defaults(&self, values: &ValueMap, ctx: &EncodeContext) -> ValueMap {
        let mut inputs = values.clone();
        for field in &self.header {
            let Some(part) = field.header_part() else {
                continue;
            };
            let present = inputs
                .get(&field.name)
                .is_some_and(|v| v.iter().any(|x| !x.is_empty()));
            if !present {
                inputs.insert(field.name.clone(), vec![part.default_value(self.id, ctx)]);
            }
        }
        inputs
    }
}

/// Values for `field` with algorithms applied, element by element.
fn prepare(field: &CompiledField, inputs: &ValueMap, registry: &AlgorithmRegistry) -> Vec<Value> {
    let mut values = inputs.get(&field.name).cloned().unwrap_or_default();
    if !field.algorithms.is_empty() {
        for (index, value) in values.iter_mut().enumerate() {
            registry.apply_all(&field.algorithms, value, index, inputs);
        }
    }
    values
}

fn describe_field(s: &mut String, field: &CompiledField) {
    let _ = write!(s, "\t{} ({}): {} bits", field.name, field.kind(), field.instance_bits());
    if field.array_length > 1 {
        let _ = write!(s, " [array_length {}]", field.array_length);
    }
    let _ = writeln!(s);
    if field.source_var != field.name {
        let _ = write!(s, "\t\tsource: {{{}", field.source_var);
        if let Some(key) = &field.source_key {
            let _ = write!(s, ":{key}");
        }
        let _ = writeln!(s, "}}");
    }
    if !field.algorithms.is_empty() {
        let names: Vec<String> = field.algorithms.iter().map(ToString::to_string).collect();
        let _ = writeln!(s, "\t\talgorithms: {{{}}}", names.join(","));
    }
    s.push_str(&field.codec.describe());
}

/// Message id from the `_id` part of a standard header.
pub fn peek_message_id(bytes: &[u8]) -> u32 {
    let mut bits = Bitset::from_bytes_len(bytes, HeaderPart::CclId.bit_width() + HeaderPart::Id.bit_width());
    bits.take_back(HeaderPart::Id.bit_width()).to_u64() as u32
}
