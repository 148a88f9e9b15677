// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema compiler.
//!
//! Turns a [`MessageSchema`] into an immutable [`CompiledSchema`]: builds a
//! field codec per field, resolves the repeat count, checks algorithm names
//! and references, and guarantees every legal message fits the byte budget.
//! All failures here are schema errors raised before any traffic flows.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::ast::{FieldSpec, MessageSchema, Repeat};
use crate::algorithm::{AlgorithmCall, AlgorithmRegistry};
use crate::core::{DcclError, FieldKind, Result};
use crate::encoding::field::{FieldCodec, NumericCodec};
use crate::encoding::header::HeaderPart;
use crate::publish::PublishRule;

/// Upper bound for repeat counts and array lengths.
pub const MAX_REPEAT: usize = 4096;

/// Upper bound for string and hex field lengths, in bytes.
pub const MAX_FIELD_BYTES: usize = 1 << 20;

/// A field ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    /// Field name
    pub name: String,
    /// Bit codec
    pub codec: FieldCodec,
    /// Elements per repeat instance
    pub array_length: usize,
    /// Algorithms applied before encoding
    pub algorithms: Vec<AlgorithmCall>,
    /// Source variable
    pub source_var: String,
    /// Key inside the source variable
    pub source_key: Option<String>,
}

impl CompiledField {
    /// Field kind.
    pub fn kind(&self) -> FieldKind {
        self.codec.kind()
    }

    /// Standard header part, for header fields that are one.
    pub fn header_part(&self) -> Option<HeaderPart> {
        match self.codec {
            FieldCodec::Header(part) => Some(part),
            _ => None,
        }
    }

    /// Bits used by one repeat instance.
    pub fn instance_bits(&self) -> usize {
        self.codec.total_width(self.array_length)
    }
}

/// An immutable, validated message schema.
///
/// Safe to share across threads; encode and decode keep all state on the
/// caller's stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) size: usize,
    pub(crate) repeatable: bool,
    pub(crate) repeat: usize,
    pub(crate) header: Vec<CompiledField>,
    pub(crate) layout: Vec<CompiledField>,
    pub(crate) header_bits: usize,
    pub(crate) body_bits: usize,
    pub(crate) publish: Vec<PublishRule>,
}

impl CompiledSchema {
    /// Message id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Message name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared byte budget.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Resolved number of layout instances.
    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Whether the layout repeats.
    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    /// Header fields in wire order.
    pub fn header(&self) -> &[CompiledField] {
        &self.header
    }

    /// Whether the header opens with the standard `_ccl_id` and `_id` parts,
    /// so the message id can be read without knowing the schema.
    pub fn has_standard_id(&self) -> bool {
        matches!(
            (
                self.header.first().and_then(CompiledField::header_part),
                self.header.get(1).and_then(CompiledField::header_part),
            ),
            (Some(HeaderPart::CclId), Some(HeaderPart::Id))
        )
    }

    /// Body fields in wire order.
    pub fn layout(&self) -> &[CompiledField] {
        &self.layout
    }

    /// Output rules.
    pub fn publish_rules(&self) -> &[PublishRule] {
        &self.publish
    }

    /// Header width in bits.
    pub fn header_bits(&self) -> usize {
        self.header_bits
    }

    /// Body width in bits (all repeat instances).
    pub fn body_bits(&self) -> usize {
        self.body_bits
    }

    /// Header width in whole bytes.
    pub fn header_bytes(&self) -> usize {
        self.header_bits.div_ceil(8)
    }

    /// Body width in whole bytes.
    pub fn body_bytes(&self) -> usize {
        self.body_bits.div_ceil(8)
    }

    /// Number of values a field carries across all repeat instances.
    pub fn value_count(&self, field: &CompiledField) -> usize {
        if self.header.iter().any(|f| f.name == field.name) {
            field.array_length
        } else {
            field.array_length * self.repeat
        }
    }

    /// Find a header or layout field.
    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.header
            .iter()
            .chain(self.layout.iter())
            .find(|f| f.name == name)
    }

    /// Check whether `name` is a header field.
    pub fn is_header_field(&self, name: &str) -> bool {
        self.header.iter().any(|f| f.name == name)
    }
}

impl MessageSchema {
    /// Compile this schema against `registry`.
    ///
    /// Fails with a schema error when the budget cannot hold the header,
    /// when no repeat instance fits, when a plain schema declares an array,
    /// or when an algorithm name or reference cannot be resolved.
    pub fn compile(&self, registry: &AlgorithmRegistry) -> Result<CompiledSchema> {
        let schema_name = self.name.as_str();

        let mut seen = HashSet::new();
        for spec in self.header.iter().chain(self.layout.iter()) {
            if !seen.insert(spec.name.as_str()) {
                return Err(DcclError::invalid_schema(
                    schema_name,
                    format!("duplicate field name '{}'", spec.name),
                ));
            }
        }

        let header = self
            .header
            .iter()
            .map(|spec| compile_field(schema_name, spec, true))
            .collect::<Result<Vec<_>>>()?;
        let layout = self
            .layout
            .iter()
            .map(|spec| compile_field(schema_name, spec, false))
            .collect::<Result<Vec<_>>>()?;

        if !self.repeat.is_repeatable() {
            if let Some(array) = layout.iter().find(|f| f.array_length > 1) {
                return Err(DcclError::invalid_schema(
                    schema_name,
                    format!(
                        "field '{}' declares array_length {} but the message does not repeat",
                        array.name, array.array_length
                    ),
                ));
            }
        }

        let is_field = |name: &str| seen.contains(name);
        for field in header.iter().chain(layout.iter()) {
            for call in &field.algorithms {
                registry.check(schema_name, call, is_field)?;
            }
        }

        let header_bits = sum_bits(schema_name, "header", &header)?;
        let header_bytes = header_bits.div_ceil(8);
        if header_bytes > self.size {
            return Err(DcclError::invalid_schema(
                schema_name,
                format!(
                    "byte budget {} is smaller than the {header_bytes} byte header",
                    self.size
                ),
            ));
        }

        let instance_bits = sum_bits(schema_name, "layout", &layout)?;
        let repeat = match self.repeat {
            Repeat::None => 1,
            Repeat::Count(n) if n > MAX_REPEAT => {
                return Err(DcclError::invalid_schema(
                    schema_name,
                    format!("repeat count {n} exceeds the limit of {MAX_REPEAT}"),
                ));
            }
            Repeat::Count(n) => n,
            Repeat::Auto => {
                let n = binary_search_repeat(header_bits, instance_bits, self.size);
                debug!(schema = schema_name, repeat = n, "resolved repeat count");
                n
            }
        };
        if repeat == 0 {
            return Err(DcclError::invalid_schema(
                schema_name,
                format!(
                    "no repeat instance of {instance_bits} bits fits the {} byte budget",
                    self.size
                ),
            ));
        }

        let body_bits = instance_bits.checked_mul(repeat).ok_or_else(|| {
            DcclError::invalid_schema(
                schema_name,
                format!("{repeat} instances of {instance_bits} bits overflow the body size"),
            )
        })?;
        if !fits(header_bits, body_bits, self.size) {
            return Err(DcclError::invalid_schema(
                schema_name,
                format!(
                    "message needs {} bytes ({header_bits} header bits, {body_bits} body bits) but the budget is {} bytes",
                    header_bytes + body_bits.div_ceil(8),
                    self.size
                ),
            ));
        }

        let mut compiled = CompiledSchema {
            id: self.id,
            name: self.name.clone(),
            size: self.size,
            repeatable: self.repeat.is_repeatable(),
            repeat,
            header,
            layout,
            header_bits,
            body_bits,
            publish: Vec::new(),
        };
        compiled.publish = self
            .publish
            .iter()
            .map(|spec| PublishRule::compile(&compiled, spec, registry))
            .collect::<Result<Vec<_>>>()?;
        Ok(compiled)
    }
}

fn sum_bits(schema: &str, part: &str, fields: &[CompiledField]) -> Result<usize> {
    fields
        .iter()
        .try_fold(0usize, |acc, f| acc.checked_add(f.instance_bits()))
        .ok_or_else(|| DcclError::invalid_schema(schema, format!("{part} size overflows")))
}

fn compile_field(schema: &str, spec: &FieldSpec, in_header: bool) -> Result<CompiledField> {
    if spec.name.is_empty() {
        return Err(DcclError::invalid_schema(schema, "field with empty name"));
    }
    if spec.array_length == 0 {
        return Err(DcclError::invalid_schema(
            schema,
            format!("field '{}' has array_length 0", spec.name),
        ));
    }
    if spec.array_length > MAX_REPEAT {
        return Err(DcclError::invalid_schema(
            schema,
            format!(
                "field '{}' has array_length {}, limit is {MAX_REPEAT}",
                spec.name, spec.array_length
            ),
        ));
    }
    if in_header && spec.array_length > 1 {
        return Err(DcclError::invalid_schema(
            schema,
            format!("header field '{}' cannot be an array", spec.name),
        ));
    }
    if spec.max_delta.is_some() && !spec.kind.is_numeric() {
        return Err(DcclError::invalid_schema(
            schema,
            format!("max_delta on non-numeric field '{}'", spec.name),
        ));
    }

    let codec = match (in_header, spec.header_part()) {
        (true, Some(part)) => FieldCodec::Header(part),
        _ => build_codec(schema, spec)?,
    };

    if codec.checked_total_width(spec.array_length).is_none() {
        return Err(DcclError::invalid_schema(
            schema,
            format!("field '{}' size overflows", spec.name),
        ));
    }

    let algorithms = spec
        .algorithms
        .iter()
        .map(|a| AlgorithmCall::parse(a))
        .collect::<Result<Vec<_>>>()?;

    Ok(CompiledField {
        name: spec.name.clone(),
        codec,
        array_length: spec.array_length,
        algorithms,
        source_var: spec.source_var().to_string(),
        source_key: spec.source_key.clone(),
    })
}

impl FieldSpec {
    /// Build the standalone codec for this field.
    ///
    /// Header part names are not special here; the field's own kind and
    /// bounds decide the codec.
    pub fn build_codec(&self, schema: &str) -> Result<FieldCodec> {
        if self.max_delta.is_some() && !self.kind.is_numeric() {
            return Err(DcclError::invalid_schema(
                schema,
                format!("max_delta on non-numeric field '{}'", self.name),
            ));
        }
        build_codec(schema, self)
    }
}

fn build_codec(schema: &str, spec: &FieldSpec) -> Result<FieldCodec> {
    let missing = |what: &str| {
        DcclError::invalid_schema(
            schema,
            format!("{} field '{}' requires {what}", spec.kind, spec.name),
        )
    };

    let too_long = |n: usize| {
        DcclError::invalid_schema(
            schema,
            format!(
                "{} field '{}' has {n} bytes, limit is {MAX_FIELD_BYTES}",
                spec.kind, spec.name
            ),
        )
    };

    match spec.kind {
        FieldKind::Static => Ok(FieldCodec::Static {
            value: spec.value.clone().unwrap_or_default(),
        }),
        FieldKind::Bool => Ok(FieldCodec::Bool),
        FieldKind::Int | FieldKind::Float => {
            let (Some(mut min), Some(mut max)) = (spec.min, spec.max) else {
                return Err(missing("min and max"));
            };
            if max < min {
                warn!(
                    schema = schema,
                    field = %spec.name,
                    min = min,
                    max = max,
                    "max is less than min, swapping"
                );
                std::mem::swap(&mut min, &mut max);
            }
            let max_delta = spec.max_delta.map(|d| {
                if d < 0.0 {
                    warn!(schema = schema, field = %spec.name, max_delta = d, "negative max_delta, using its absolute value");
                }
                d.abs()
            });
            let integer = spec.kind == FieldKind::Int;
            let precision = if integer { 0 } else { spec.precision };
            let codec = NumericCodec::new(&spec.name, min, max, precision, integer, max_delta)?;
            Ok(FieldCodec::Numeric(codec))
        }
        FieldKind::String => match spec.max_length {
            Some(n) if n > MAX_FIELD_BYTES => Err(too_long(n)),
            Some(n) if n > 0 => Ok(FieldCodec::String { max_length: n }),
            _ => Err(missing("a positive max_length")),
        },
        FieldKind::Hex => match spec.num_bytes {
            Some(n) if n > MAX_FIELD_BYTES => Err(too_long(n)),
            Some(n) if n > 0 => Ok(FieldCodec::Hex { num_bytes: n }),
            _ => Err(missing("a positive num_bytes")),
        },
        FieldKind::Enum => {
            if spec.values.is_empty() {
                Err(missing("at least one enumerator"))
            } else {
                Ok(FieldCodec::Enum {
                    values: spec.values.clone(),
                })
            }
        }
    }
}

// ============================================================================
// Repeat resolution
// ============================================================================

/// Whether a message of `header_bits + body_bits` fits `size` bytes on the wire.
pub fn fits(header_bits: usize, body_bits: usize, size: usize) -> bool {
    header_bits.div_ceil(8) + body_bits.div_ceil(8) <= size
}

fn fits_repeated(header_bits: usize, instance_bits: usize, n: usize, size: usize) -> bool {
    n.checked_mul(instance_bits)
        .is_some_and(|body_bits| fits(header_bits, body_bits, size))
}

/// Largest repeat count that fits, found by counting up then backing off one.
pub fn linear_search_repeat(header_bits: usize, instance_bits: usize, size: usize) -> usize {
    let mut n = 1;
    while n <= MAX_REPEAT && fits_repeated(header_bits, instance_bits, n, size) {
        n += 1;
    }
    n - 1
}

/// Same result as [`linear_search_repeat`], by bisection.
pub fn binary_search_repeat(header_bits: usize, instance_bits: usize, size: usize) -> usize {
    if !fits_repeated(header_bits, instance_bits, 1, size) {
        return 0;
    }
    // invariant: lo fits, hi + 1 does not (or hi is the cap)
    let (mut lo, mut hi) = (1, MAX_REPEAT);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if fits_repeated(header_bits, instance_bits, mid, size) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> AlgorithmRegistry {
        AlgorithmRegistry::with_builtins()
    }

    #[test]
    fn test_budget_smaller_than_body() {
        // 1 byte header, 40 body bits, 4 byte budget
        let mut schema = MessageSchema::new(1, "TOO_BIG", 4);
        schema.set_header(vec![FieldSpec::int("hdr", 0.0, 200.0)]);
        schema
            .add_field(FieldSpec::string("a", 2))
            .add_field(FieldSpec::string("b", 2))
            .add_field(FieldSpec::hex("c", 1));
        let err = schema.compile(&registry()).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_budget_smaller_than_header() {
        let schema = MessageSchema::new(1, "TINY", 5);
        let err = schema.compile(&registry()).unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn test_array_on_plain_schema() {
        let schema = MessageSchema::new(1, "ARR", 32)
            .with_field(FieldSpec::int("x", 0.0, 10.0).with_array_length(3));
        let err = schema.compile(&registry()).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_auto_repeat() {
        // 6 header bytes + n * 7 bits within 10 bytes => n = 4 (28 bits -> 4 bytes)
        let schema = MessageSchema::new(1, "REP", 10)
            .with_repeat(Repeat::Auto)
            .with_field(FieldSpec::int("x", 0.0, 100.0));
        let compiled = schema.compile(&registry()).unwrap();
        assert_eq!(compiled.repeat(), 4);
        assert_eq!(compiled.body_bits(), 28);
    }

    #[test]
    fn test_auto_repeat_zero() {
        let schema = MessageSchema::new(1, "REP", 7)
            .with_repeat(Repeat::Auto)
            .with_field(FieldSpec::string("s", 4));
        assert!(schema.compile(&registry()).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_explicit_repeat_too_big() {
        let schema = MessageSchema::new(1, "REP", 8)
            .with_repeat(Repeat::Count(3))
            .with_field(FieldSpec::string("s", 1));
        assert!(schema.compile(&registry()).is_err());
    }

    #[test]
    fn test_swaps_inverted_bounds() {
        let schema = MessageSchema::new(1, "SWAP", 32).with_field(FieldSpec::int("x", 10.0, 0.0));
        let compiled = schema.compile(&registry()).unwrap();
        match &compiled.layout()[0].codec {
            FieldCodec::Numeric(n) => {
                assert_eq!(n.min, 0.0);
                assert_eq!(n.max, 10.0);
            }
            other => panic!("unexpected codec {other:?}"),
        }
    }

    #[test]
    fn test_negative_max_delta_normalized() {
        let schema = MessageSchema::new(1, "D", 32)
            .with_repeat(Repeat::Count(1))
            .with_field(
                FieldSpec::float("v", 0.0, 100.0, 1)
                    .with_array_length(5)
                    .with_max_delta(-2.0),
            );
        let compiled = schema.compile(&registry()).unwrap();
        assert_eq!(compiled.body_bits(), 34);
    }

    #[test]
    fn test_unknown_algorithm() {
        let schema = MessageSchema::new(1, "ALG", 32)
            .with_field(FieldSpec::int("x", 0.0, 10.0).with_algorithm("no_such"));
        assert!(matches!(
            schema.compile(&registry()),
            Err(DcclError::UnknownAlgorithm { .. })
        ));
        // allowed while the registry is empty
        assert!(schema.compile(&AlgorithmRegistry::new()).is_ok());
    }

    #[test]
    fn test_unknown_reference() {
        let schema = MessageSchema::new(1, "REF", 32)
            .with_field(FieldSpec::int("x", 0.0, 10.0).with_algorithm("add:y"));
        assert!(matches!(
            schema.compile(&registry()),
            Err(DcclError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_header_reference_allowed() {
        let schema = MessageSchema::new(1, "REF", 32)
            .with_field(FieldSpec::int("x", 0.0, 100.0).with_algorithm("add:_src_id"));
        assert!(schema.compile(&registry()).is_ok());
    }

    #[test]
    fn test_missing_bounds() {
        let mut spec = FieldSpec::int("x", 0.0, 1.0);
        spec.max = None;
        let schema = MessageSchema::new(1, "B", 32).with_field(spec);
        assert!(schema.compile(&registry()).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_duplicate_names() {
        let schema = MessageSchema::new(1, "DUP", 32)
            .with_field(FieldSpec::boolean("a"))
            .with_field(FieldSpec::boolean("a"));
        assert!(schema.compile(&registry()).is_err());
    }

    #[test]
    fn test_linear_search_backs_off() {
        assert_eq!(linear_search_repeat(48, 8, 10), 4);
        assert_eq!(linear_search_repeat(48, 8, 6), 0);
        assert_eq!(linear_search_repeat(48, 0, 6), MAX_REPEAT);
    }

    proptest! {
        #[test]
        fn prop_binary_search_matches_linear(
            header_bits in 0usize..80,
            instance_bits in 0usize..300,
            size in 0usize..128,
        ) {
            prop_assert_eq!(
                binary_search_repeat(header_bits, instance_bits, size),
                linear_search_repeat(header_bits, instance_bits, size)
            );
        }
    }
}
