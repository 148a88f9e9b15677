// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema compilation tests: field widths, budget checks and schema files.

use std::path::PathBuf;

use dccl::schema::{
    binary_search_repeat, fits, linear_search_repeat, load_schemas, parse_schemas, SchemaFormat,
    MAX_FIELD_BYTES, MAX_REPEAT,
};
use dccl::{
    AlgorithmRegistry, Codec, DcclError, FieldKind, FieldSpec, MessageSchema, PublishSpec, Repeat,
    Value,
};
use proptest::prelude::*;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ============================================================================
// Field Widths
// ============================================================================

#[test]
fn test_int_width_and_sentinel_offset() {
    let codec = FieldSpec::int("x", 0.0, 100.0).build_codec("T").unwrap();
    assert_eq!(codec.bit_width(), 7);

    let bits = codec.encode("x", &Value::Long(50)).unwrap();
    assert_eq!(bits.len(), 7);
    assert_eq!(bits.to_u64(), 51);
    assert_eq!(codec.decode(&bits), Value::Long(50));
}

#[test]
fn test_string_is_nul_padded() {
    let codec = FieldSpec::string("s", 4).build_codec("T").unwrap();
    let bits = codec.encode("s", &Value::from("hi")).unwrap();
    assert_eq!(bits.to_bytes(), b"hi\0\0".to_vec());
    assert_eq!(codec.decode(&bits), Value::from("hi"));
}

#[test]
fn test_enum_indices() {
    let codec = FieldSpec::enumeration("c", ["red", "green", "blue"])
        .build_codec("T")
        .unwrap();
    assert_eq!(codec.bit_width(), 2);

    let green = codec.encode("c", &Value::from("green")).unwrap();
    assert_eq!(green.to_u64(), 2);
    assert_eq!(codec.decode(&green), Value::from("green"));

    let purple = codec.encode("c", &Value::from("purple")).unwrap();
    assert_eq!(purple.to_u64(), 0);
    assert_eq!(codec.decode(&purple), Value::Empty);
}

#[test]
fn test_budget_exceeded() {
    // 1 byte header, 40 body bits, 4 byte budget
    let mut schema = MessageSchema::new(1, "TOO_BIG", 4)
        .with_field(FieldSpec::string("a", 2))
        .with_field(FieldSpec::string("b", 2))
        .with_field(FieldSpec::hex("c", 1));
    schema.set_header(vec![FieldSpec::int("hdr", 0.0, 200.0)]);

    let err = schema.compile(&AlgorithmRegistry::new()).unwrap_err();
    assert!(matches!(err, DcclError::InvalidSchema { .. }));
}

#[test]
fn test_delta_frame_widths() {
    let compiled = MessageSchema::new(2, "PROFILE", 32)
        .with_repeat(Repeat::Count(1))
        .with_field(
            FieldSpec::float("depth", 0.0, 100.0, 1)
                .with_array_length(5)
                .with_max_delta(2.0),
        )
        .compile(&AlgorithmRegistry::new())
        .unwrap();
    // key ceil(log2(1002)) = 10, delta ceil(log2(42)) = 6
    assert_eq!(compiled.body_bits(), 10 + 4 * 6);
}

#[test]
fn test_standard_header_is_six_bytes() {
    let compiled = MessageSchema::new(3, "EMPTY", 6)
        .compile(&AlgorithmRegistry::new())
        .unwrap();
    assert_eq!(compiled.header_bits(), 48);
    assert_eq!(compiled.body_bits(), 0);
    assert_eq!(compiled.size_bounds(), (6, 6));
}

/// `ceil(log2(span + 2))` straight from floating point.
fn formula_width(span: f64) -> usize {
    (span + 2.0).log2().ceil() as usize
}

fn off_grid(span: f64) -> bool {
    (span - span.round()).abs() > 1e-6
}

#[test]
fn test_off_grid_widths() {
    let codec = FieldSpec::float("x", 0.0, 0.64, 1).build_codec("T").unwrap();
    assert_eq!(codec.bit_width(), 4);

    let codec = FieldSpec::float("x", 0.0, 100.0, 1)
        .with_max_delta(0.125)
        .build_codec("T")
        .unwrap();
    assert_eq!(codec.bit_width(), 10);
    assert_eq!(codec.element_width(1), 3);
}

proptest! {
    #[test]
    fn prop_key_width_follows_formula(
        min in -1000.0f64..1000.0,
        span in 0.0f64..1000.0,
        precision in 0i32..4,
    ) {
        let max = min + span;
        let scaled = (max - min) * 10f64.powi(precision);
        prop_assume!(off_grid(scaled));
        let codec = FieldSpec::float("x", min, max, precision)
            .build_codec("T")
            .unwrap();
        prop_assert_eq!(codec.bit_width(), formula_width(scaled));
    }

    #[test]
    fn prop_delta_width_follows_formula(
        max_delta in 0.0f64..50.0,
        precision in 0i32..4,
    ) {
        let scaled = 2.0 * max_delta * 10f64.powi(precision);
        prop_assume!(off_grid(scaled));
        let codec = FieldSpec::float("x", 0.0, 100.0, precision)
            .with_max_delta(max_delta)
            .build_codec("T")
            .unwrap();
        prop_assert_eq!(codec.element_width(1), formula_width(scaled));
    }
}

// ============================================================================
// Schema Errors
// ============================================================================

#[test]
fn test_array_requires_repeat() {
    let err = MessageSchema::new(4, "ARR", 32)
        .with_field(FieldSpec::int("x", 0.0, 10.0).with_array_length(3))
        .compile(&AlgorithmRegistry::new())
        .unwrap_err();
    assert!(err.to_string().contains("array_length"));
}

#[test]
fn test_duplicate_field_names() {
    let err = MessageSchema::new(5, "DUP", 32)
        .with_field(FieldSpec::boolean("x"))
        .with_field(FieldSpec::int("x", 0.0, 3.0))
        .compile(&AlgorithmRegistry::new())
        .unwrap_err();
    assert!(err.is_schema_error());
}

#[test]
fn test_unknown_algorithm_and_reference() {
    let registry = AlgorithmRegistry::with_builtins();

    let err = MessageSchema::new(6, "ALG", 32)
        .with_field(FieldSpec::int("x", 0.0, 10.0).with_algorithm("warp"))
        .compile(&registry)
        .unwrap_err();
    assert!(matches!(err, DcclError::UnknownAlgorithm { .. }));

    let err = MessageSchema::new(6, "ALG", 32)
        .with_field(FieldSpec::int("x", 0.0, 10.0).with_algorithm("add:y"))
        .compile(&registry)
        .unwrap_err();
    assert!(matches!(err, DcclError::UnknownReference { .. }));
}

#[test]
fn test_empty_registry_skips_name_check() {
    let compiled = MessageSchema::new(7, "ALG", 32)
        .with_field(FieldSpec::int("x", 0.0, 10.0).with_algorithm("warp"))
        .compile(&AlgorithmRegistry::new());
    assert!(compiled.is_ok());
}

#[test]
fn test_publish_unknown_field() {
    let mut schema = MessageSchema::new(8, "PUB", 32).with_field(FieldSpec::boolean("ok"));
    schema.add_publish(PublishSpec::new("OUT").with_field("missing"));
    let err = schema.compile(&AlgorithmRegistry::new()).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_oversized_repeat_count() {
    let err = MessageSchema::new(10, "R", 64)
        .with_repeat(Repeat::Count(1 << 63))
        .with_field(FieldSpec::int("x", 0.0, 2.0))
        .compile(&AlgorithmRegistry::new())
        .unwrap_err();
    assert!(err.is_schema_error());

    let err = MessageSchema::new(10, "R", 64)
        .with_repeat(Repeat::Count(MAX_REPEAT + 1))
        .with_field(FieldSpec::constant("s", "x"))
        .compile(&AlgorithmRegistry::new())
        .unwrap_err();
    assert!(err.to_string().contains("repeat count"));
}

#[test]
fn test_oversized_field_sizes() {
    let err = MessageSchema::new(11, "A", 64)
        .with_repeat(Repeat::Count(1))
        .with_field(FieldSpec::boolean("b").with_array_length(usize::MAX))
        .compile(&AlgorithmRegistry::new())
        .unwrap_err();
    assert!(err.is_schema_error());

    assert!(FieldSpec::string("s", usize::MAX).build_codec("T").is_err());
    assert!(FieldSpec::hex("h", MAX_FIELD_BYTES + 1).build_codec("T").is_err());
    assert!(FieldSpec::string("s", MAX_FIELD_BYTES).build_codec("T").is_ok());
}

#[test]
fn test_missing_bounds() {
    let mut spec = FieldSpec::int("x", 0.0, 10.0);
    spec.max = None;
    assert!(spec.build_codec("T").is_err());
    assert!(FieldSpec::boolean("b").with_max_delta(1.0).build_codec("T").is_err());
}

// ============================================================================
// Schema Files
// ============================================================================

#[test]
fn test_load_fixture() {
    let schemas = load_schemas(fixture_path("nav.toml")).unwrap();
    assert_eq!(schemas.len(), 2);
    assert_eq!(schemas[0].name, "NAV");
    assert_eq!(schemas[0].layout[2].kind, FieldKind::Enum);
    assert_eq!(schemas[1].repeat, Repeat::Count(4));
    assert!(schemas[1].publish[0].all);
}

#[test]
fn test_bad_fixture_reports_each_message() {
    let schemas = load_schemas(fixture_path("bad.toml")).unwrap();
    let registry = AlgorithmRegistry::with_builtins();
    let results: Vec<bool> = schemas.iter().map(|s| s.compile(&registry).is_ok()).collect();
    assert_eq!(results, vec![true, false, false]);

    let mut codec = Codec::default();
    assert!(codec.load_file(fixture_path("bad.toml")).is_err());
}

#[test]
fn test_parse_json_auto_repeat() {
    let text = r#"{"message": [{
        "id": 9, "name": "AUTO", "size": 12, "repeat": "auto",
        "layout": [{"name": "x", "type": "int", "min": 0, "max": 254}]
    }]}"#;
    let schemas = parse_schemas(text, SchemaFormat::Json).unwrap();
    assert_eq!(schemas[0].repeat, Repeat::Auto);

    let compiled = schemas[0].compile(&AlgorithmRegistry::new()).unwrap();
    assert_eq!(compiled.repeat(), 6);
}

#[test]
fn test_unsupported_extension() {
    let err = load_schemas("messages.xml").unwrap_err();
    assert!(matches!(err, DcclError::Parse { .. }));
}

// ============================================================================
// Repeat Resolution
// ============================================================================

proptest! {
    #[test]
    fn prop_binary_matches_linear(
        header_bits in 0usize..128,
        instance_bits in 1usize..512,
        size in 0usize..512,
    ) {
        prop_assert_eq!(
            binary_search_repeat(header_bits, instance_bits, size),
            linear_search_repeat(header_bits, instance_bits, size)
        );
    }

    #[test]
    fn prop_auto_repeat_is_largest_fit(bits in 1usize..64, size in 7usize..64) {
        let n = binary_search_repeat(48, bits, size);
        if n > 0 {
            prop_assert!(fits(48, n * bits, size));
        }
        if n < MAX_REPEAT {
            prop_assert!(!fits(48, (n + 1) * bits, size));
        }
    }
}
