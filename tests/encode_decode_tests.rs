// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Encode/decode integration tests.
//!
//! Messages are compiled from the schema fixtures or built in code, encoded
//! through the public [`Codec`] API and decoded back.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use dccl::{
    AlgorithmRegistry, Codec, CodecConfig, DcclError, EncodeContext, FieldSpec, MessageSchema,
    Repeat, Value, ValueMap,
};
use proptest::prelude::*;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn ctx() -> EncodeContext {
    EncodeContext::at(3, Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap())
}

fn nav_codec() -> Codec {
    let mut codec = Codec::default();
    codec.load_file(fixture_path("nav.toml")).unwrap();
    codec
}

fn values(entries: &[(&str, Vec<Value>)]) -> ValueMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ============================================================================
// Fixture Round Trips
// ============================================================================

#[test]
fn test_nav_round_trip() {
    let codec = nav_codec();
    let input = values(&[
        ("depth", vec![Value::double(12.5)]),
        ("heading", vec![Value::double(-90.0)]),
        ("mode", vec![Value::from("survey")]),
        ("vehicle", vec![Value::from("auv1")]),
    ]);

    let bytes = codec.encode("NAV", &input, &ctx()).unwrap();
    assert!(bytes.len() <= 32);
    assert_eq!(bytes[0], 0x20);

    let decoded = codec.decode(&bytes, &ctx()).unwrap();
    assert_eq!(decoded["_id"], vec![Value::Long(20)]);
    assert_eq!(decoded["_src_id"], vec![Value::Long(3)]);
    assert_eq!(decoded["_time"], vec![Value::Long(ctx().now.timestamp())]);
    assert_eq!(decoded["depth"], vec![Value::double_with_precision(12.5, 1)]);
    // angle_0_360 wraps before encoding
    assert_eq!(decoded["heading"], vec![Value::double_with_precision(270.0, 0)]);
    assert_eq!(decoded["mode"], vec![Value::from("survey")]);
    assert_eq!(decoded["vehicle"], vec![Value::from("auv1")]);
}

#[test]
fn test_config_loads_fixture_schemas() {
    let config = CodecConfig::load(fixture_path("dccl.toml")).unwrap();
    assert_eq!(config.modem_id, 3);

    let codec = Codec::from_config(config).unwrap();
    let names: Vec<&str> = codec.schemas().map(|s| s.name()).collect();
    assert_eq!(names, vec!["NAV", "CTD"]);
    assert_eq!(codec.context().modem_id, 3);
}

#[test]
fn test_absent_fields_trim_to_header() {
    let codec = nav_codec();
    let bytes = codec.encode("NAV", &ValueMap::new(), &ctx()).unwrap();
    assert_eq!(bytes.len(), 6);

    let decoded = codec.decode(&bytes, &ctx()).unwrap();
    for name in ["depth", "heading", "mode", "vehicle"] {
        assert_eq!(decoded[name], vec![Value::Empty], "field {name}");
    }
}

#[test]
fn test_out_of_range_decodes_absent() {
    let codec = nav_codec();
    let input = values(&[
        ("depth", vec![Value::double(600.0)]),
        ("mode", vec![Value::from("dive")]),
        ("vehicle", vec![Value::from("auv1")]),
    ]);
    let bytes = codec.encode("NAV", &input, &ctx()).unwrap();
    let decoded = codec.decode(&bytes, &ctx()).unwrap();
    assert_eq!(decoded["depth"], vec![Value::Empty]);
    assert_eq!(decoded["mode"], vec![Value::Empty]);
    assert_eq!(decoded["vehicle"], vec![Value::from("auv1")]);
}

#[test]
fn test_header_override() {
    let codec = nav_codec();
    let input = values(&[
        ("_dest_id", vec![Value::Long(7)]),
        ("_broadcast_flag", vec![Value::Bool(true)]),
    ]);
    let bytes = codec.encode("NAV", &input, &ctx()).unwrap();
    let decoded = codec.decode(&bytes, &ctx()).unwrap();
    assert_eq!(decoded["_dest_id"], vec![Value::Long(7)]);
    assert_eq!(decoded["_broadcast_flag"], vec![Value::Bool(true)]);
    assert_eq!(decoded["_src_id"], vec![Value::Long(3)]);
}

#[test]
fn test_encode_from_sources() {
    let codec = nav_codec();
    let mut sources = HashMap::new();
    sources.insert("STATUS".to_string(), "mode=ignored,name=auv2".to_string());
    sources.insert("depth".to_string(), "7.5".to_string());
    sources.insert("mode".to_string(), "return".to_string());

    let bytes = codec.encode_sources("NAV", &sources, &ctx()).unwrap();
    let decoded = codec.decode(&bytes, &ctx()).unwrap();
    assert_eq!(decoded["vehicle"], vec![Value::from("auv2")]);
    assert_eq!(decoded["depth"], vec![Value::double_with_precision(7.5, 1)]);
    assert_eq!(decoded["mode"], vec![Value::from("return")]);
}

#[test]
fn test_repeated_layout() {
    let codec = nav_codec();
    let input = values(&[
        (
            "temperature",
            vec![Value::double(4.25), Value::double(4.5), Value::double(-1.0)],
        ),
        ("salinity", vec![Value::double(35.1)]),
    ]);
    let bytes = codec.encode("CTD", &input, &ctx()).unwrap();
    let decoded = codec.decode(&bytes, &ctx()).unwrap();

    assert_eq!(
        decoded["temperature"],
        vec![
            Value::double_with_precision(4.25, 2),
            Value::double_with_precision(4.5, 2),
            Value::double_with_precision(-1.0, 2),
            Value::Empty,
        ]
    );
    assert_eq!(decoded["salinity"].len(), 4);
    assert_eq!(decoded["salinity"][0], Value::double_with_precision(35.1, 1));
    assert_eq!(decoded["salinity"][1], Value::Empty);
}

// ============================================================================
// Truncated Input
// ============================================================================

#[test]
fn test_header_only_input() {
    let codec = nav_codec();
    let input = values(&[("depth", vec![Value::double(100.0)])]);
    let bytes = codec.encode("NAV", &input, &ctx()).unwrap();

    let decoded = codec.decode(&bytes[..6], &ctx()).unwrap();
    assert_eq!(decoded["_id"], vec![Value::Long(20)]);
    assert_eq!(decoded["depth"], vec![Value::Empty]);
}

#[test]
fn test_decode_checked_rejects_short_input() {
    let codec = nav_codec();
    let err = codec.decode_checked("NAV", &[0x20, 0x0a], &ctx()).unwrap_err();
    assert!(matches!(err, DcclError::LengthExceeded { .. }));
}

// ============================================================================
// Field Kinds
// ============================================================================

fn kinds_schema() -> MessageSchema {
    MessageSchema::new(40, "KINDS", 32)
        .with_field(FieldSpec::hex("serial", 2))
        .with_field(FieldSpec::constant("version", "v1"))
        .with_field(FieldSpec::boolean("armed"))
        .with_field(FieldSpec::int("count", -10.0, 10.0))
}

#[test]
fn test_hex_static_bool_int() {
    let mut codec = Codec::default();
    codec.add_schema(kinds_schema()).unwrap();

    let input = values(&[
        ("serial", vec![Value::from("BEEF")]),
        ("armed", vec![Value::Bool(true)]),
        ("count", vec![Value::double(-3.4)]),
    ]);
    let bytes = codec.encode("KINDS", &input, &ctx()).unwrap();
    let decoded = codec.decode(&bytes, &ctx()).unwrap();

    assert_eq!(decoded["serial"], vec![Value::from("beef")]);
    assert_eq!(decoded["version"], vec![Value::from("v1")]);
    assert_eq!(decoded["armed"], vec![Value::Bool(true)]);
    assert_eq!(decoded["count"], vec![Value::Long(-3)]);
}

#[test]
fn test_bad_hex_is_an_error() {
    let mut codec = Codec::default();
    codec.add_schema(kinds_schema()).unwrap();

    let input = values(&[("serial", vec![Value::from("xyz")])]);
    let err = codec.encode("KINDS", &input, &ctx()).unwrap_err();
    assert!(matches!(err, DcclError::Parse { .. }));

    let input = values(&[("serial", vec![Value::from("beefbeef")])]);
    assert!(codec.encode("KINDS", &input, &ctx()).is_err());
}

// ============================================================================
// Delta Frames and Repeat
// ============================================================================

fn delta_schema() -> MessageSchema {
    MessageSchema::new(41, "PROFILE", 32)
        .with_repeat(Repeat::Count(1))
        .with_field(
            FieldSpec::float("depth", 0.0, 100.0, 1)
                .with_array_length(4)
                .with_max_delta(2.0),
        )
}

#[test]
fn test_delta_array() {
    let compiled = delta_schema().compile(&AlgorithmRegistry::new()).unwrap();
    // 10 bit key + 3 x 6 bit deltas
    assert_eq!(compiled.body_bits(), 28);

    let input = values(&[(
        "depth",
        vec![
            Value::double(50.0),
            Value::double(51.0),
            Value::double(49.5),
            Value::double(60.0),
        ],
    )]);
    let bytes = compiled
        .encode(&input, &AlgorithmRegistry::new(), &ctx())
        .unwrap();
    let decoded = compiled.decode(&bytes, &ctx());
    assert_eq!(
        decoded["depth"],
        vec![
            Value::double_with_precision(50.0, 1),
            Value::double_with_precision(51.0, 1),
            Value::double_with_precision(49.5, 1),
            Value::Empty,
        ]
    );
}

#[test]
fn test_auto_repeat_fills_budget() {
    let compiled = MessageSchema::new(42, "FILL", 32)
        .with_repeat(Repeat::Auto)
        .with_field(FieldSpec::int("x", 0.0, 300.0))
        .compile(&AlgorithmRegistry::new())
        .unwrap();
    // 26 body bytes hold 23 nine-bit instances
    assert_eq!(compiled.repeat(), 23);
    assert_eq!(compiled.size_bounds(), (6, 32));
}

// ============================================================================
// Properties
// ============================================================================

fn float_schema() -> dccl::CompiledSchema {
    MessageSchema::new(43, "F", 16)
        .with_field(FieldSpec::float("x", 0.0, 500.0, 1))
        .with_field(FieldSpec::enumeration("mode", ["a", "b", "c"]))
        .with_field(FieldSpec::string("tag", 3))
        .compile(&AlgorithmRegistry::new())
        .unwrap()
}

proptest! {
    #[test]
    fn prop_in_range_round_trip(x in 0.0f64..=500.0) {
        let schema = float_schema();
        let input = values(&[("x", vec![Value::double(x)])]);
        let bytes = schema.encode(&input, &AlgorithmRegistry::new(), &ctx()).unwrap();
        let decoded = schema.decode(&bytes, &ctx());
        let y = decoded["x"][0].as_f64().unwrap();
        prop_assert!((y - x).abs() <= 0.05 + 1e-9, "{} decoded as {}", x, y);
    }

    #[test]
    fn prop_out_of_range_is_absent(x in prop_oneof![-1e6f64..-0.001, 500.001f64..1e6]) {
        let schema = float_schema();
        let input = values(&[("x", vec![Value::double(x)])]);
        let bytes = schema.encode(&input, &AlgorithmRegistry::new(), &ctx()).unwrap();
        prop_assert_eq!(&schema.decode(&bytes, &ctx())["x"], &vec![Value::Empty]);
    }

    #[test]
    fn prop_size_within_bounds(
        x in proptest::option::of(0.0f64..500.0),
        mode in proptest::option::of(0usize..3),
        tag in proptest::option::of("[a-z]{1,3}"),
    ) {
        let schema = float_schema();
        let mut input = ValueMap::new();
        if let Some(x) = x {
            input.insert("x".into(), vec![Value::double(x)]);
        }
        if let Some(m) = mode {
            input.insert("mode".into(), vec![Value::from(["a", "b", "c"][m])]);
        }
        if let Some(tag) = tag.clone() {
            input.insert("tag".into(), vec![Value::from(tag)]);
        }
        let bytes = schema.encode(&input, &AlgorithmRegistry::new(), &ctx()).unwrap();
        let (min, max) = schema.size_bounds();
        prop_assert!(bytes.len() >= min && bytes.len() <= max);
        prop_assert!(bytes.len() <= schema.size());

        let decoded = schema.decode(&bytes, &ctx());
        match tag {
            Some(tag) => prop_assert_eq!(&decoded["tag"], &vec![Value::from(tag)]),
            None => prop_assert_eq!(&decoded["tag"], &vec![Value::Empty]),
        }
    }

    #[test]
    fn prop_max_round_trips_off_grid(
        min in -1000.0f64..1000.0,
        span in 0.0f64..1000.0,
        precision in 0i32..4,
    ) {
        let max = min + span;
        let schema = MessageSchema::new(44, "G", 16)
            .with_field(FieldSpec::float("x", min, max, precision))
            .compile(&AlgorithmRegistry::new())
            .unwrap();
        let input = values(&[("x", vec![Value::double(max)])]);
        let bytes = schema.encode(&input, &AlgorithmRegistry::new(), &ctx()).unwrap();
        let decoded = schema.decode(&bytes, &ctx());
        let y = decoded["x"][0].as_f64();
        prop_assert!(y.is_some(), "{} in [{}, {}] decoded as absent", max, min, max);
        let quantum = 10f64.powi(-precision);
        prop_assert!((y.unwrap_or_default() - max).abs() <= quantum + 1e-6);
    }

    #[test]
    fn prop_delta_within_quantum(key in 2.0f64..98.0, offset in -1.9f64..=1.9) {
        let schema = delta_schema().compile(&AlgorithmRegistry::new()).unwrap();
        let input = values(&[("depth", vec![Value::double(key), Value::double(key + offset)])]);
        let bytes = schema.encode(&input, &AlgorithmRegistry::new(), &ctx()).unwrap();
        let decoded = schema.decode(&bytes, &ctx());
        let k = decoded["depth"][0].as_f64().unwrap();
        let d = decoded["depth"][1].as_f64().unwrap();
        prop_assert!((k - key).abs() <= 0.05 + 1e-6);
        prop_assert!((d - (key + offset)).abs() <= 0.05 + 1e-6, "{} decoded as {}", key + offset, d);
    }
}
