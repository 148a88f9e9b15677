// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use dccl::{Codec, CodecConfig, EncodeContext, Value, ValueMap};

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Build a codec from an optional configuration file.
pub fn build_codec(config: Option<&Path>) -> Result<Codec> {
    let config = match config {
        Some(path) => CodecConfig::load(path)?,
        None => CodecConfig::default(),
    };
    Ok(Codec::from_config(config)?)
}

/// Build a codec and load a schema file into it, unless the
/// configuration already lists that file.
pub fn open_codec(config: Option<&Path>, schema_file: &Path) -> Result<Codec> {
    let mut codec = build_codec(config)?;
    let wanted = std::fs::canonicalize(schema_file).ok();
    let already_loaded = codec
        .config()
        .schemas
        .iter()
        .any(|p| std::fs::canonicalize(p).ok() == wanted && wanted.is_some());
    if !already_loaded {
        codec.load_file(schema_file)?;
    }
    Ok(codec)
}

/// Encode context from an optional modem id and time override.
pub fn context(codec: &Codec, modem_id: Option<u32>, time: Option<&str>) -> Result<EncodeContext> {
    let modem_id = modem_id.unwrap_or(codec.config().modem_id);
    Ok(match time {
        Some(s) => EncodeContext::at(modem_id, parse_time(s)?),
        None => EncodeContext::new(modem_id),
    })
}

/// Parse a time given as Unix seconds or RFC 3339.
pub fn parse_time(s: &str) -> CliResult<DateTime<Utc>> {
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {s}"));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| anyhow::anyhow!("Invalid time: {s}"))
}

/// Parse `NAME=VALUE` arguments. Only the first `=` separates.
pub fn parse_assignments(pairs: &[String]) -> CliResult<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Expected NAME=VALUE, got: {pair}"))?;
            let name = name.trim();
            if name.is_empty() {
                anyhow::bail!("Empty name in: {pair}");
            }
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse a hex string. Whitespace and a leading `0x` are ignored.
pub fn parse_hex(s: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    hex::decode(cleaned).map_err(|e| anyhow::anyhow!("Invalid hex input: {e}"))
}

/// JSON form of a single value. Absent values become `null`.
pub fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Empty => serde_json::Value::Null,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Long(n) => serde_json::Value::from(*n),
        Value::Double { .. } => value
            .as_string()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
    }
}

/// JSON form of a decoded map, sorted by field name. Single-element fields
/// are written as scalars.
pub fn json_map(values: &ValueMap) -> BTreeMap<String, serde_json::Value> {
    values
        .iter()
        .map(|(name, elements)| {
            let json = match elements.as_slice() {
                [single] => json_value(single),
                many => serde_json::Value::Array(many.iter().map(json_value).collect()),
            };
            (name.clone(), json)
        })
        .collect()
}

/// Comma-joined text of a field's elements.
pub fn join_values(elements: &[Value]) -> String {
    elements
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
