// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Source-variable binding.
//!
//! Builds an encode value map from named text variables. A field reads the
//! variable named by its `source_var` (its own name when unbound). With a
//! `source_key`, the variable is read as a `key=value,key2=value2` list and
//! only that key's value is taken. A value written `{a,b,c}` fills
//! consecutive array elements.

use std::collections::HashMap;

use super::compiler::CompiledSchema;
use crate::core::{Value, ValueMap};

/// Collect raw string values for every field bound to a present source.
pub fn read_sources(schema: &CompiledSchema, sources: &HashMap<String, String>) -> ValueMap {
    let mut out = ValueMap::new();
    for field in schema.header().iter().chain(schema.layout().iter()) {
        let Some(content) = sources.get(&field.source_var) else {
            continue;
        };
        let raw = match &field.source_key {
            Some(key) if content.contains('=') => match lookup_key(content, key) {
                Some(v) => v,
                None => continue,
            },
            _ => content.trim(),
        };
        out.insert(field.name.clone(), split_elements(raw));
    }
    out
}

/// Value of `key` in a `key=value,...` list. Commas inside braces do not
/// separate entries.
pub fn lookup_key<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    split_top_level(content).into_iter().find_map(|entry| {
        let (k, v) = entry.split_once('=')?;
        k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
    })
}

fn split_top_level(content: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&content[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&content[start..]);
    parts
}

fn split_elements(raw: &str) -> Vec<Value> {
    let raw = raw.trim();
    match raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        Some(inner) => inner
            .split(',')
            .map(|s| Value::string(s.trim()))
            .collect(),
        None => vec![Value::string(raw)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmRegistry;
    use crate::schema::{FieldSpec, MessageSchema, Repeat};

    fn sources(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lookup_key() {
        let content = "x=1, Depth = 20.5,list={1,2},name=auv";
        assert_eq!(lookup_key(content, "depth"), Some("20.5"));
        assert_eq!(lookup_key(content, "list"), Some("{1,2}"));
        assert_eq!(lookup_key(content, "name"), Some("auv"));
        assert_eq!(lookup_key(content, "missing"), None);
    }

    #[test]
    fn test_read_sources() {
        let mut schema = MessageSchema::new(1, "NAV", 32)
            .with_repeat(Repeat::Count(1))
            .with_field(FieldSpec::float("depth", 0.0, 100.0, 1).with_source("NAV_REPORT", Some("depth")))
            .with_field(FieldSpec::int("speed", 0.0, 10.0).with_source("SPEED", None))
            .with_field(FieldSpec::int("hits", 0.0, 10.0).with_array_length(2))
            .with_field(FieldSpec::boolean("unbound"));
        if let Some(dest) = schema.header_field_mut("_dest_id") {
            dest.source_var = Some("DEST".into());
        }
        let compiled = schema.compile(&AlgorithmRegistry::new()).unwrap();

        let values = read_sources(
            &compiled,
            &sources(&[
                ("NAV_REPORT", "x=1,depth=12.5"),
                ("SPEED", " 3 "),
                ("hits", "{4, 5}"),
                ("DEST", "9"),
            ]),
        );
        assert_eq!(values["depth"], vec![Value::string("12.5")]);
        assert_eq!(values["speed"], vec![Value::string("3")]);
        assert_eq!(values["hits"], vec![Value::string("4"), Value::string("5")]);
        assert_eq!(values["_dest_id"], vec![Value::string("9")]);
        assert!(!values.contains_key("unbound"));
    }

    #[test]
    fn test_missing_key_skips_field() {
        let compiled = MessageSchema::new(1, "NAV", 32)
            .with_field(FieldSpec::int("speed", 0.0, 10.0).with_source("NAV_REPORT", Some("speed")))
            .compile(&AlgorithmRegistry::new())
            .unwrap();
        let values = read_sources(&compiled, &sources(&[("NAV_REPORT", "depth=3")]));
        assert!(values.is_empty());
    }
}
