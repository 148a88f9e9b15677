// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema definition types.
//!
//! A [`MessageSchema`] is assembled field by field, then compiled once into
//! an immutable [`CompiledSchema`](super::CompiledSchema).

use serde::{Deserialize, Serialize};

use crate::core::FieldKind;
use crate::encoding::header::HeaderPart;
use crate::publish::PublishSpec;

fn one() -> usize {
    1
}

/// The eight standard header parts as field specs.
pub fn standard_header() -> Vec<FieldSpec> {
    HeaderPart::ALL.into_iter().map(FieldSpec::header).collect()
}

/// One field of a message schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name
    pub name: String,
    /// Field type tag
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Lower bound (int, float)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound (int, float)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Decimal places kept (float)
    #[serde(default)]
    pub precision: i32,
    /// Byte length (string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Byte count (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bytes: Option<usize>,
    /// Enumerators (enum)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Literal (static)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Elements per repeat instance
    #[serde(default = "one")]
    pub array_length: usize,
    /// Enables delta frames for numeric arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delta: Option<f64>,
    /// Source variable the raw value is read from
    #[serde(default, alias = "source", skip_serializing_if = "Option::is_none")]
    pub source_var: Option<String>,
    /// Key inside a `key=value,...` source variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    /// Algorithms applied before encoding, `"name:ref..."`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub algorithms: Vec<String>,
}

impl FieldSpec {
    fn bare(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min: None,
            max: None,
            precision: 0,
            max_length: None,
            num_bytes: None,
            values: Vec::new(),
            value: None,
            array_length: 1,
            max_delta: None,
            source_var: None,
            source_key: None,
            algorithms: Vec::new(),
        }
    }

    /// Bounded integer field.
    pub fn int(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::bare(name, FieldKind::Int)
        }
    }

    /// Bounded float field.
    pub fn float(name: impl Into<String>, min: f64, max: f64, precision: i32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            precision,
            ..Self::bare(name, FieldKind::Float)
        }
    }

    /// Fixed-length string field.
    pub fn string(name: impl Into<String>, max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::bare(name, FieldKind::String)
        }
    }

    /// Enumerated string field.
    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::bare(name, FieldKind::Enum)
        }
    }

    /// Boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::bare(name, FieldKind::Bool)
    }

    /// Static literal field.
    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::bare(name, FieldKind::Static)
        }
    }

    /// Raw bytes field written as hex text.
    pub fn hex(name: impl Into<String>, num_bytes: usize) -> Self {
        Self {
            num_bytes: Some(num_bytes),
            ..Self::bare(name, FieldKind::Hex)
        }
    }

    /// Standard header part.
    pub fn header(part: HeaderPart) -> Self {
        Self::bare(part.name(), part.kind())
    }

    /// Set the number of elements per repeat instance.
    pub fn with_array_length(mut self, array_length: usize) -> Self {
        self.array_length = array_length;
        self
    }

    /// Enable delta frames with the given bound.
    pub fn with_max_delta(mut self, max_delta: f64) -> Self {
        self.max_delta = Some(max_delta);
        self
    }

    /// Append an algorithm.
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithms.push(algorithm.into());
        self
    }

    /// Bind to a source variable, optionally to a key inside it.
    pub fn with_source(mut self, var: impl Into<String>, key: Option<&str>) -> Self {
        self.source_var = Some(var.into());
        self.source_key = key.map(str::to_string);
        self
    }

    /// Standard header part this spec stands for, if any.
    ///
    /// A header-named spec that declares its own bounds is treated as a
    /// custom field instead.
    pub fn header_part(&self) -> Option<HeaderPart> {
        if self.min.is_some() || self.max.is_some() {
            return None;
        }
        HeaderPart::from_name(&self.name)
    }

    /// Variable the raw value is read from (the field name when unbound).
    pub fn source_var(&self) -> &str {
        self.source_var.as_deref().unwrap_or(&self.name)
    }
}

/// How many times the layout repeats in one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    /// Layout appears once; arrays are not allowed.
    #[default]
    None,
    /// As many instances as fit the byte budget.
    Auto,
    /// Exactly this many instances.
    Count(usize),
}

impl Repeat {
    /// Check if the schema repeats its layout.
    pub fn is_repeatable(&self) -> bool {
        !matches!(self, Repeat::None)
    }
}

/// A message type: header, layout and publish rules under a byte budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSchema {
    /// Message id carried in the `_id` header part
    pub id: u32,
    /// Message name
    pub name: String,
    /// Byte budget
    pub size: usize,
    /// Layout repetition
    #[serde(default)]
    pub repeat: Repeat,
    /// Header fields, in wire order
    #[serde(default = "standard_header")]
    pub header: Vec<FieldSpec>,
    /// Body fields, in wire order
    #[serde(default)]
    pub layout: Vec<FieldSpec>,
    /// Output rules applied after decode
    #[serde(default)]
    pub publish: Vec<PublishSpec>,
}

impl MessageSchema {
    /// Create a schema with the standard header and an empty layout.
    pub fn new(id: u32, name: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            repeat: Repeat::None,
            header: standard_header(),
            layout: Vec::new(),
            publish: Vec::new(),
        }
    }

    /// Append a body field.
    pub fn add_field(&mut self, spec: FieldSpec) -> &mut Self {
        self.layout.push(spec);
        self
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn with_field(mut self, spec: FieldSpec) -> Self {
        self.layout.push(spec);
        self
    }

    /// Append a header field.
    pub fn add_header_field(&mut self, spec: FieldSpec) -> &mut Self {
        self.header.push(spec);
        self
    }

    /// Replace the whole header.
    pub fn set_header(&mut self, header: Vec<FieldSpec>) -> &mut Self {
        self.header = header;
        self
    }

    /// Mutable access to a header field by name.
    pub fn header_field_mut(&mut self, name: &str) -> Option<&mut FieldSpec> {
        self.header.iter_mut().find(|f| f.name == name)
    }

    /// Set layout repetition.
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Append an output rule.
    pub fn add_publish(&mut self, publish: PublishSpec) -> &mut Self {
        self.publish.push(publish);
        self
    }

    /// Find a header or layout field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.header
            .iter()
            .chain(self.layout.iter())
            .find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_standard_header() {
        let schema = MessageSchema::new(1, "NAV", 32);
        let names: Vec<&str> = schema.header.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "_ccl_id",
                "_id",
                "_time",
                "_src_id",
                "_dest_id",
                "_multimessage_flag",
                "_broadcast_flag",
                "_unused"
            ]
        );
        assert_eq!(schema.header[2].header_part(), Some(HeaderPart::Time));
    }

    #[test]
    fn test_builder_helpers() {
        let spec = FieldSpec::float("speed", 0.0, 10.0, 1)
            .with_array_length(3)
            .with_max_delta(0.5)
            .with_algorithm("abs")
            .with_source("NAV_REPORT", Some("speed"));
        assert_eq!(spec.array_length, 3);
        assert_eq!(spec.max_delta, Some(0.5));
        assert_eq!(spec.algorithms, vec!["abs"]);
        assert_eq!(spec.source_var(), "NAV_REPORT");
        assert_eq!(spec.source_key.as_deref(), Some("speed"));
    }

    #[test]
    fn test_unbound_source_is_name() {
        assert_eq!(FieldSpec::boolean("ok").source_var(), "ok");
    }

    #[test]
    fn test_custom_header_part() {
        let spec = FieldSpec::int("_src_id", 0.0, 100.0);
        assert_eq!(spec.header_part(), None);
    }

    #[test]
    fn test_field_lookup() {
        let schema = MessageSchema::new(1, "NAV", 32).with_field(FieldSpec::boolean("ok"));
        assert!(schema.field("ok").is_some());
        assert!(schema.field("_time").is_some());
        assert!(schema.field("missing").is_none());
    }
}
