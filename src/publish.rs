// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Output formatting of decoded messages.
//!
//! A publish rule renders decoded field values into a `(variable, value)`
//! pair through a `%N%` template, once per repeat instance. Placeholders are
//! 1-based over the rule's flattened field values, so a field with
//! `array_length` 3 occupies three consecutive slots.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::algorithm::{AlgorithmCall, AlgorithmRegistry};
use crate::core::value::MAX_DBL_PRECISION;
use crate::core::{DcclError, FieldKind, Result, Value, ValueKind, ValueMap};
use crate::schema::CompiledSchema;

/// A field referenced by a publish rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PublishFieldSpec {
    /// Header or layout field name
    pub name: String,
    /// Algorithms applied to the decoded value, `"name:ref..."`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub algorithms: Vec<String>,
}

impl From<&str> for PublishFieldSpec {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            algorithms: Vec::new(),
        }
    }
}

/// An output rule as written in a schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PublishSpec {
    /// Target variable, may contain placeholders
    pub var: String,
    /// Value template; generated from the fields when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Referenced fields, in placeholder order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<PublishFieldSpec>,
    /// Reference every layout field and every header field not starting with `_`
    #[serde(default)]
    pub all: bool,
    /// Coercion applied to the rendered text
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub hint: Option<ValueKind>,
}

impl PublishSpec {
    /// Rule publishing to `var` with a generated format.
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            ..Self::default()
        }
    }

    /// Rule publishing every field to `var`.
    pub fn all(var: impl Into<String>) -> Self {
        Self {
            all: true,
            ..Self::new(var)
        }
    }

    /// Set an explicit format template.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Reference a field.
    pub fn with_field(mut self, name: &str) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Reference a field through algorithms.
    pub fn with_field_algorithms<S: Into<String>>(
        mut self,
        name: &str,
        algorithms: impl IntoIterator<Item = S>,
    ) -> Self {
        self.fields.push(PublishFieldSpec {
            name: name.to_string(),
            algorithms: algorithms.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Set the coercion hint.
    pub fn with_hint(mut self, hint: ValueKind) -> Self {
        self.hint = Some(hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    /// 0-based slot index
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    fn parse(schema: &str, source: &str, slots: usize) -> Result<Self> {
        let placeholder =
            Regex::new(r"%(\d+)%").map_err(|e| DcclError::parse("publish format", e.to_string()))?;
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in placeholder.captures_iter(source) {
            let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let index: usize = digits.as_str().parse().unwrap_or(0);
            if index == 0 || index > slots {
                return Err(DcclError::invalid_schema(
                    schema,
                    format!(
                        "publish placeholder %{index}% is out of range (1..={slots}) in '{source}'"
                    ),
                ));
            }
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Slot(index - 1));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    fn render(&self, slots: &[String]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Slot(i) => out.push_str(slots.get(*i).map_or("", String::as_str)),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldRef {
    name: String,
    kind: FieldKind,
    array_length: usize,
    is_header: bool,
    algorithms: Vec<AlgorithmCall>,
}

/// A compiled output rule.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRule {
    var: Template,
    format: Template,
    refs: Vec<FieldRef>,
    hint: Option<ValueKind>,
}

impl PublishRule {
    /// Resolve `spec` against a compiled schema.
    ///
    /// Unknown fields, algorithms and out-of-range placeholders are schema
    /// errors.
    pub fn compile(
        schema: &CompiledSchema,
        spec: &PublishSpec,
        registry: &AlgorithmRegistry,
    ) -> Result<Self> {
        let name = schema.name();
        let mut refs = Vec::new();

        if spec.all {
            for field in schema.header().iter().filter(|f| !f.name.starts_with('_')) {
                refs.push(field_ref(schema, &field.name, Vec::new())?);
            }
            for field in schema.layout() {
                refs.push(field_ref(schema, &field.name, Vec::new())?);
            }
        }
        for field in &spec.fields {
            let calls = field
                .algorithms
                .iter()
                .map(|a| AlgorithmCall::parse(a))
                .collect::<Result<Vec<_>>>()?;
            for call in &calls {
                registry.check(name, call, |n| schema.field(n).is_some())?;
            }
            refs.push(field_ref(schema, &field.name, calls)?);
        }
        if refs.is_empty() {
            return Err(DcclError::invalid_schema(
                name,
                format!("publish to '{}' references no fields", spec.var),
            ));
        }

        let slots: usize = refs.iter().map(|r| r.array_length).sum();
        let format = match &spec.format {
            Some(f) => f.clone(),
            None => default_format(&refs),
        };
        Ok(Self {
            var: Template::parse(name, &spec.var, slots)?,
            format: Template::parse(name, &format, slots)?,
            refs,
            hint: spec.hint,
        })
    }

    /// Target variable template.
    pub fn var(&self) -> &str {
        &self.var.source
    }

    /// Value template.
    pub fn format(&self) -> &str {
        &self.format.source
    }

    /// One-line summary used by schema dumps.
    pub fn describe(&self) -> String {
        let names: Vec<&str> = self.refs.iter().map(|r| r.name.as_str()).collect();
        format!(
            "{} <- \"{}\" [{}]",
            self.var.source,
            self.format.source,
            names.join(",")
        )
    }

    /// Render decoded values, one pair per repeat instance.
    pub fn evaluate(
        &self,
        values: &ValueMap,
        repeat: usize,
        registry: &AlgorithmRegistry,
    ) -> Vec<(String, Value)> {
        self.evaluate_with_precision(values, repeat, registry, MAX_DBL_PRECISION)
    }

    /// Like [`PublishRule::evaluate`], with published doubles carrying `precision`.
    pub fn evaluate_with_precision(
        &self,
        values: &ValueMap,
        repeat: usize,
        registry: &AlgorithmRegistry,
        precision: i32,
    ) -> Vec<(String, Value)> {
        (0..repeat.max(1))
            .map(|instance| {
                let slots = self.render_slots(values, instance, registry);
                let text = self.format.render(&slots);
                (self.var.render(&slots), coerce(&text, self.hint, precision))
            })
            .collect()
    }

    fn render_slots(
        &self,
        values: &ValueMap,
        instance: usize,
        registry: &AlgorithmRegistry,
    ) -> Vec<String> {
        let mut slots = Vec::new();
        for r in &self.refs {
            let base = if r.is_header { 0 } else { instance * r.array_length };
            for j in 0..r.array_length {
                let index = base + j;
                let mut v = values
                    .get(&r.name)
                    .and_then(|vs| vs.get(index))
                    .cloned()
                    .unwrap_or_default();
                registry.apply_all(&r.algorithms, &mut v, index, values);
                slots.push(render_value(&v, r.kind));
            }
        }
        slots
    }
}

fn field_ref(schema: &CompiledSchema, name: &str, algorithms: Vec<AlgorithmCall>) -> Result<FieldRef> {
    let field = schema.field(name).ok_or_else(|| {
        DcclError::invalid_schema(
            schema.name(),
            format!("publish references unknown field '{name}'"),
        )
    })?;
    Ok(FieldRef {
        name: field.name.clone(),
        kind: field.kind(),
        array_length: field.array_length,
        is_header: schema.is_header_field(name),
        algorithms,
    })
}

fn default_format(refs: &[FieldRef]) -> String {
    if refs.len() == 1 && refs[0].array_length == 1 {
        return "%1%".to_string();
    }
    let mut parts = Vec::with_capacity(refs.len());
    let mut next = 1;
    for r in refs {
        let repeated_name = refs.iter().filter(|o| o.name == r.name).count() > 1;
        let label = if repeated_name && !r.algorithms.is_empty() {
            let algs: String = r.algorithms.iter().map(|a| a.name.as_str()).collect();
            format!("{algs}({})", r.name)
        } else {
            r.name.clone()
        };
        let body = if r.array_length > 1 {
            let slots: Vec<String> = (next..next + r.array_length).map(|k| format!("%{k}%")).collect();
            format!("{{{}}}", slots.join(","))
        } else {
            format!("%{next}%")
        };
        next += r.array_length;
        parts.push(format!("{label}={body}"));
    }
    parts.join(",")
}

fn render_value(value: &Value, kind: FieldKind) -> String {
    if value.is_empty() {
        return if kind.is_numeric() { "nan" } else { "" }.to_string();
    }
    value.as_string().unwrap_or_default()
}

fn coerce(text: &str, hint: Option<ValueKind>, precision: i32) -> Value {
    let out = match hint {
        Some(kind) => {
            let mut out = Value::Empty;
            if out.set(kind, text) {
                out
            } else {
                Value::string(text)
            }
        }
        None => match text.trim().parse::<f64>() {
            Ok(x) => Value::double(x),
            Err(_) => Value::string(text),
        },
    };
    match out {
        Value::Double { value, .. } => Value::double_with_precision(value, precision),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, MessageSchema, Repeat};

    fn compile(schema: MessageSchema) -> CompiledSchema {
        schema.compile(&AlgorithmRegistry::with_builtins()).unwrap()
    }

    fn map(entries: &[(&str, Vec<Value>)]) -> ValueMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_single_field_default_format() {
        let mut schema = MessageSchema::new(1, "M", 32).with_field(FieldSpec::int("depth", 0.0, 100.0));
        schema.add_publish(PublishSpec::new("DEPTH").with_field("depth"));
        let compiled = compile(schema);
        let rule = &compiled.publish_rules()[0];
        assert_eq!(rule.format(), "%1%");

        let out = rule.evaluate(
            &map(&[("depth", vec![Value::Long(12)])]),
            1,
            &AlgorithmRegistry::new(),
        );
        assert_eq!(out, vec![("DEPTH".to_string(), Value::double(12.0))]);
    }

    #[test]
    fn test_multi_field_default_format_with_labels() {
        let mut schema = MessageSchema::new(1, "M", 32)
            .with_field(FieldSpec::float("heading", -360.0, 360.0, 0))
            .with_field(FieldSpec::string("who", 4));
        schema.add_publish(
            PublishSpec::new("NAV")
                .with_field("heading")
                .with_field_algorithms("heading", ["abs", "angle_0_360"])
                .with_field("who"),
        );
        let compiled = compile(schema);
        let rule = &compiled.publish_rules()[0];
        assert_eq!(
            rule.format(),
            "heading=%1%,absangle_0_360(heading)=%2%,who=%3%"
        );

        let values = map(&[
            ("heading", vec![Value::double_with_precision(-90.0, 0)]),
            ("who", vec![Value::Empty]),
        ]);
        let out = rule.evaluate(&values, 1, &AlgorithmRegistry::with_builtins());
        assert_eq!(
            out[0].1,
            Value::string("heading=-90,absangle_0_360(heading)=90,who=")
        );
    }

    #[test]
    fn test_array_group_and_absent_numeric() {
        let mut schema = MessageSchema::new(1, "M", 32)
            .with_repeat(Repeat::Count(1))
            .with_field(FieldSpec::int("x", 0.0, 10.0).with_array_length(2))
            .with_field(FieldSpec::boolean("ok"));
        schema.add_publish(PublishSpec::new("OUT").with_field("x").with_field("ok"));
        let compiled = compile(schema);
        let rule = &compiled.publish_rules()[0];
        assert_eq!(rule.format(), "x={%1%,%2%},ok=%3%");

        let values = map(&[
            ("x", vec![Value::Long(3), Value::Empty]),
            ("ok", vec![Value::Bool(true)]),
        ]);
        let out = rule.evaluate(&values, 1, &AlgorithmRegistry::new());
        assert_eq!(out[0].1, Value::string("x={3,nan},ok=true"));
    }

    #[test]
    fn test_all_mode_and_var_placeholders() {
        let mut schema = MessageSchema::new(1, "M", 32)
            .with_field(FieldSpec::string("dest", 4))
            .with_field(FieldSpec::int("n", 0.0, 10.0));
        schema.add_publish(PublishSpec::all("MSG_%1%").with_format("%2%"));
        let compiled = compile(schema);
        let rule = &compiled.publish_rules()[0];

        let values = map(&[
            ("dest", vec![Value::from("ship")]),
            ("n", vec![Value::Long(7)]),
            ("_id", vec![Value::Long(1)]),
        ]);
        let out = rule.evaluate(&values, 1, &AlgorithmRegistry::new());
        assert_eq!(out, vec![("MSG_ship".to_string(), Value::double(7.0))]);
    }

    #[test]
    fn test_repeat_instances() {
        let mut schema = MessageSchema::new(1, "M", 16)
            .with_repeat(Repeat::Count(3))
            .with_field(FieldSpec::int("x", 0.0, 10.0));
        schema.add_publish(
            PublishSpec::new("X")
                .with_field("x")
                .with_hint(ValueKind::Long),
        );
        let compiled = compile(schema);
        let values = map(&[("x", vec![Value::Long(1), Value::Long(2), Value::Long(3)])]);
        let out = compiled.publish_rules()[0].evaluate(&values, 3, &AlgorithmRegistry::new());
        let published: Vec<Value> = out.into_iter().map(|(_, v)| v).collect();
        assert_eq!(published, vec![Value::Long(1), Value::Long(2), Value::Long(3)]);
    }

    #[test]
    fn test_hint_fallback_to_string() {
        assert_eq!(coerce("abc", Some(ValueKind::Double), 15), Value::string("abc"));
        assert_eq!(coerce("true", Some(ValueKind::Bool), 15), Value::Bool(true));
        assert_eq!(coerce("abc", None, 15), Value::string("abc"));
    }

    #[test]
    fn test_published_double_precision() {
        let three = Value::double_with_precision(12.5, 3);
        assert_eq!(coerce("12.5", None, 3), three);
        assert_eq!(three.to_string(), "12.500");
        assert_eq!(coerce("12.5", Some(ValueKind::Double), 3), three);
        assert_eq!(coerce("12", Some(ValueKind::Long), 3), Value::Long(12));
    }

    #[test]
    fn test_compile_errors() {
        let registry = AlgorithmRegistry::with_builtins();
        let base = MessageSchema::new(1, "M", 32).with_field(FieldSpec::int("x", 0.0, 10.0));

        let mut bad_field = base.clone();
        bad_field.add_publish(PublishSpec::new("V").with_field("missing"));
        assert!(bad_field.compile(&registry).unwrap_err().is_schema_error());

        let mut bad_slot = base.clone();
        bad_slot.add_publish(PublishSpec::new("V").with_field("x").with_format("%2%"));
        assert!(bad_slot.compile(&registry).unwrap_err().is_schema_error());

        let mut bad_alg = base;
        bad_alg.add_publish(PublishSpec::new("V").with_field_algorithms("x", ["nope"]));
        assert!(matches!(
            bad_alg.compile(&registry),
            Err(DcclError::UnknownAlgorithm { .. })
        ));
    }
}
