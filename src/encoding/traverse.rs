// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Recursive encode/decode of nested messages.
//!
//! The engine depends only on the [`Reflect`] capability: list a message's
//! fields through its [`MessageDescriptor`], then get or set each field's
//! value generically. [`DynamicMessage`] is the crate's own implementation.
//!
//! Every message splits into a head and a body. A scalar field marked
//! `in_head` belongs to the head and is skipped while walking the body, and
//! vice versa. Message fields are walked in both passes so their own scalar
//! fields can apply the same split.
//!
//! Field widths are fixed: a repeated field always occupies `max_repeat`
//! slots and absent values encode as the null sentinel.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::debug;

use super::bitset::Bitset;
use super::field::FieldCodec;
use crate::core::{DcclError, Result, TypeRegistry, Value};
use crate::schema::{FieldSpec, MAX_REPEAT};

/// Maximum nesting depth of message fields.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Registry of message descriptors resolved by name.
pub type DescriptorRegistry = TypeRegistry<MessageDescriptor>;

/// Per-field traversal options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldOptions {
    /// Skip the field entirely
    pub omit: bool,
    /// Encode in the head instead of the body
    pub in_head: bool,
    /// Repeated field with this many slots
    pub max_repeat: Option<usize>,
}

impl FieldOptions {
    /// Head field.
    pub fn head() -> Self {
        Self {
            in_head: true,
            ..Self::default()
        }
    }

    /// Repeated body field.
    pub fn repeated(max_repeat: usize) -> Self {
        Self {
            max_repeat: Some(max_repeat),
            ..Self::default()
        }
    }

    /// Field never encoded.
    pub fn omitted() -> Self {
        Self {
            omit: true,
            ..Self::default()
        }
    }
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A single encoded value
    Scalar(FieldCodec),
    /// A nested message, by descriptor name
    Message(String),
}

/// One field of a message descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub options: FieldOptions,
}

impl FieldDescriptor {
    fn is_repeated(&self) -> bool {
        self.options.max_repeat.is_some()
    }

    fn slots(&self) -> usize {
        self.options.max_repeat.unwrap_or(1)
    }

    fn included(&self, part: Part) -> bool {
        if self.options.omit {
            return false;
        }
        match self.field_type {
            FieldType::Message(_) => true,
            FieldType::Scalar(_) => self.options.in_head == (part == Part::Head),
        }
    }
}

/// Schema of a structured message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    /// Create an empty descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn add_field(&mut self, field: FieldDescriptor) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Append a scalar field built from a field spec.
    pub fn add_scalar(&mut self, spec: &FieldSpec, options: FieldOptions) -> Result<&mut Self> {
        let codec = spec.build_codec(&self.name)?;
        Ok(self.add_field(FieldDescriptor {
            name: spec.name.clone(),
            field_type: FieldType::Scalar(codec),
            options,
        }))
    }

    /// Append a nested message field.
    pub fn add_message(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        options: FieldOptions,
    ) -> &mut Self {
        self.add_field(FieldDescriptor {
            name: name.into(),
            field_type: FieldType::Message(type_name.into()),
            options,
        })
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Value held by a message field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Message(DynamicMessage),
    Repeated(Vec<FieldValue>),
}

impl FieldValue {
    fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "scalar",
            FieldValue::Message(_) => "message",
            FieldValue::Repeated(_) => "repeated",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            FieldValue::Scalar(v) => v.is_empty(),
            FieldValue::Message(m) => m.is_empty(),
            FieldValue::Repeated(items) => items.iter().all(FieldValue::is_empty),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<DynamicMessage> for FieldValue {
    fn from(message: DynamicMessage) -> Self {
        FieldValue::Message(message)
    }
}

/// Generic field access over a structured message.
pub trait Reflect {
    /// Schema of this message.
    fn descriptor(&self) -> &MessageDescriptor;

    /// Value of a field, if set.
    fn field(&self, name: &str) -> Option<&FieldValue>;

    /// Set a field's value.
    fn set_field(&mut self, name: &str, value: FieldValue);

    /// Unset a field.
    fn clear_field(&mut self, name: &str);

    /// Check that no field holds a present value.
    fn is_empty(&self) -> bool;
}

/// Message whose fields are stored by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    fields: HashMap<String, FieldValue>,
}

impl DynamicMessage {
    /// Create a message with no fields set.
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            fields: HashMap::new(),
        }
    }

    /// Builder form of [`Reflect::set_field`].
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set_field(name, value.into());
        self
    }
}

impl Reflect for DynamicMessage {
    fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    fn clear_field(&mut self, name: &str) {
        self.fields.remove(name);
    }

    fn is_empty(&self) -> bool {
        self.fields.values().all(FieldValue::is_empty)
    }
}

/// Which half of a message a pass walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Head,
    Body,
}

/// Recursive encoder/decoder over a descriptor registry.
pub struct Traversal<'a> {
    registry: &'a DescriptorRegistry,
}

impl<'a> Traversal<'a> {
    /// Create an engine resolving nested types through `registry`.
    pub fn new(registry: &'a DescriptorRegistry) -> Self {
        Self { registry }
    }

    /// Encode one part of `msg`.
    pub fn encode(&self, msg: &dyn Reflect, part: Part) -> Result<Bitset> {
        let mut out = Bitset::new();
        self.encode_message(msg.descriptor(), Some(msg), part, 0, &mut out)?;
        Ok(out)
    }

    /// Encoded bit length of one part of `msg`.
    pub fn size(&self, msg: &dyn Reflect, part: Part) -> Result<usize> {
        Ok(self.encode(msg, part)?.len())
    }

    /// Largest bit length of one part of any message of `desc`.
    pub fn max_size(&self, desc: &MessageDescriptor, part: Part) -> Result<usize> {
        self.max_bits(desc, part, 0)
    }

    /// Bit length of one part of a message with no fields set.
    pub fn min_size(&self, desc: &MessageDescriptor, part: Part) -> Result<usize> {
        let mut out = Bitset::new();
        self.encode_message(desc, None, part, 0, &mut out)?;
        Ok(out.len())
    }

    /// Check that every nested type resolves and every option is usable.
    pub fn validate(&self, desc: &MessageDescriptor) -> Result<()> {
        self.validate_at(desc, 0)
    }

    /// Human-readable layout of `desc`, nested types indented.
    pub fn info(&self, desc: &MessageDescriptor) -> Result<String> {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "{} (head {} bits, body {} bits)",
            desc.name,
            self.max_size(desc, Part::Head)?,
            self.max_size(desc, Part::Body)?
        );
        self.info_at(desc, 1, &mut s)?;
        Ok(s)
    }

    /// Decode a message from its head and body bits.
    ///
    /// Returns `None` when nothing present was decoded. Nested messages that
    /// decode empty are left unset, and repeated fields drop trailing absent
    /// slots.
    pub fn decode(
        &self,
        desc: &Arc<MessageDescriptor>,
        head: &Bitset,
        body: &Bitset,
    ) -> Result<Option<DynamicMessage>> {
        let mut head = head.clone();
        let mut body = body.clone();
        self.decode_message(desc, &mut head, &mut body, 0)
    }

    /// Call `hook` with the dotted path and value of every scalar in `msg`.
    ///
    /// Repeated message fields are not visited.
    pub fn run_hooks(&self, msg: &dyn Reflect, hook: &mut dyn FnMut(&str, &Value)) -> Result<()> {
        self.hooks_at(msg, "", hook, 0)
    }

    fn lookup(&self, parent: &MessageDescriptor, type_name: &str) -> Result<Arc<MessageDescriptor>> {
        self.registry.get(type_name)?.ok_or_else(|| {
            DcclError::invalid_schema(
                &parent.name,
                format!("unknown message type '{type_name}'"),
            )
        })
    }

    fn encode_message(
        &self,
        desc: &MessageDescriptor,
        msg: Option<&dyn Reflect>,
        part: Part,
        depth: usize,
        out: &mut Bitset,
    ) -> Result<()> {
        check_depth(desc, depth)?;
        for field in desc.fields.iter().filter(|f| f.included(part)) {
            let value = msg.and_then(|m| m.field(&field.name));
            match &field.field_type {
                FieldType::Scalar(codec) => {
                    let values = scalar_values(desc, field, value)?;
                    out.append(&codec.encode_array(&field.name, &values, field.slots(), 1)?);
                }
                FieldType::Message(type_name) => {
                    let sub = self.lookup(desc, type_name)?;
                    let items = message_values(desc, field, value)?;
                    for slot in 0..field.slots() {
                        let item = items.get(slot).copied().flatten();
                        self.encode_message(
                            &sub,
                            item.map(|m| m as &dyn Reflect),
                            part,
                            depth + 1,
                            out,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_message(
        &self,
        desc: &Arc<MessageDescriptor>,
        head: &mut Bitset,
        body: &mut Bitset,
        depth: usize,
    ) -> Result<Option<DynamicMessage>> {
        check_depth(desc, depth)?;
        let mut msg = DynamicMessage::new(Arc::clone(desc));
        for field in desc.fields.iter().filter(|f| !f.options.omit) {
            match &field.field_type {
                FieldType::Scalar(codec) => {
                    let cursor = if field.options.in_head {
                        &mut *head
                    } else {
                        &mut *body
                    };
                    let bits = cursor.take_front(codec.total_width(field.slots()));
                    let mut values = codec.decode_array(&bits, field.slots(), 1);
                    if field.is_repeated() {
                        while values.last().is_some_and(Value::is_empty) {
                            values.pop();
                        }
                        if !values.is_empty() {
                            let items = values.into_iter().map(FieldValue::Scalar).collect();
                            msg.set_field(&field.name, FieldValue::Repeated(items));
                        }
                    } else if let Some(v) = values.pop().filter(|v| !v.is_empty()) {
                        msg.set_field(&field.name, FieldValue::Scalar(v));
                    }
                }
                FieldType::Message(type_name) => {
                    let sub = self.lookup(desc, type_name)?;
                    let mut items = Vec::with_capacity(field.slots());
                    for _ in 0..field.slots() {
                        items.push(self.decode_message(&sub, head, body, depth + 1)?);
                    }
                    if field.is_repeated() {
                        while matches!(items.last(), Some(None)) {
                            items.pop();
                        }
                        if !items.is_empty() {
                            let items = items
                                .into_iter()
                                .map(|m| {
                                    FieldValue::Message(
                                        m.unwrap_or_else(|| DynamicMessage::new(Arc::clone(&sub))),
                                    )
                                })
                                .collect();
                            msg.set_field(&field.name, FieldValue::Repeated(items));
                        }
                    } else if let Some(Some(m)) = items.pop() {
                        msg.set_field(&field.name, FieldValue::Message(m));
                    }
                }
            }
        }
        Ok(if msg.is_empty() { None } else { Some(msg) })
    }

    fn max_bits(&self, desc: &MessageDescriptor, part: Part, depth: usize) -> Result<usize> {
        check_depth(desc, depth)?;
        let mut bits: usize = 0;
        for field in desc.fields.iter().filter(|f| f.included(part)) {
            let field_bits = match &field.field_type {
                FieldType::Scalar(codec) => codec.total_width(field.slots()),
                FieldType::Message(type_name) => {
                    let sub = self.lookup(desc, type_name)?;
                    field
                        .slots()
                        .saturating_mul(self.max_bits(&sub, part, depth + 1)?)
                }
            };
            bits = bits.saturating_add(field_bits);
        }
        Ok(bits)
    }

    fn validate_at(&self, desc: &MessageDescriptor, depth: usize) -> Result<()> {
        check_depth(desc, depth)?;
        for (i, field) in desc.fields.iter().enumerate() {
            if desc.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DcclError::invalid_schema(
                    &desc.name,
                    format!("duplicate field name '{}'", field.name),
                ));
            }
            if field.options.max_repeat == Some(0) {
                return Err(DcclError::invalid_schema(
                    &desc.name,
                    format!("repeated field '{}' has max_repeat 0", field.name),
                ));
            }
            if let Some(n) = field.options.max_repeat.filter(|&n| n > MAX_REPEAT) {
                return Err(DcclError::invalid_schema(
                    &desc.name,
                    format!(
                        "repeated field '{}' has max_repeat {n}, limit is {MAX_REPEAT}",
                        field.name
                    ),
                ));
            }
            if let FieldType::Message(type_name) = &field.field_type {
                let sub = self.lookup(desc, type_name)?;
                self.validate_at(&sub, depth + 1)?;
            }
        }
        Ok(())
    }

    fn info_at(&self, desc: &MessageDescriptor, indent: usize, s: &mut String) -> Result<()> {
        let pad = "  ".repeat(indent);
        for field in &desc.fields {
            let _ = write!(s, "{pad}{}: ", field.name);
            match &field.field_type {
                FieldType::Scalar(codec) => {
                    let _ = write!(s, "{} {} bits", codec.kind(), codec.total_width(field.slots()));
                }
                FieldType::Message(type_name) => {
                    let _ = write!(s, "{type_name}");
                }
            }
            if let Some(n) = field.options.max_repeat {
                let _ = write!(s, " [max_repeat {n}]");
            }
            if field.options.in_head {
                let _ = write!(s, " [head]");
            }
            if field.options.omit {
                let _ = write!(s, " [omit]");
            }
            let _ = writeln!(s);
            if let FieldType::Message(type_name) = &field.field_type {
                check_depth(desc, indent)?;
                let sub = self.lookup(desc, type_name)?;
                self.info_at(&sub, indent + 1, s)?;
            }
        }
        Ok(())
    }

    fn hooks_at(
        &self,
        msg: &dyn Reflect,
        prefix: &str,
        hook: &mut dyn FnMut(&str, &Value),
        depth: usize,
    ) -> Result<()> {
        let desc = msg.descriptor();
        check_depth(desc, depth)?;
        for field in desc.fields.iter().filter(|f| !f.options.omit) {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{prefix}.{}", field.name)
            };
            let value = msg.field(&field.name);
            match &field.field_type {
                FieldType::Scalar(_) => {
                    for v in scalar_values(desc, field, value)? {
                        hook(&path, &v);
                    }
                }
                FieldType::Message(_) if field.is_repeated() => {
                    debug!(field = %path, "run hooks skipped for repeated message field");
                }
                FieldType::Message(_) => {
                    if let Some(sub) = message_values(desc, field, value)?.into_iter().flatten().next() {
                        self.hooks_at(sub, &path, hook, depth + 1)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_depth(desc: &MessageDescriptor, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DcclError::invalid_schema(
            &desc.name,
            format!("message nesting exceeds {MAX_NESTING_DEPTH} levels"),
        ));
    }
    Ok(())
}

fn mismatch(desc: &MessageDescriptor, field: &FieldDescriptor, expected: &str, found: &FieldValue) -> DcclError {
    DcclError::type_mismatch(
        format!("{}.{}", desc.name, field.name),
        expected,
        found.kind_name(),
    )
}

fn scalar_values(
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    value: Option<&FieldValue>,
) -> Result<Vec<Value>> {
    match value {
        None => Ok(Vec::new()),
        Some(FieldValue::Scalar(v)) => Ok(vec![v.clone()]),
        Some(FieldValue::Repeated(items)) if field.is_repeated() => items
            .iter()
            .map(|item| match item {
                FieldValue::Scalar(v) => Ok(v.clone()),
                other => Err(mismatch(desc, field, "scalar", other)),
            })
            .collect(),
        Some(other) => Err(mismatch(desc, field, "scalar", other)),
    }
}

fn message_values<'m>(
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    value: Option<&'m FieldValue>,
) -> Result<Vec<Option<&'m DynamicMessage>>> {
    match value {
        None => Ok(Vec::new()),
        Some(FieldValue::Message(m)) => Ok(vec![Some(m)]),
        Some(FieldValue::Repeated(items)) if field.is_repeated() => items
            .iter()
            .map(|item| match item {
                FieldValue::Message(m) => Ok(Some(m)),
                FieldValue::Scalar(v) if v.is_empty() => Ok(None),
                other => Err(mismatch(desc, field, "message", other)),
            })
            .collect(),
        Some(other) => Err(mismatch(desc, field, "message", other)),
    }
}
