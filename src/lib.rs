// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # DCCL
//!
//! Schema-driven, bit-packed message codec for low-bandwidth links such as
//! underwater acoustic modems.
//!
//! Each message type is described by a schema of bounded fields. Compiling a
//! schema fixes every field's bit width, so the encoded size is known before
//! any traffic and can be checked against the link's byte budget.
//!
//! ## Architecture
//!
//! - `core/` - Values, field kinds, errors, shared registries
//! - `encoding/` - Bit accumulator, field codecs, header, message and nested traversal
//! - `algorithm/` - Named value transforms applied before encoding
//! - `schema/` - Schema definitions, compiler, schema files, source binding
//! - `publish` - Output formatting of decoded messages
//! - `codec` - Facade holding the compiled schemas
//!
//! ## Example
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dccl::{Codec, EncodeContext, FieldSpec, MessageSchema, Value, ValueMap};
//!
//! let mut codec = Codec::default();
//! codec.add_schema(
//!     MessageSchema::new(5, "NAV", 32)
//!         .with_field(FieldSpec::float("depth", 0.0, 500.0, 1))
//!         .with_field(FieldSpec::enumeration("mode", ["idle", "survey"])),
//! )?;
//!
//! let mut values = ValueMap::new();
//! values.insert("depth".into(), vec![Value::double(42.5)]);
//! values.insert("mode".into(), vec![Value::from("survey")]);
//!
//! let ctx = EncodeContext::new(1);
//! let bytes = codec.encode("NAV", &values, &ctx)?;
//! let decoded = codec.decode(&bytes, &ctx)?;
//! assert_eq!(decoded["mode"], vec![Value::from("survey")]);
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

pub use core::{DcclError, FieldKind, Result, TypeRegistry, Value, ValueKind, ValueMap};

// Bit-level encoding/decoding
pub mod encoding;

pub use encoding::{
    Bitset, DescriptorRegistry, DynamicMessage, EncodeContext, FieldCodec, FieldOptions,
    FieldValue, MessageDescriptor, Part, Reflect, Traversal,
};

// Value transforms
pub mod algorithm;

pub use algorithm::{AlgorithmCall, AlgorithmRegistry};

// Schema definition and compilation
pub mod schema;

pub use schema::{CompiledSchema, FieldSpec, MessageSchema, Repeat};

// Output formatting
pub mod publish;

pub use publish::{PublishRule, PublishSpec};

pub mod config;

pub use config::CodecConfig;

pub mod codec;

pub use codec::Codec;
