// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message schemas.
//!
//! - [`ast`] - Field and message definitions, built in code or parsed
//! - [`compiler`] - Validation, width and repeat resolution
//! - [`parser`] - TOML and JSON schema files
//! - [`source`] - Source-variable binding for encode input

pub mod ast;
pub mod compiler;
pub mod parser;
pub mod source;

use std::path::Path;

pub use ast::{standard_header, FieldSpec, MessageSchema, Repeat};
pub use compiler::{
    binary_search_repeat, fits, linear_search_repeat, CompiledField, CompiledSchema, MAX_FIELD_BYTES,
    MAX_REPEAT,
};
pub use parser::{load_schemas, parse_schemas};
pub use source::read_sources;

/// Schema file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// TOML document
    Toml,
    /// JSON document
    Json,
}

impl SchemaFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "toml" => Some(SchemaFormat::Toml),
            "json" => Some(SchemaFormat::Json),
            _ => None,
        }
    }

    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::parse)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFormat::Toml => "toml",
            SchemaFormat::Json => "json",
        }
    }
}
