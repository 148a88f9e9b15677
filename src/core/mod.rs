// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout dccl.
//!
//! This module provides the foundational types for the library:
//! - [`DcclError`] - Error handling
//! - [`Value`] - Field value with lossy coercions
//! - [`TypeRegistry`] - Shared name-keyed registry
//! - [`FieldKind`] - Field type tag

pub mod error;
pub mod registry;
pub mod value;

pub use error::{DcclError, Result};
pub use registry::TypeRegistry;
pub use value::{Value, ValueKind, ValueMap};

use serde::{Deserialize, Serialize};

/// Field type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Constant literal, zero bits on the wire
    Static,
    /// Single bit
    Bool,
    /// Bounded integer
    Int,
    /// Bounded float with decimal precision
    Float,
    /// Fixed-length, NUL-padded string
    String,
    /// One of a fixed list of strings
    Enum,
    /// Fixed number of raw bytes written as hex
    Hex,
}

impl FieldKind {
    /// Get the schema tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Static => "static",
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::String => "string",
            FieldKind::Enum => "enum",
            FieldKind::Hex => "hex",
        }
    }

    /// Check if values of this kind are numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Int | FieldKind::Float)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a `FieldKind` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFieldKindError {
    _private: (),
}

impl std::fmt::Display for ParseFieldKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid field type, expected one of 'static', 'bool', 'int', 'float', 'string', 'enum', 'hex'"
        )
    }
}

impl std::error::Error for ParseFieldKindError {}

impl std::str::FromStr for FieldKind {
    type Err = ParseFieldKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(FieldKind::Static),
            "bool" => Ok(FieldKind::Bool),
            "int" => Ok(FieldKind::Int),
            "float" => Ok(FieldKind::Float),
            "string" => Ok(FieldKind::String),
            "enum" => Ok(FieldKind::Enum),
            "hex" => Ok(FieldKind::Hex),
            _ => Err(ParseFieldKindError { _private: () }),
        }
    }
}
