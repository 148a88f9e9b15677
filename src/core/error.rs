// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for dccl.
//!
//! Two failure classes exist:
//! - Schema errors, raised while compiling a schema before any traffic
//! - Per-call errors (type mismatch, malformed input) that abort a single
//!   encode or decode and leave the compiled schema reusable
//!
//! Out-of-range and absent values are not errors; they encode as the null
//! sentinel.

use thiserror::Error;

/// Errors that can occur while compiling schemas or encoding/decoding messages.
#[derive(Debug, Clone, Error)]
pub enum DcclError {
    /// Schema cannot be compiled
    #[error("Invalid schema '{schema}': {reason}")]
    InvalidSchema {
        /// Message name or id
        schema: String,
        /// Why compilation failed
        reason: String,
    },

    /// Algorithm name not present in the registry
    #[error("Schema '{schema}' uses unknown algorithm '{name}'")]
    UnknownAlgorithm {
        /// Message name
        schema: String,
        /// Algorithm name
        name: String,
    },

    /// Algorithm references a field that is in neither header nor layout
    #[error("Algorithm '{algorithm}' in schema '{schema}' references unknown field '{reference}'")]
    UnknownReference {
        /// Message name
        schema: String,
        /// Algorithm name
        algorithm: String,
        /// Referenced field name
        reference: String,
    },

    /// Value of a fundamentally wrong representation handed to a field
    #[error("Type mismatch for field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Expected representation
        expected: String,
        /// Representation given
        found: String,
    },

    /// No schema loaded for the given name or id
    #[error("Unknown message: '{key}'")]
    UnknownMessage {
        /// Name or id used for lookup
        key: String,
    },

    /// Input shorter than the fixed part of the wire format
    #[error("Message needs at least {needed} bytes but only {available} bytes available")]
    LengthExceeded {
        /// Minimum byte count
        needed: usize,
        /// Bytes supplied
        available: usize,
    },

    /// Parse error in a schema file, config file or field value
    #[error("Parse error in {context}: {message}")]
    Parse {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// I/O failure while reading a schema or config file
    #[error("I/O error: {0}")]
    Io(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl DcclError {
    /// Create an invalid schema error.
    pub fn invalid_schema(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        DcclError::InvalidSchema {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown algorithm error.
    pub fn unknown_algorithm(schema: impl Into<String>, name: impl Into<String>) -> Self {
        DcclError::UnknownAlgorithm {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Create an unknown reference error.
    pub fn unknown_reference(
        schema: impl Into<String>,
        algorithm: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        DcclError::UnknownReference {
            schema: schema.into(),
            algorithm: algorithm.into(),
            reference: reference.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        DcclError::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unknown message error.
    pub fn unknown_message(key: impl Into<String>) -> Self {
        DcclError::UnknownMessage { key: key.into() }
    }

    /// Create a length error.
    pub fn length_exceeded(needed: usize, available: usize) -> Self {
        DcclError::LengthExceeded { needed, available }
    }

    /// Create a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        DcclError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised by schema compilation.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            DcclError::InvalidSchema { .. }
                | DcclError::UnknownAlgorithm { .. }
                | DcclError::UnknownReference { .. }
        )
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            DcclError::InvalidSchema { schema, reason } => {
                vec![("schema", schema.clone()), ("reason", reason.clone())]
            }
            DcclError::UnknownAlgorithm { schema, name } => {
                vec![("schema", schema.clone()), ("algorithm", name.clone())]
            }
            DcclError::UnknownReference {
                schema,
                algorithm,
                reference,
            } => vec![
                ("schema", schema.clone()),
                ("algorithm", algorithm.clone()),
                ("reference", reference.clone()),
            ],
            DcclError::TypeMismatch {
                field,
                expected,
                found,
            } => vec![
                ("field", field.clone()),
                ("expected", expected.clone()),
                ("found", found.clone()),
            ],
            DcclError::UnknownMessage { key } => vec![("message", key.clone())],
            DcclError::LengthExceeded { needed, available } => vec![
                ("needed", needed.to_string()),
                ("available", available.to_string()),
            ],
            DcclError::Parse { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            DcclError::Io(msg) | DcclError::Other(msg) => vec![("message", msg.clone())],
        }
    }
}

impl From<std::io::Error> for DcclError {
    fn from(err: std::io::Error) -> Self {
        DcclError::Io(err.to_string())
    }
}

/// Result type for dccl operations.
pub type Result<T> = std::result::Result<T, DcclError>;
