// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema file parsing.
//!
//! A schema file holds one or more `[[message]]` tables:
//!
//! ```toml
//! [[message]]
//! id = 5
//! name = "NAV"
//! size = 32
//!
//! [[message.header]]
//! name = "_dest_id"
//! type = "int"
//! source = "DEST"
//!
//! [[message.layout]]
//! name = "depth"
//! type = "float"
//! min = 0
//! max = 500
//! precision = 1
//! ```
//!
//! Header entries override the standard header part of the same name and
//! append otherwise; `custom_header = true` replaces the standard header.

use std::path::Path;

use serde::Deserialize;

use super::ast::{FieldSpec, MessageSchema, Repeat};
use super::SchemaFormat;
use crate::core::{DcclError, Result};
use crate::publish::PublishSpec;

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default, rename = "message")]
    messages: Vec<MessageEntry>,
}

#[derive(Debug, Deserialize)]
struct MessageEntry {
    id: u32,
    name: String,
    size: usize,
    #[serde(default)]
    repeat: Repeat,
    #[serde(default)]
    custom_header: bool,
    #[serde(default)]
    header: Vec<FieldSpec>,
    #[serde(default)]
    layout: Vec<FieldSpec>,
    #[serde(default)]
    publish: Vec<PublishSpec>,
}

impl MessageEntry {
    fn into_schema(self) -> MessageSchema {
        let mut schema = MessageSchema::new(self.id, self.name, self.size).with_repeat(self.repeat);
        if self.custom_header {
            schema.set_header(self.header);
        } else {
            for spec in self.header {
                match schema.header_field_mut(&spec.name) {
                    Some(existing) => *existing = spec,
                    None => {
                        schema.add_header_field(spec);
                    }
                }
            }
        }
        for spec in self.layout {
            schema.add_field(spec);
        }
        for publish in self.publish {
            schema.add_publish(publish);
        }
        schema
    }
}

/// Parse every message schema in `text`.
pub fn parse_schemas(text: &str, format: SchemaFormat) -> Result<Vec<MessageSchema>> {
    let file: SchemaFile = match format {
        SchemaFormat::Toml => {
            toml::from_str(text).map_err(|e| DcclError::parse("schema", e.to_string()))?
        }
        SchemaFormat::Json => {
            serde_json::from_str(text).map_err(|e| DcclError::parse("schema", e.to_string()))?
        }
    };
    if file.messages.is_empty() {
        return Err(DcclError::parse("schema", "no [[message]] entries"));
    }
    Ok(file
        .messages
        .into_iter()
        .map(MessageEntry::into_schema)
        .collect())
}

/// Read and parse a schema file; the format follows the extension.
pub fn load_schemas(path: impl AsRef<Path>) -> Result<Vec<MessageSchema>> {
    let path = path.as_ref();
    let format = SchemaFormat::from_path(path).ok_or_else(|| {
        DcclError::parse(
            "schema",
            format!("unsupported schema file extension: {}", path.display()),
        )
    })?;
    let text = std::fs::read_to_string(path)?;
    parse_schemas(&text, format)
}
