// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Codec configuration.
//!
//! ```toml
//! modem_id = 3
//! schemas = ["msgs/nav.toml", "msgs/ctd.json"]
//! builtin_algorithms = true
//! publish_precision = 3
//! ```
//!
//! Relative schema paths resolve against the configuration file's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::value::MAX_DBL_PRECISION;
use crate::core::{DcclError, Result};

fn default_true() -> bool {
    true
}

fn default_publish_precision() -> i32 {
    MAX_DBL_PRECISION
}

/// Configuration for a [`Codec`](crate::Codec).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Local modem id, the default `_src_id`
    #[serde(default)]
    pub modem_id: u32,
    /// Schema files loaded at start-up
    #[serde(default)]
    pub schemas: Vec<PathBuf>,
    /// Start from the built-in algorithms (an empty registry otherwise)
    #[serde(default = "default_true")]
    pub builtin_algorithms: bool,
    /// Precision carried by doubles produced by publish rules
    #[serde(default = "default_publish_precision")]
    pub publish_precision: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            modem_id: 0,
            schemas: Vec::new(),
            builtin_algorithms: true,
            publish_precision: MAX_DBL_PRECISION,
        }
    }
}

impl CodecConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local modem id.
    pub fn modem_id(mut self, modem_id: u32) -> Self {
        self.modem_id = modem_id;
        self
    }

    /// Add a schema file.
    pub fn schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.schemas.push(path.into());
        self
    }

    /// Choose whether built-in algorithms are registered.
    pub fn builtin_algorithms(mut self, enabled: bool) -> Self {
        self.builtin_algorithms = enabled;
        self
    }

    /// Set the precision of published doubles.
    pub fn publish_precision(mut self, precision: i32) -> Self {
        self.publish_precision = precision;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DcclError::parse("config", e.to_string()))
    }

    /// Load a TOML file, resolving schema paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = path.parent() {
            for schema in &mut config.schemas {
                if schema.is_relative() {
                    *schema = dir.join(&*schema);
                }
            }
        }
        Ok(config)
    }
}
