// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Codec facade.
//!
//! [`Codec`] owns the algorithm registry and every compiled schema, keyed by
//! message id and name. Schemas are added (and compiled) up front; once built
//! a `&Codec` can be shared across threads for encode and decode.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, info};

use crate::algorithm::AlgorithmRegistry;
use crate::config::CodecConfig;
use crate::core::{DcclError, Result, Value, ValueMap};
use crate::encoding::{peek_message_id, EncodeContext};
use crate::schema::{load_schemas, read_sources, CompiledSchema, MessageSchema};

/// Schema-driven encoder/decoder for a set of message types.
#[derive(Debug)]
pub struct Codec {
    config: CodecConfig,
    registry: AlgorithmRegistry,
    schemas: BTreeMap<u32, CompiledSchema>,
    names: HashMap<String, u32>,
}

impl Codec {
    /// Create a codec with no schemas.
    pub fn new(config: CodecConfig, registry: AlgorithmRegistry) -> Self {
        Self {
            config,
            registry,
            schemas: BTreeMap::new(),
            names: HashMap::new(),
        }
    }

    /// Create a codec and load every schema file the configuration names.
    pub fn from_config(config: CodecConfig) -> Result<Self> {
        let registry = if config.builtin_algorithms {
            AlgorithmRegistry::with_builtins()
        } else {
            AlgorithmRegistry::new()
        };
        let files = config.schemas.clone();
        let mut codec = Self::new(config, registry);
        for path in &files {
            codec.load_file(path)?;
        }
        Ok(codec)
    }

    /// Configuration in use.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Algorithm registry.
    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// Mutable registry access, for registration before any traffic.
    ///
    /// Schemas already added were checked against the registry as it was.
    pub fn registry_mut(&mut self) -> &mut AlgorithmRegistry {
        &mut self.registry
    }

    /// Encode context for the configured modem at the current time.
    pub fn context(&self) -> EncodeContext {
        EncodeContext::new(self.config.modem_id)
    }

    /// Compile a schema without adding it.
    pub fn validate(&self, schema: &MessageSchema) -> Result<CompiledSchema> {
        schema.compile(&self.registry)
    }

    /// Compile and add a schema. Ids and names must be unique.
    pub fn add_schema(&mut self, schema: MessageSchema) -> Result<&CompiledSchema> {
        let compiled = self.validate(&schema)?;
        if self.schemas.contains_key(&compiled.id()) {
            return Err(DcclError::invalid_schema(
                compiled.name(),
                format!("message id {} is already loaded", compiled.id()),
            ));
        }
        if self.names.contains_key(compiled.name()) {
            return Err(DcclError::invalid_schema(
                compiled.name(),
                "message name is already loaded",
            ));
        }
        let id = compiled.id();
        info!(
            message = compiled.name(),
            id = id,
            header_bits = compiled.header_bits(),
            body_bits = compiled.body_bits(),
            repeat = compiled.repeat(),
            "added message schema"
        );
        self.names.insert(compiled.name().to_string(), id);
        Ok(self.schemas.entry(id).or_insert(compiled))
    }

    /// Load every schema in a TOML or JSON file. Returns the names added.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for schema in load_schemas(path)? {
            names.push(self.add_schema(schema)?.name().to_string());
        }
        Ok(names)
    }

    /// Find a schema by name, or by id written in decimal.
    pub fn schema(&self, key: &str) -> Result<&CompiledSchema> {
        let id = match self.names.get(key) {
            Some(id) => Some(*id),
            None => key.parse::<u32>().ok(),
        };
        id.and_then(|id| self.schemas.get(&id))
            .ok_or_else(|| DcclError::unknown_message(key))
    }

    /// Find a schema by id.
    pub fn schema_by_id(&self, id: u32) -> Result<&CompiledSchema> {
        self.schemas
            .get(&id)
            .ok_or_else(|| DcclError::unknown_message(id.to_string()))
    }

    /// All schemas, by ascending id.
    pub fn schemas(&self) -> impl Iterator<Item = &CompiledSchema> {
        self.schemas.values()
    }

    /// Encode a value map.
    pub fn encode(&self, key: &str, values: &ValueMap, ctx: &EncodeContext) -> Result<Vec<u8>> {
        let schema = self.schema(key)?;
        let bytes = schema.encode(values, &self.registry, ctx)?;
        debug!(message = schema.name(), bytes = bytes.len(), "encoded message");
        Ok(bytes)
    }

    /// Encode from named source variables.
    pub fn encode_sources(
        &self,
        key: &str,
        sources: &HashMap<String, String>,
        ctx: &EncodeContext,
    ) -> Result<Vec<u8>> {
        let schema = self.schema(key)?;
        let values = read_sources(schema, sources);
        schema.encode(&values, &self.registry, ctx)
    }

    /// Schema for `bytes`, read from the standard `_id` header part.
    ///
    /// Schemas with a custom header carry no `_id` at a known offset, so a
    /// match on one is rejected; decode those with [`Codec::decode_with`].
    pub fn dispatch(&self, bytes: &[u8]) -> Result<&CompiledSchema> {
        let schema = self.schema_by_id(peek_message_id(bytes))?;
        if !schema.has_standard_id() {
            return Err(DcclError::invalid_schema(
                schema.name(),
                "custom header has no standard _id part, decode by name",
            ));
        }
        Ok(schema)
    }

    /// Decode, choosing the schema from the `_id` header part.
    ///
    /// Only schemas with the standard header can be chosen this way; see
    /// [`Codec::dispatch`].
    pub fn decode(&self, bytes: &[u8], ctx: &EncodeContext) -> Result<ValueMap> {
        let schema = self.dispatch(bytes)?;
        debug!(message = schema.name(), bytes = bytes.len(), "decoding message");
        Ok(schema.decode(bytes, ctx))
    }

    /// Decode with an explicit schema.
    pub fn decode_with(&self, key: &str, bytes: &[u8], ctx: &EncodeContext) -> Result<ValueMap> {
        Ok(self.schema(key)?.decode(bytes, ctx))
    }

    /// Decode with an explicit schema, rejecting input shorter than its header.
    pub fn decode_checked(&self, key: &str, bytes: &[u8], ctx: &EncodeContext) -> Result<ValueMap> {
        self.schema(key)?.decode_checked(bytes, ctx)
    }

    /// Smallest and largest encoded size in bytes.
    pub fn size_bounds(&self, key: &str) -> Result<(usize, usize)> {
        Ok(self.schema(key)?.size_bounds())
    }

    /// Human-readable schema dump.
    pub fn describe(&self, key: &str) -> Result<String> {
        Ok(self.schema(key)?.describe())
    }

    /// Run every publish rule of a schema over decoded values.
    pub fn publish(&self, key: &str, values: &ValueMap) -> Result<Vec<(String, Value)>> {
        let schema = self.schema(key)?;
        Ok(schema
            .publish_rules()
            .iter()
            .flat_map(|rule| {
                rule.evaluate_with_precision(
                    values,
                    schema.repeat(),
                    &self.registry,
                    self.config.publish_precision,
                )
            })
            .collect())
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CodecConfig::default(), AlgorithmRegistry::with_builtins())
    }
}
