// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decode command - unpack a hex message.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use super::schema::output_json_or;
use crate::common::{context, join_values, json_map, json_value, open_codec, parse_hex, Result};

/// Decode a hex message and print its fields.
#[derive(Args, Clone, Debug)]
pub struct DecodeCmd {
    /// Schema file (TOML or JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Encoded message as hex
    #[arg(value_name = "HEX")]
    hex: String,

    /// Decode as this message instead of reading the header id
    #[arg(short, long)]
    message: Option<String>,

    /// Also run the message's publish rules
    #[arg(short, long)]
    publish: bool,

    /// Reference time for `_time` as Unix seconds or RFC 3339 (defaults to now)
    #[arg(long)]
    time: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,
}

impl DecodeCmd {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let codec = open_codec(config, &self.input)?;
        let bytes = parse_hex(&self.hex)?;
        let ctx = context(&codec, None, self.time.as_deref())?;

        let schema = match &self.message {
            Some(key) => codec.schema(key)?,
            None => codec.dispatch(&bytes)?,
        };
        let values = schema.decode_checked(&bytes, &ctx)?;
        let published = if self.publish {
            codec.publish(schema.name(), &values)?
        } else {
            Vec::new()
        };

        let output = DecodeOutput {
            message: schema.name().to_string(),
            fields: json_map(&values),
            published: published
                .iter()
                .map(|(var, value)| PublishedValue {
                    var: var.clone(),
                    value: json_value(value),
                })
                .collect(),
        };

        output_json_or(self.json, &output, || {
            println!("message: {}", output.message);
            let sorted: BTreeMap<_, _> = values.iter().collect();
            for (name, elements) in sorted {
                println!("  {name}: {}", join_values(elements));
            }
            if !published.is_empty() {
                println!("published:");
                for (var, value) in &published {
                    println!("  {var} = {value}");
                }
            }
            Ok(())
        })
    }
}

#[derive(Serialize)]
struct DecodeOutput {
    message: String,
    fields: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    published: Vec<PublishedValue>,
}

#[derive(Serialize)]
struct PublishedValue {
    var: String,
    value: serde_json::Value,
}
