// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema command - validate and inspect message schema files.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

use crate::common::{build_codec, open_codec, Result};

/// Schema operations.
#[derive(Subcommand, Clone, Debug)]
pub enum SchemaCmd {
    /// Check that every message in a schema file compiles
    Validate {
        /// Schema file (TOML or JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the field layout of each message
    Show {
        /// Schema file (TOML or JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only show this message (name or id)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the smallest and largest encoded size of each message
    Size {
        /// Schema file (TOML or JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

impl SchemaCmd {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        match self {
            SchemaCmd::Validate { input, json } => cmd_validate(config, input, json),
            SchemaCmd::Show { input, message } => cmd_show(config, input, message),
            SchemaCmd::Size { input, json } => cmd_size(config, input, json),
        }
    }
}

fn cmd_validate(config: Option<&Path>, input: PathBuf, json: bool) -> Result<()> {
    let schemas = dccl::schema::load_schemas(&input)?;
    let mut codec = build_codec(config)?;

    let mut results: Vec<ValidationResult> = Vec::new();
    let mut err_count = 0;

    for schema in schemas {
        let result = match codec.add_schema(schema.clone()) {
            Ok(compiled) => ValidationResult {
                message: compiled.name().to_string(),
                id: compiled.id(),
                status: "ok".to_string(),
                error: String::new(),
            },
            Err(e) => {
                err_count += 1;
                ValidationResult {
                    message: schema.name.clone(),
                    id: schema.id,
                    status: "error".to_string(),
                    error: e.to_string(),
                }
            }
        };
        results.push(result);
    }

    output_json_or(json, &results, || {
        println!("=== Validating {} ===", input.display());
        println!();
        for result in &results {
            match result.status.as_str() {
                "ok" => println!("  ✓ {} (id {})", result.message, result.id),
                _ => println!("  ✗ {} (id {}): {}", result.message, result.id, result.error),
            }
        }
        println!();
        println!(
            "{} valid, {} invalid",
            results.len() - err_count,
            err_count
        );
        Ok(())
    })?;

    if err_count > 0 {
        anyhow::bail!("{err_count} message schema(s) failed validation");
    }
    Ok(())
}

fn cmd_show(config: Option<&Path>, input: PathBuf, message: Option<String>) -> Result<()> {
    let codec = open_codec(config, &input)?;
    match message {
        Some(key) => print!("{}", codec.describe(&key)?),
        None => {
            for schema in codec.schemas() {
                print!("{}", schema.describe());
                println!();
            }
        }
    }
    Ok(())
}

fn cmd_size(config: Option<&Path>, input: PathBuf, json: bool) -> Result<()> {
    let codec = open_codec(config, &input)?;

    let sizes: Vec<SizeInfo> = codec
        .schemas()
        .map(|schema| {
            let (min_bytes, max_bytes) = schema.size_bounds();
            SizeInfo {
                message: schema.name().to_string(),
                id: schema.id(),
                limit_bytes: schema.size(),
                repeat: schema.repeat(),
                header_bits: schema.header_bits(),
                body_bits: schema.body_bits(),
                min_bytes,
                max_bytes,
            }
        })
        .collect();

    output_json_or(json, &sizes, || {
        println!(
            "{:<24} {:>5} {:>6} {:>6} {:>6} {:>6}",
            "MESSAGE", "ID", "REPEAT", "MIN", "MAX", "LIMIT"
        );
        for s in &sizes {
            println!(
                "{:<24} {:>5} {:>6} {:>6} {:>6} {:>6}",
                s.message, s.id, s.repeat, s.min_bytes, s.max_bytes, s.limit_bytes
            );
        }
        Ok(())
    })
}

/// Output data as JSON or human-readable format.
pub(crate) fn output_json_or<T>(
    json: bool,
    value: &T,
    human_fn: impl FnOnce() -> std::io::Result<()>,
) -> Result<()>
where
    T: Serialize,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human_fn()?;
    }
    Ok(())
}

// Output types

#[derive(Serialize)]
struct ValidationResult {
    message: String,
    id: u32,
    status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    error: String,
}

#[derive(Serialize)]
struct SizeInfo {
    message: String,
    id: u32,
    limit_bytes: usize,
    repeat: usize,
    header_bits: usize,
    body_bits: usize,
    min_bytes: usize,
    max_bytes: usize,
}
