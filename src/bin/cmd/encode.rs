// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Encode command - pack source variables into a message.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use crate::common::{context, open_codec, parse_assignments, Result};

/// Encode a message and print it as hex.
#[derive(Args, Clone, Debug)]
pub struct EncodeCmd {
    /// Schema file (TOML or JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Message name or id
    #[arg(short, long)]
    message: String,

    /// Source variable as NAME=VALUE (repeatable). A field reads the
    /// variable named after it unless its schema binds another one.
    #[arg(short, long = "value", value_name = "NAME=VALUE")]
    values: Vec<String>,

    /// Source modem id (defaults to the configured one)
    #[arg(long)]
    modem_id: Option<u32>,

    /// Encode time as Unix seconds or RFC 3339 (defaults to now)
    #[arg(long)]
    time: Option<String>,
}

impl EncodeCmd {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let codec = open_codec(config, &self.input)?;
        let sources = parse_assignments(&self.values)?;
        let ctx = context(&codec, self.modem_id, self.time.as_deref())?;

        debug!(message = %self.message, sources = sources.len(), "encoding from CLI");
        let bytes = codec.encode_sources(&self.message, &sources, &ctx)?;
        println!("{}", hex::encode(bytes));
        Ok(())
    }
}
