// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # DCCL CLI
//!
//! Command-line tool for checking schema files and encoding or decoding
//! messages by hand.
//!
//! ## Usage
//!
//! ```sh
//! # Check a schema file
//! dccl schema validate nav.toml
//!
//! # Field layout and sizes
//! dccl schema show nav.toml --message NAV
//! dccl schema size nav.toml
//!
//! # Encode and decode
//! dccl encode nav.toml --message NAV --value depth=12.5 --value mode=survey
//! dccl decode nav.toml 20028c... --publish
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use cmd::{DecodeCmd, EncodeCmd, SchemaCmd};
use common::Result;
use tracing_subscriber::EnvFilter;

/// DCCL - compact message codec for acoustic links
#[derive(Parser, Clone)]
#[command(name = "dccl")]
#[command(about = "Schema-driven bit-packed message codec", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Codec configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Schema operations (validate, show, size)
    #[command(subcommand)]
    Schema(SchemaCmd),

    /// Encode a message from NAME=VALUE source variables
    Encode(EncodeCmd),

    /// Decode a hex message
    Decode(DecodeCmd),
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Schema(cmd) => cmd.run(config),
        Commands::Encode(cmd) => cmd.run(config),
        Commands::Decode(cmd) => cmd.run(config),
    }
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
