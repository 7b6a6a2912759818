// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// conduit — local HTTP reverse proxy for OpenAI-compatible LLM agents.
#[derive(Parser, Debug)]
#[command(name = "conduit", version, about)]
pub struct Cli {
    /// Path to the gateway config file (YAML). Falls back to
    /// `CONDUIT_CONFIG`, then `./conduit.yaml`, then built-in defaults.
    #[arg(long, short = 'c', global = true, env = "CONDUIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the fully resolved configuration (defaults applied) and exit.
    ShowConfig,
}
