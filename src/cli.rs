// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chromux",
    about = "A relay that fans one Chrome DevTools Protocol connection out to HTTP and MCP clients",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay: HTTP API plus the MCP protocol on stdin/stdout
    Serve {
        /// Port for the HTTP API (overrides config)
        #[arg(long, env = "CDP_PORT")]
        port: Option<u16>,
    },
    /// Send one CDP command to a running relay and print the result
    Call {
        /// JSON payload, e.g. '{"method": "Runtime.evaluate", "params": {"expression": "1+1"}}'
        payload: Option<String>,

        /// Base URL of the relay's HTTP API
        #[arg(long, env = "CDP_API", default_value = "http://localhost:2229")]
        api: String,
    },
    /// Print the effective configuration and exit
    ShowConfig,
}
