// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::events::DedupBy;
use crate::events::format::DEFAULT_MAX_SEEN;
use crate::output::OutputFormat;
use crate::versions::DEFAULT_VERSION_TIMEOUT;

#[derive(Parser, Debug)]
#[command(name = "k8sevents")]
#[command(author, version, about = "Watch Kubernetes events in your terminal")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Only show events whose name, namespace, message or type match this regex
    #[arg(short, long, value_name = "PATTERN")]
    pub filter: Option<String>,

    /// Only show Warning events
    #[arg(short, long)]
    pub warnings: bool,

    /// Only show Normal events
    #[arg(short, long)]
    pub normal: bool,

    /// Kubernetes context to watch (skips the interactive picker).
    /// Accepts a short name, a full kubeconfig name or a glob matching one context.
    #[arg(short, long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Truncate long messages instead of wrapping them
    #[arg(long)]
    pub single_line: bool,

    /// Key used to drop repeated events
    #[arg(long, value_enum, default_value = "time-name")]
    pub dedup_by: DedupBy,

    /// Most event keys remembered for dedup
    #[arg(long, default_value_t = DEFAULT_MAX_SEEN)]
    pub max_seen: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the API server version of each context, grouped by environment
    Versions {
        /// Environment mapping file (default: ~/.k8sevents/environments.json)
        #[arg(short, long, value_name = "FILE")]
        environments: Option<PathBuf>,

        /// Per-context query timeout in seconds
        #[arg(short, long, default_value_t = DEFAULT_VERSION_TIMEOUT.as_secs())]
        timeout: u64,
    },
}
