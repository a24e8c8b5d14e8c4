//! CLI argument parsing for ruql
//!
//! Supports global flags: --bundle, --config, --format, --quiet, --verbose

pub mod commands;
pub mod parse;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use ruql_core::format::OutputFormat;
use ruql_core::resolve::ViewMode;

use parse::{parse_context_pair, parse_format, parse_view_mode, ContextPair};

/// Ruql - qualifier-driven resource resolution inspector
#[derive(Parser, Debug)]
#[command(name = "ruql")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Resource bundle to load (JSON)
    #[arg(long, short, global = true)]
    pub bundle: Option<PathBuf>,

    /// Engine configuration file (TOML); defaults are used when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_parser = parse_format, default_value = "human")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Report timing and engine detail
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List resources with candidate counts
    List {
        /// Context assignments applied before listing
        #[arg(long, short = 'c', value_parser = parse_context_pair, action = clap::ArgAction::Append)]
        context: Vec<ContextPair>,
    },

    /// Resolve one resource under a context
    Resolve {
        /// Resource id to resolve
        id: String,

        /// Context assignments (qualifier=value, repeatable)
        #[arg(long, short = 'c', value_parser = parse_context_pair, action = clap::ArgAction::Append)]
        context: Vec<ContextPair>,

        /// How much of the candidate set to surface
        #[arg(long, value_parser = parse_view_mode, default_value = "composed")]
        view: ViewMode,
    },

    /// Filter the collection against a partial context
    Filter {
        /// Context assignments (qualifier=value, repeatable)
        #[arg(long, short = 'c', value_parser = parse_context_pair, action = clap::ArgAction::Append)]
        context: Vec<ContextPair>,

        /// Drop conditions the context guarantees from surviving candidates
        #[arg(long)]
        reduce: bool,

        /// Treat unset qualifiers as mismatches instead of unknowns
        #[arg(long)]
        strict: bool,
    },

    /// Show the folder tree implied by resource ids
    Tree,
}
