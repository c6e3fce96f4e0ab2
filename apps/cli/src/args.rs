//! # CLI Argument Definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vexil")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Inspect and edit experimental flag selections")]
pub struct Cli {
    /// Configuration file (without extension for format auto-detection)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Registry document listing the flag definitions
    #[arg(long, short, global = true, default_value = "flags/registry.json")]
    pub registry: PathBuf,

    /// Act as the device owner (system-wide store)
    #[arg(long, global = true)]
    pub owner: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List visible flags with their current state
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
        /// Include flags not supported on this platform
        #[arg(long)]
        all: bool,
    },
    /// Enable a flag, or select an option given as `name@index`
    Enable { name: String },
    /// Disable a flag, or clear an option given as `name@index`
    Disable { name: String },
    /// Select option `index` of a multi-option flag
    Choose { name: String, index: usize },
    /// Store the value of a string flag
    SetString { name: String, value: String },
    /// Store the origin list of an origin-list flag
    SetOrigins { name: String, value: String },
    /// Clear every stored selection
    Reset {},
    /// Drop selections of long-expired flags and orphaned values
    Prune {},
    /// Print the command line the selection produces
    Switches {
        /// Do not wrap injected switches with sentinels
        #[arg(long)]
        no_sentinels: bool,
        /// Existing command line to merge into
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Report applied flags as histogram samples
    Report {},
}
