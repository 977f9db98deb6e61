//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DoubleLoadPolicy;

#[derive(Parser)]
#[command(name = "luna")]
#[command(author, version, about = "Host and hot-reload sandboxed Lua scripts", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Directory containing script bundles
    #[arg(long, global = true, env = "LUNA_SCRIPTS_DIR", default_value = "scripts")]
    pub scripts_dir: PathBuf,

    /// Entry point file inside each bundle
    #[arg(long, global = true, env = "LUNA_ENTRY_POINT", default_value = "main.lua")]
    pub entry_point: String,

    /// What loading an already-loaded script does
    #[arg(long, global = true, value_enum, env = "LUNA_DOUBLE_LOAD", default_value = "reject")]
    pub on_double_load: DoubleLoadPolicy,

    /// Log level (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, global = true)]
    pub log_level: Option<log::LevelFilter>,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Load bundles and keep ticking the scheduler until Ctrl+C
    Run {
        /// Bundles to load (default: every bundle in the scripts directory)
        bundles: Vec<String>,

        /// Milliseconds between scheduler ticks
        #[arg(long, default_value = "50")]
        interval_ms: u64,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// List bundles in the scripts directory
    List,

    /// Load every bundle, run some ticks, and print a script variable
    Get {
        /// Script name
        script: String,

        /// Dotted path, e.g. `state.count`
        path: String,

        /// Ticks to run before reading
        #[arg(long, default_value = "0")]
        ticks: u64,
    },

    /// Load every bundle and invoke a script-registered command
    Call {
        /// Command name
        command: String,

        /// Arguments passed to the handler
        args: Vec<String>,

        /// Ticks to run after the command returns
        #[arg(long, default_value = "0")]
        ticks: u64,
    },

    /// Start the interactive console
    Repl,
}
