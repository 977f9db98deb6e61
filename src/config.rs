//! Host configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::cli::{Args, SubCommand};
use crate::output::OutputFormat;

/// What `load` does when the script is already loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoubleLoadPolicy {
    /// Refuse with `AlreadyLoaded`
    #[default]
    Reject,
    /// Unload the running instance first (its unload hooks run)
    Reload,
}

/// Settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub scripts_dir: PathBuf,
    pub entry_point: String,
    pub double_load: DoubleLoadPolicy,
    /// Time between scheduler ticks in `luna run`
    pub tick_interval: Duration,
    pub max_ticks: Option<u64>,
    pub output_format: OutputFormat,
    pub verbose: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            entry_point: "main.lua".to_string(),
            double_load: DoubleLoadPolicy::Reject,
            tick_interval: Duration::from_millis(50),
            max_ticks: None,
            output_format: OutputFormat::Human,
            verbose: false,
        }
    }
}

impl HostConfig {
    pub fn from_args(args: &Args) -> Self {
        let mut config = Self {
            scripts_dir: args.scripts_dir.clone(),
            entry_point: args.entry_point.clone(),
            double_load: args.on_double_load,
            output_format: if args.json { OutputFormat::Json } else { OutputFormat::Human },
            verbose: args.verbose,
            ..Self::default()
        };

        if let SubCommand::Run { interval_ms, ticks, .. } = &args.command {
            config.tick_interval = Duration::from_millis(*interval_ms);
            config.max_ticks = *ticks;
        }
        config
    }
}
