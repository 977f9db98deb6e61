//! REPL module for interactive mode
//!
//! Line parsing and execution live here so they work without the `repl`
//! feature; the rustyline front end is in [`interactive`].

#[cfg(feature = "repl")]
pub mod interactive;

#[cfg(feature = "repl")]
pub use interactive::run_repl;

use crate::driver::Driver;
use crate::error::{LunaError, Result};
use crate::output::{Report, VariableReport};

pub const HELP: &str = "\
Commands:
  list                      Loaded scripts
  bundles                   Bundles in the scripts directory
  commands                  Commands registered by scripts
  load <name>               Load a bundle
  load-all                  Load every bundle
  unload <name>             Unload a script
  reload <name>             Reload a script from its origin
  get <script> <path>       Read a variable, e.g. `get greet state.count`
  tick [n]                  Advance the scheduler n ticks (default 1)
  call <command> [args...]  Invoke a script command
  help                      Show this help
  exit                      Leave the console";

/// One console instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    List,
    Bundles,
    Commands,
    Load(String),
    LoadAll,
    Unload(String),
    Reload(String),
    Get { script: String, path: String },
    Tick(u64),
    Call { command: String, args: Vec<String> },
}

/// Parse a console line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<String> = words.map(str::to_string).collect();

    let one = |what: &str| -> Result<String> {
        match rest.as_slice() {
            [name] => Ok(name.clone()),
            _ => Err(usage(what)),
        }
    };

    let command = match head.to_lowercase().as_str() {
        "help" | "?" => ReplCommand::Help,
        "exit" | "quit" | "q" => ReplCommand::Exit,
        "list" | "ls" => ReplCommand::List,
        "bundles" => ReplCommand::Bundles,
        "commands" => ReplCommand::Commands,
        "load" => ReplCommand::Load(one("load <name>")?),
        "load-all" => ReplCommand::LoadAll,
        "unload" => ReplCommand::Unload(one("unload <name>")?),
        "reload" => ReplCommand::Reload(one("reload <name>")?),
        "get" => match rest.as_slice() {
            [script, path] => ReplCommand::Get {
                script: script.clone(),
                path: path.clone(),
            },
            _ => return Err(usage("get <script> <path>")),
        },
        "tick" => match rest.as_slice() {
            [] => ReplCommand::Tick(1),
            [n] => ReplCommand::Tick(n.parse().map_err(|_| usage("tick [n]"))?),
            _ => return Err(usage("tick [n]")),
        },
        "call" => match rest.split_first() {
            Some((command, args)) => ReplCommand::Call {
                command: command.clone(),
                args: args.to_vec(),
            },
            None => return Err(usage("call <command> [args...]")),
        },
        other => {
            return Err(LunaError::Host(format!(
                "Unknown console command '{}' (try 'help')",
                other
            )))
        }
    };
    Ok(Some(command))
}

fn usage(form: &str) -> LunaError {
    LunaError::Host(format!("usage: {}", form))
}

/// Run one console instruction against `driver`.
pub fn execute(driver: &mut Driver, command: ReplCommand) -> Result<Report> {
    let report = match command {
        ReplCommand::Help => Report::Message(HELP.to_string()),
        ReplCommand::Exit => Report::Message("Goodbye!".to_string()),
        ReplCommand::List => Report::Scripts(driver.registry().summaries()),
        ReplCommand::Bundles => Report::Bundles {
            root: driver.registry().bundles().location(),
            names: driver.registry().bundles().list_bundles()?,
        },
        ReplCommand::Commands => Report::Commands(driver.registry().commands().list()),
        ReplCommand::Load(name) => {
            driver.registry_mut().load_bundle(&name)?;
            Report::Message(format!("Loaded '{}'", name))
        }
        ReplCommand::LoadAll => Report::Outcomes(driver.registry_mut().load_all()?),
        ReplCommand::Unload(name) => {
            driver.registry_mut().unload(&name)?;
            Report::Message(format!("Unloaded '{}'", name))
        }
        ReplCommand::Reload(name) => {
            driver.registry_mut().reload(&name)?;
            Report::Message(format!("Reloaded '{}'", name))
        }
        ReplCommand::Get { script, path } => {
            if !driver.registry().is_loaded(&script) {
                return Err(LunaError::NotFound(script));
            }
            Report::Variable(VariableReport::read(driver.registry(), &script, &path))
        }
        ReplCommand::Tick(n) => {
            let fired = driver.run_ticks(n);
            Report::Message(format!("{} tick(s), {} task(s) fired", n, fired))
        }
        ReplCommand::Call { command, args } => {
            Report::Message(driver.registry().dispatch_command(&command, &args)?)
        }
    };
    Ok(report)
}

#[cfg(not(feature = "repl"))]
pub fn run_repl(_driver: &mut Driver) -> Result<()> {
    Err(LunaError::Host(
        "REPL not enabled. Rebuild with --features repl".to_string(),
    ))
}
