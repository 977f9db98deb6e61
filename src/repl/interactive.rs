//! Interactive REPL implementation

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::{execute, parse_line, ReplCommand, HELP};
use crate::driver::Driver;
use crate::error::{LunaError, Result};
use crate::output::{format_output, OutputFormat};

pub fn run_repl(driver: &mut Driver) -> Result<()> {
    let mut rl = DefaultEditor::new().map_err(|e| LunaError::Host(e.to_string()))?;

    println!("Luna v{} - Interactive Mode", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for commands, 'exit' to quit\n");

    loop {
        let prompt = format!("luna [{}]> ", driver.registry().loaded_scripts().len());
        match rl.readline(&prompt) {
            Ok(line) => {
                let command = match parse_line(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        eprintln!("Error: {}\n", e);
                        continue;
                    }
                };
                let _ = rl.add_history_entry(line.trim());

                match command {
                    ReplCommand::Exit => {
                        println!("Goodbye!");
                        break;
                    }
                    ReplCommand::Help => {
                        println!("{}\n", HELP);
                        continue;
                    }
                    _ => {}
                }

                match execute(driver, command) {
                    Ok(report) => println!("{}\n", format_output(&report, &OutputFormat::Human)),
                    Err(e) => eprintln!("Error: {}\n", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    driver.shutdown();
    Ok(())
}
