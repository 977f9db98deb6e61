//! Luna CLI - host and hot-reload sandboxed Lua scripts

use clap::Parser;
use env_logger::{Builder, Env};
use luna::cli::{Args, SubCommand};
use luna::host::{BundleSource, DirectoryBundles};
use luna::output::{format_output, Report, VariableReport};
use luna::{Driver, HostConfig, LunaError, ScriptOutcome};

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// RUST_LOG takes precedence; otherwise `--log-level`, then `--verbose`.
fn init_logging(args: &Args) {
    let default = if args.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default));
    if std::env::var_os("RUST_LOG").is_none() {
        if let Some(level) = args.log_level {
            builder.filter_level(level);
        }
    }
    builder.format_timestamp(None).init();
}

fn run(args: Args) -> luna::Result<()> {
    let config = HostConfig::from_args(&args);

    match args.command {
        SubCommand::Run { bundles, .. } => {
            let mut driver = Driver::new(&config)?;
            let outcomes = if bundles.is_empty() {
                driver.registry_mut().load_all()?
            } else {
                bundles
                    .iter()
                    .map(|name| ScriptOutcome::from_result(name, &driver.registry_mut().load_bundle(name)))
                    .collect()
            };
            println!("{}", format_output(&Report::Outcomes(outcomes), &config.output_format));

            let unloaded = driver.run(config.tick_interval, config.max_ticks)?;
            if config.verbose {
                println!("{}", format_output(&Report::Outcomes(unloaded), &config.output_format));
            }
            Ok(())
        }

        SubCommand::List => {
            let bundles = DirectoryBundles::new(&config.scripts_dir, config.entry_point.clone());
            let report = Report::Bundles {
                root: bundles.location(),
                names: bundles.list_bundles()?,
            };
            println!("{}", format_output(&report, &config.output_format));
            Ok(())
        }

        SubCommand::Get { script, path, ticks } => {
            let mut driver = Driver::new(&config)?;
            driver.registry_mut().load_all()?;
            if !driver.registry().is_loaded(&script) {
                return Err(LunaError::NotFound(script));
            }

            driver.run_ticks(ticks);
            let report = VariableReport::read(driver.registry(), &script, &path);
            println!("{}", format_output(&Report::Variable(report), &config.output_format));
            driver.shutdown();
            Ok(())
        }

        SubCommand::Call { command, args: call_args, ticks } => {
            let mut driver = Driver::new(&config)?;
            driver.registry_mut().load_all()?;

            let output = driver.registry().dispatch_command(&command, &call_args)?;
            driver.run_ticks(ticks);
            println!("{}", format_output(&Report::Message(output), &config.output_format));
            driver.shutdown();
            Ok(())
        }

        SubCommand::Repl => {
            let mut driver = Driver::new(&config)?;
            if config.scripts_dir.is_dir() {
                let outcomes = driver.registry_mut().load_all()?;
                println!("{}", format_output(&Report::Outcomes(outcomes), &config.output_format));
            }
            luna::repl::run_repl(&mut driver)
        }
    }
}
