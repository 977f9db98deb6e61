//! Luna - a host for sandboxed, hot-reloadable Lua scripts
//!
//! Every script runs in its own globals table layered over a frozen shared
//! environment. Scripts can be loaded, reloaded and unloaded at runtime; an
//! unload releases everything the script acquired (scheduled tasks, shared
//! objects, commands, hooks).
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use luna::{ScriptRegistry, TickRunner};
//!
//! let runner = Rc::new(TickRunner::new());
//! let mut registry = ScriptRegistry::builder().build(runner.clone()).unwrap();
//! registry.load("count = 0 scheduler:run(function() count = count + 1 end)", "counter").unwrap();
//! runner.tick();
//! println!("{:?}", registry.get_variable("counter", "count"));
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod driver;
pub mod environment;
pub mod error;
pub mod host;
pub mod introspect;
pub mod output;
pub mod registry;
pub mod repl;
pub mod sandbox;
pub mod scheduler;

pub use config::{DoubleLoadPolicy, HostConfig};
pub use driver::Driver;
pub use error::{LunaError, Result};
pub use introspect::get_variable;
pub use output::{format_output, OutputFormat};
pub use registry::{ScriptOutcome, ScriptRegistry, ScriptState};
pub use sandbox::{ScriptEnvironment, ScriptOrigin};
pub use scheduler::{Lane, ScheduleMode, Scheduler, TaskId, TaskRunner, TickRunner};
