//! Per-script sandboxes
//!
//! Each loaded script gets its own globals table layered over the shared
//! objects and the frozen shared environment, plus a handful of per-script
//! globals: `script`, `logger`, `scheduler`, `print` and `import`.

mod control;
mod factory;
mod logger;
mod types;

pub use control::ScriptControl;
pub use factory::SandboxFactory;
pub use logger::{display_value, join_values, ScriptLogger};
pub use types::{ScriptEnvironment, ScriptOrigin};
