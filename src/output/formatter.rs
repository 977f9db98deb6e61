//! Output formatting

use serde::Serialize;

use crate::host::CommandEntry;
use crate::output::human::format_human;
use crate::output::json::{format_json, lua_to_json};
use crate::registry::{ScriptOutcome, ScriptRegistry, ScriptSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// A variable read through introspection, already converted for display
#[derive(Debug, Clone, Serialize)]
pub struct VariableReport {
    pub script: String,
    pub path: String,
    /// `None` when the path does not resolve
    pub value: Option<serde_json::Value>,
}

impl VariableReport {
    /// Read `path` from a loaded script.
    pub fn read(registry: &ScriptRegistry, script: &str, path: &str) -> Self {
        Self {
            script: script.to_string(),
            path: path.to_string(),
            value: registry
                .get_variable(script, path)
                .map(|v| lua_to_json(registry.lua(), &v)),
        }
    }
}

/// Everything the CLI and console print
#[derive(Debug, Clone)]
pub enum Report {
    Outcomes(Vec<ScriptOutcome>),
    Bundles { root: String, names: Vec<String> },
    Scripts(Vec<ScriptSummary>),
    Commands(Vec<CommandEntry>),
    Variable(VariableReport),
    Message(String),
}

pub fn format_output(report: &Report, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report),
        OutputFormat::Json => format_json(report),
    }
}
