//! Script registry: the single owner of every loaded script
//!
//! Lifecycle per script: `Unloaded → Loading → Loaded → Unloading → Unloaded`.

mod lifecycle;
mod manager;

pub use lifecycle::validate_name;
pub use manager::{RegistryBuilder, ScriptRegistry};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Where a script is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptState::Unloaded => "unloaded",
            ScriptState::Loading => "loading",
            ScriptState::Loaded => "loaded",
            ScriptState::Unloading => "unloading",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of a loaded script for listings
#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    pub name: String,
    pub state: ScriptState,
    /// Bundle folder, or `None` for inline source
    pub folder: Option<String>,
    pub loaded_at: DateTime<Utc>,
    pub tasks: usize,
    pub commands: Vec<String>,
}

/// Result of one script in a bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptOutcome {
    pub script: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ScriptOutcome {
    pub fn from_result(script: &str, result: &Result<()>) -> Self {
        Self {
            script: script.to_string(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}
