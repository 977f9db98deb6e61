//! Per-script environment

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mlua::{Table, Value};

use super::{ScriptControl, ScriptLogger};
use crate::environment::{SharedEnvironment, SharedObjects};

/// Where a script's source came from; reload goes back to the same place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Bundle directory; reload re-reads the entry point from disk
    Bundle(PathBuf),
    /// Source handed over directly; reload reuses it
    Inline(String),
}

impl ScriptOrigin {
    pub fn folder(&self) -> Option<&Path> {
        match self {
            ScriptOrigin::Bundle(folder) => Some(folder),
            ScriptOrigin::Inline(_) => None,
        }
    }
}

/// An isolated namespace for one loaded script.
///
/// Own globals sit on top of the shared objects, which sit on top of the
/// frozen shared environment. Writes from the script always land in its own
/// globals.
pub struct ScriptEnvironment {
    /// Unique name for this script
    pub name: String,
    pub origin: ScriptOrigin,
    /// When the sandbox was created
    pub loaded_at: DateTime<Utc>,
    globals: Table,
    logger: ScriptLogger,
    control: ScriptControl,
    objects: SharedObjects,
    shared: SharedEnvironment,
}

impl ScriptEnvironment {
    pub(crate) fn new(
        name: &str,
        origin: ScriptOrigin,
        globals: Table,
        logger: ScriptLogger,
        control: ScriptControl,
        objects: SharedObjects,
        shared: SharedEnvironment,
    ) -> Self {
        Self {
            name: name.to_string(),
            origin,
            loaded_at: Utc::now(),
            globals,
            logger,
            control,
            objects,
            shared,
        }
    }

    /// Look `key` up the way guest code would: own globals, then shared
    /// objects, then the shared environment.
    pub fn resolve(&self, key: &str) -> Value {
        if let Ok(value) = self.globals.raw_get::<Value>(key) {
            if !value.is_nil() {
                return value;
            }
        }

        let value = self.objects.get(key);
        if !value.is_nil() {
            return value;
        }

        self.shared.get(key)
    }

    /// The script's own globals table (its chunk environment)
    pub fn globals(&self) -> &Table {
        &self.globals
    }

    pub fn logger(&self) -> &ScriptLogger {
        &self.logger
    }

    pub fn control(&self) -> &ScriptControl {
        &self.control
    }

    pub fn folder(&self) -> Option<&Path> {
        self.origin.folder()
    }
}

impl std::fmt::Debug for ScriptEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEnvironment")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}
