//! Host command registry
//!
//! Scripts declare commands through `script:register_command`. Once a script
//! is loaded the registry publishes them here, and withdraws them on unload.

use std::collections::BTreeMap;

use mlua::Function;
use serde::Serialize;

use crate::error::{LunaError, Result};

/// A command declared by a script
#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub handler: Function,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The host side of command registration
pub trait CommandRegistry {
    /// Publish a command on behalf of `owner`.
    fn register(&mut self, owner: &str, command: &CommandDescriptor) -> Result<()>;

    /// Withdraw a command. Returns false if it was not registered.
    fn unregister(&mut self, name: &str) -> bool;

    /// Push pending changes to whatever presents commands to users.
    fn sync(&mut self);

    /// Everything currently published, sorted by name
    fn list(&self) -> Vec<CommandEntry>;

    /// Script that owns the published command `name`
    fn owner(&self, name: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.owner)
    }
}

/// Published command as the host sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEntry {
    pub name: String,
    pub owner: String,
    pub description: Option<String>,
}

/// In-memory command registry used by the CLI
#[derive(Debug, Default)]
pub struct CommandTable {
    entries: BTreeMap<String, CommandEntry>,
    dirty: bool,
    syncs: usize,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of syncs that actually pushed changes
    pub fn syncs(&self) -> usize {
        self.syncs
    }
}

impl CommandRegistry for CommandTable {
    fn register(&mut self, owner: &str, command: &CommandDescriptor) -> Result<()> {
        if let Some(existing) = self.entries.get(&command.name) {
            if existing.owner != owner {
                return Err(LunaError::Command(format!(
                    "'{}' is already registered by script '{}'",
                    command.name, existing.owner
                )));
            }
        }

        let entry = CommandEntry {
            name: command.name.clone(),
            owner: owner.to_string(),
            description: command.description.clone(),
        };
        if self.entries.get(&entry.name) != Some(&entry) {
            self.entries.insert(entry.name.clone(), entry);
            self.dirty = true;
        }
        Ok(())
    }

    fn unregister(&mut self, name: &str) -> bool {
        let removed = self.entries.remove(name).is_some();
        self.dirty |= removed;
        removed
    }

    fn sync(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.syncs += 1;
        log::debug!("Command table synced ({} commands)", self.entries.len());
    }

    fn list(&self) -> Vec<CommandEntry> {
        self.entries.values().cloned().collect()
    }

    fn owner(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(|entry| entry.owner.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn descriptor(lua: &Lua, name: &str) -> CommandDescriptor {
        CommandDescriptor {
            name: name.to_string(),
            description: Some("test command".to_string()),
            handler: lua.create_function(|_, ()| Ok(())).unwrap(),
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let lua = Lua::new();
        let mut table = CommandTable::new();

        table.register("greet", &descriptor(&lua, "hello")).unwrap();
        assert_eq!(table.get("hello").unwrap().owner, "greet");
        assert!(table.unregister("hello"));
        assert!(!table.unregister("hello"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_conflicting_owner_rejected() {
        let lua = Lua::new();
        let mut table = CommandTable::new();

        table.register("a", &descriptor(&lua, "shared")).unwrap();
        assert!(table.register("b", &descriptor(&lua, "shared")).is_err());
        // Same owner may re-register
        table.register("a", &descriptor(&lua, "shared")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.owner("shared").as_deref(), Some("a"));
        assert_eq!(table.owner("missing"), None);
    }

    #[test]
    fn test_sync_only_counts_changes() {
        let lua = Lua::new();
        let mut table = CommandTable::new();

        table.sync();
        assert_eq!(table.syncs(), 0);
        table.register("a", &descriptor(&lua, "one")).unwrap();
        table.sync();
        table.sync();
        // Publishing the same command again is not a change
        table.register("a", &descriptor(&lua, "one")).unwrap();
        table.sync();
        assert_eq!(table.syncs(), 1);
        assert_eq!(table.list().len(), 1);
    }
}
