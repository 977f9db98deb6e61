//! Shared object registry: named values visible to every sandbox

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use mlua::{Lua, Table, Value};

use crate::error::{LunaError, Result};

/// Who registered a shared object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOwner {
    Host,
    Script(String),
}

impl fmt::Display for ObjectOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectOwner::Host => write!(f, "host"),
            ObjectOwner::Script(name) => write!(f, "script '{}'", name),
        }
    }
}

/// Process-lifetime name → value map, the middle tier of sandbox lookup.
///
/// Values live in a plain Lua table so the sandbox resolver can read them
/// without crossing back into Rust. Only the methods here write to it.
#[derive(Clone)]
pub struct SharedObjects {
    table: Table,
    owners: Rc<RefCell<BTreeMap<String, ObjectOwner>>>,
}

impl SharedObjects {
    pub fn new(lua: &Lua) -> Result<Self> {
        Ok(Self {
            table: lua.create_table()?,
            owners: Rc::new(RefCell::new(BTreeMap::new())),
        })
    }

    /// Register `value` under `name`.
    ///
    /// The host may replace any entry; a script may only replace its own.
    /// Registering `nil` removes the entry.
    pub fn register(&self, owner: ObjectOwner, name: &str, value: Value) -> Result<()> {
        if value.is_nil() {
            self.unregister(&owner, name)?;
            return Ok(());
        }

        let mut owners = self.owners.borrow_mut();
        if let (ObjectOwner::Script(_), Some(existing)) = (&owner, owners.get(name)) {
            if *existing != owner {
                return Err(LunaError::SharedObject(format!(
                    "'{}' is already registered by {}",
                    name, existing
                )));
            }
        }

        self.table.raw_set(name, value)?;
        log::debug!("Shared object '{}' registered by {}", name, owner);
        owners.insert(name.to_string(), owner);
        Ok(())
    }

    /// Remove `name`. Returns false if it was not registered.
    pub fn unregister(&self, owner: &ObjectOwner, name: &str) -> Result<bool> {
        let mut owners = self.owners.borrow_mut();
        let existing = match owners.get(name) {
            Some(existing) => existing.clone(),
            None => return Ok(false),
        };

        if let ObjectOwner::Script(_) = owner {
            if existing != *owner {
                return Err(LunaError::SharedObject(format!(
                    "'{}' is registered by {}",
                    name, existing
                )));
            }
        }

        self.table.raw_set(name, Value::Nil)?;
        owners.remove(name);
        Ok(true)
    }

    /// Drop every entry registered by `script`. Returns how many were removed.
    pub fn release_owned_by(&self, script: &str) -> usize {
        let mut owners = self.owners.borrow_mut();
        let owned: Vec<String> = owners
            .iter()
            .filter(|(_, owner)| matches!(owner, ObjectOwner::Script(name) if name == script))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &owned {
            if let Err(e) = self.table.raw_set(name.as_str(), Value::Nil) {
                log::warn!("Failed to clear shared object '{}': {}", name, e);
            }
            owners.remove(name);
        }
        owned.len()
    }

    pub fn get(&self, name: &str) -> Value {
        self.table.raw_get::<Value>(name).unwrap_or(Value::Nil)
    }

    pub fn owner(&self, name: &str) -> Option<ObjectOwner> {
        self.owners.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.owners.borrow().keys().cloned().collect()
    }

    pub(crate) fn table(&self) -> &Table {
        &self.table
    }
}
