//! Host-injected bindings for the shared environment

use mlua::{Lua, Table, Value};

type BindingFactory = Box<dyn Fn(&Lua) -> mlua::Result<Value>>;

/// Named values the host exposes to every script.
///
/// Each binding is produced by a factory so the host does not need a `Lua`
/// handle before the registry creates one. Bindings are frozen together with
/// the rest of the shared environment.
#[derive(Default)]
pub struct HostBindings {
    entries: Vec<(String, BindingFactory)>,
}

impl HostBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding. A later binding with the same name replaces an earlier one.
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Lua) -> mlua::Result<Value> + 'static,
    {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, Box::new(factory)));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn install(&self, lua: &Lua, target: &Table) -> mlua::Result<()> {
        for (name, factory) in &self.entries {
            target.raw_set(name.as_str(), factory(lua)?)?;
        }
        Ok(())
    }
}

/// Default `host` binding used by the CLI: identifies the embedding process.
pub fn default_bindings() -> HostBindings {
    HostBindings::new().with("host", |lua| {
        let host = lua.create_table()?;
        host.set("name", "luna")?;
        host.set("version", env!("CARGO_PKG_VERSION"))?;
        host.set("lua", "5.4")?;
        Ok(Value::Table(host))
    })
}
