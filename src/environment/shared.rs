//! Shared, deeply read-only base environment
//!
//! Built once when the registry starts. Library namespaces and host bindings
//! are deep-copied into a private structure, then every table of that copy
//! is wrapped in a read-only proxy. Both passes keep a visited map keyed by
//! table identity, so shared or self-referencing tables produce exactly one
//! copy and one proxy.

use std::collections::HashMap;
use std::fmt;

use mlua::{Function, Lua, Table, Value};

use crate::error::Result;
use crate::host::HostBindings;

/// Standard library namespaces copied verbatim into the shared environment
pub const STD_NAMESPACES: &[&str] = &["string", "table", "math", "utf8", "coroutine"];

/// The subset of `os` that cannot touch the process or filesystem
pub const OS_FUNCTIONS: &[&str] = &["time", "clock", "date", "difftime"];

/// Base functions exposed to scripts. `rawset` is deliberately absent: it
/// would write straight into a proxy and bypass `__newindex`.
pub const BASE_FUNCTIONS: &[&str] = &[
    "assert",
    "error",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "xpcall",
    "select",
    "tonumber",
    "tostring",
    "type",
    "rawequal",
    "rawlen",
    "rawget",
    "getmetatable",
    "setmetatable",
];

/// Raised when guest code writes to a frozen table
#[derive(Debug, Clone)]
pub struct ProtectionViolation {
    key: String,
}

impl ProtectionViolation {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ProtectionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt to modify read-only field '{}'", self.key)
    }
}

impl std::error::Error for ProtectionViolation {}

/// The immutable namespace at the bottom of every sandbox's lookup chain
#[derive(Clone)]
pub struct SharedEnvironment {
    root: Table,
}

impl SharedEnvironment {
    /// Assemble, copy and freeze the shared environment.
    pub fn build(lua: &Lua, bindings: &HostBindings) -> Result<Self> {
        let base = assemble_base(lua, bindings)?;
        let copy = deep_copy(lua, &base, &mut HashMap::new())?;
        let root = freeze(lua, &copy, &mut HashMap::new())?;
        lock_string_metatable(lua, &root)?;

        log::debug!(
            "Shared environment built ({} namespaces, {} host bindings)",
            STD_NAMESPACES.len() + 2,
            bindings.names().len()
        );
        Ok(Self { root })
    }

    /// Look up a top-level name. Never fails; missing names are `nil`.
    pub fn get(&self, key: &str) -> Value {
        self.root.get::<Value>(key).unwrap_or(Value::Nil)
    }

    pub fn contains(&self, key: &str) -> bool {
        !self.get(key).is_nil()
    }

    /// The frozen root proxy
    pub fn table(&self) -> &Table {
        &self.root
    }
}

fn assemble_base(lua: &Lua, bindings: &HostBindings) -> mlua::Result<Table> {
    let globals = lua.globals();
    let base = lua.create_table()?;

    for name in STD_NAMESPACES {
        if let Value::Table(namespace) = globals.raw_get::<Value>(*name)? {
            base.raw_set(*name, namespace)?;
        }
    }

    if let Value::Table(os) = globals.raw_get::<Value>("os")? {
        let filtered = lua.create_table()?;
        for name in OS_FUNCTIONS {
            filtered.raw_set(*name, os.raw_get::<Value>(*name)?)?;
        }
        base.raw_set("os", filtered)?;
    }

    for name in BASE_FUNCTIONS {
        base.raw_set(*name, globals.raw_get::<Value>(*name)?)?;
    }

    base.raw_set("util", util_namespace(lua)?)?;
    bindings.install(lua, &base)?;
    Ok(base)
}

/// Pure helpers implemented on the host side
fn util_namespace(lua: &Lua) -> mlua::Result<Table> {
    let util = lua.create_table()?;

    util.raw_set(
        "split",
        lua.create_function(|lua, (text, sep): (String, Option<String>)| {
            let sep = sep.unwrap_or_else(|| ",".to_string());
            let parts: Vec<String> = if sep.is_empty() {
                text.chars().map(|c| c.to_string()).collect()
            } else {
                text.split(sep.as_str()).map(str::to_string).collect()
            };
            lua.create_sequence_from(parts)
        })?,
    )?;
    util.raw_set(
        "trim",
        lua.create_function(|_, text: String| Ok(text.trim().to_string()))?,
    )?;
    util.raw_set(
        "starts_with",
        lua.create_function(|_, (text, prefix): (String, String)| Ok(text.starts_with(&prefix)))?,
    )?;
    util.raw_set(
        "ends_with",
        lua.create_function(|_, (text, suffix): (String, String)| Ok(text.ends_with(&suffix)))?,
    )?;
    util.raw_set(
        "clamp",
        lua.create_function(|_, (x, lo, hi): (f64, f64, f64)| {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(mlua::Error::RuntimeError(format!(
                    "clamp: invalid bounds [{}, {}]",
                    lo, hi
                )));
            }
            Ok(x.clamp(lo, hi))
        })?,
    )?;
    util.raw_set(
        "round",
        lua.create_function(|_, (x, digits): (f64, Option<i32>)| {
            let factor = 10f64.powi(digits.unwrap_or(0));
            Ok((x * factor).round() / factor)
        })?,
    )?;

    Ok(util)
}

fn identity(table: &Table) -> usize {
    table.to_pointer() as usize
}

fn entries(table: &Table) -> mlua::Result<Vec<(Value, Value)>> {
    table.clone().pairs::<Value, Value>().collect()
}

/// Structural copy of `source`. Functions and userdata are shared by reference.
fn deep_copy(lua: &Lua, source: &Table, visited: &mut HashMap<usize, Table>) -> mlua::Result<Table> {
    if let Some(copy) = visited.get(&identity(source)) {
        return Ok(copy.clone());
    }

    let copy = lua.create_table()?;
    visited.insert(identity(source), copy.clone());

    for (key, value) in entries(source)? {
        let value = match value {
            Value::Table(inner) => Value::Table(deep_copy(lua, &inner, visited)?),
            other => other,
        };
        copy.raw_set(key, value)?;
    }

    Ok(copy)
}

/// Replace `table` by a read-only proxy, freezing nested tables first.
///
/// `table` must be private to the builder: its table-valued fields are
/// rewritten in place to point at their proxies.
fn freeze(lua: &Lua, table: &Table, visited: &mut HashMap<usize, Table>) -> mlua::Result<Table> {
    if let Some(proxy) = visited.get(&identity(table)) {
        return Ok(proxy.clone());
    }

    let proxy = lua.create_table()?;
    visited.insert(identity(table), proxy.clone());

    for (key, value) in entries(table)? {
        if let Value::Table(inner) = value {
            let frozen = freeze(lua, &inner, visited)?;
            table.raw_set(key, frozen)?;
        }
    }

    proxy.set_metatable(Some(read_only_metatable(lua, table)?));
    Ok(proxy)
}

fn read_only_metatable(lua: &Lua, inner: &Table) -> mlua::Result<Table> {
    let mt = lua.create_table()?;
    mt.raw_set("__index", inner.clone())?;
    mt.raw_set(
        "__newindex",
        lua.create_function(|_, (_target, key, _value): (Value, Value, Value)| {
            Err::<(), _>(mlua::Error::external(ProtectionViolation::new(describe_key(&key))))
        })?,
    )?;

    let len_source = inner.clone();
    mt.raw_set(
        "__len",
        lua.create_function(move |_, _: Value| Ok(len_source.raw_len()))?,
    )?;

    let pairs_source = inner.clone();
    mt.raw_set(
        "__pairs",
        lua.create_function(move |lua, _: Value| {
            let next: Function = lua.globals().raw_get("next")?;
            Ok((next, pairs_source.clone(), Value::Nil))
        })?,
    )?;

    mt.raw_set("__metatable", false)?;
    Ok(mt)
}

/// Point string methods at the frozen `string` namespace and lock the
/// string metatable, so `("").upper` cannot reach a mutable library table.
fn lock_string_metatable(lua: &Lua, root: &Table) -> mlua::Result<()> {
    let frozen_string = root.get::<Value>("string")?;
    lua.load(
        r#"
        local frozen = ...
        local mt = getmetatable("")
        if type(mt) == "table" then
            mt.__index = frozen
            mt.__metatable = false
        end
        "#,
    )
    .set_name("=luna:string-metatable")
    .call::<()>(frozen_string)
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_string_lossy().to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => format!("<{}>", other.type_name()),
    }
}
