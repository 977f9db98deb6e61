//! JSON output formatting

use std::collections::HashSet;

use mlua::{Function, Lua, Table, Value as LuaValue};
use serde_json::{json, Map, Value};

use crate::output::formatter::Report;

/// Tables nested deeper than this are cut off
const MAX_DEPTH: usize = 16;

/// Tables converted per value before the rest is cut off
const MAX_TABLES: usize = 4096;

/// Entries read from a single table
const MAX_ENTRIES: usize = 10_000;

pub fn format_json(report: &Report) -> String {
    let data: Value = match report {
        Report::Outcomes(outcomes) => json!({ "outcomes": outcomes }),
        Report::Bundles { root, names } => json!({ "root": root, "bundles": names }),
        Report::Scripts(scripts) => json!({ "scripts": scripts }),
        Report::Commands(commands) => json!({ "commands": commands }),
        Report::Variable(var) => serde_json::to_value(var).unwrap_or(json!(null)),
        Report::Message(s) => json!({ "message": s }),
    };

    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

/// Convert a Lua value for output.
///
/// Tables are read the way guest code reads them (`pairs` and `#`), so
/// frozen shared namespaces show their contents. Sequences become arrays,
/// other tables objects with stringified keys. A table that contains itself
/// is rendered as `"<cycle>"` where it recurs. Functions, userdata and
/// threads are rendered as `"<type>"`.
pub fn lua_to_json(lua: &Lua, value: &LuaValue) -> Value {
    Converter {
        lua,
        path: HashSet::new(),
        tables: 0,
    }
    .convert(value, 0)
}

struct Converter<'lua> {
    lua: &'lua Lua,
    /// Tables currently being converted, by identity
    path: HashSet<usize>,
    tables: usize,
}

impl Converter<'_> {
    fn convert(&mut self, value: &LuaValue, depth: usize) -> Value {
        match value {
            LuaValue::Nil => Value::Null,
            LuaValue::Boolean(b) => json!(b),
            LuaValue::Integer(i) => json!(i),
            LuaValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            LuaValue::String(s) => json!(s.to_string_lossy().to_string()),
            LuaValue::Table(table) => {
                let id = table.to_pointer() as usize;
                if self.path.contains(&id) {
                    return json!("<cycle>");
                }
                if depth >= MAX_DEPTH || self.tables >= MAX_TABLES {
                    return json!("<table>");
                }
                let Ok((entries, len)) = visible_entries(self.lua, table) else {
                    return json!("<table>");
                };

                self.tables += 1;
                self.path.insert(id);
                let converted = self.table(&entries, len, depth);
                self.path.remove(&id);
                converted
            }
            other => json!(format!("<{}>", other.type_name())),
        }
    }

    fn table(&mut self, entries: &[(LuaValue, LuaValue)], len: usize, depth: usize) -> Value {
        let is_sequence = len > 0
            && entries.len() == len
            && entries
                .iter()
                .all(|(k, _)| matches!(k, LuaValue::Integer(i) if *i >= 1 && (*i as usize) <= len));
        if is_sequence {
            let mut items = vec![Value::Null; len];
            for (k, v) in entries {
                if let LuaValue::Integer(i) = k {
                    items[*i as usize - 1] = self.convert(v, depth + 1);
                }
            }
            return Value::Array(items);
        }

        let mut map = Map::new();
        for (k, v) in entries {
            map.insert(key_string(k), self.convert(v, depth + 1));
        }
        Value::Object(map)
    }
}

/// Entries and length as guest code sees them; `pairs` and `#` go through
/// the `__pairs`/`__len` metamethods of read-only proxies.
fn visible_entries(lua: &Lua, table: &Table) -> mlua::Result<(Vec<(LuaValue, LuaValue)>, usize)> {
    let pairs: Function = lua.globals().raw_get("pairs")?;
    let (next, state, mut key): (Function, LuaValue, LuaValue) = pairs.call(table.clone())?;

    let mut entries = Vec::new();
    while entries.len() < MAX_ENTRIES {
        let (k, v): (LuaValue, LuaValue) = next.call((state.clone(), key))?;
        if k.is_nil() {
            break;
        }
        key = k.clone();
        entries.push((k, v));
    }

    let len = usize::try_from(table.len()?).unwrap_or(0);
    Ok((entries, len))
}

fn key_string(key: &LuaValue) -> String {
    match key {
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        other => format!("<{}>", other.type_name()),
    }
}
