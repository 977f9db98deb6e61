//! Per-script logger

use log::Level;
use mlua::{UserData, UserDataMethods, Value, Variadic};

/// Logger handed to each script (and used by the host on its behalf).
///
/// Records go through the `log` facade with target `luna::script::<name>`,
/// so `RUST_LOG=luna::script::greet=debug` isolates a single script.
#[derive(Debug, Clone)]
pub struct ScriptLogger {
    script: String,
    target: String,
}

impl ScriptLogger {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
            target: format!("luna::script::{}", script),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, message: &str) {
        log::log!(target: self.target.as_str(), level, "[{}] {}", self.script, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

impl UserData for ScriptLogger {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("debug", |_, this, args: Variadic<Value>| {
            this.debug(&join_values(&args));
            Ok(())
        });
        methods.add_method("info", |_, this, args: Variadic<Value>| {
            this.info(&join_values(&args));
            Ok(())
        });
        methods.add_method("warn", |_, this, args: Variadic<Value>| {
            this.warn(&join_values(&args));
            Ok(())
        });
        methods.add_method("error", |_, this, args: Variadic<Value>| {
            this.error(&join_values(&args));
            Ok(())
        });
    }
}

/// Render values the way `print` separates them: tab-joined.
pub fn join_values(values: &[Value]) -> String {
    values.iter().map(display_value).collect::<Vec<_>>().join("\t")
}

/// Short human-readable form of a Lua value
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    #[test]
    fn test_target_includes_script_name() {
        let logger = ScriptLogger::new("greet");
        assert_eq!(logger.target(), "luna::script::greet");
        assert_eq!(logger.script(), "greet");
    }

    #[test]
    fn test_join_values() {
        let lua = Lua::new();
        let values = vec![
            Value::String(lua.create_string("a").unwrap()),
            Value::Integer(1),
            Value::Nil,
            Value::Boolean(true),
        ];
        assert_eq!(join_values(&values), "a\t1\tnil\ttrue");
    }

    #[test]
    fn test_logger_callable_from_lua() {
        let lua = Lua::new();
        lua.globals()
            .set("logger", ScriptLogger::new("demo"))
            .unwrap();
        lua.load("logger:info('hello', 1) logger:warn('careful')")
            .exec()
            .unwrap();
    }
}
