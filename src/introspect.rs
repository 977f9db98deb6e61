//! Read-only access to script variables from the host

use mlua::Value;

use crate::sandbox::ScriptEnvironment;

/// Resolve a dotted `path` inside a script's environment.
///
/// The first segment is looked up the way guest code would see it (own
/// globals, shared objects, shared environment). Each later segment indexes
/// the current table; a segment that parses as an integer falls back to the
/// integer key. Anything else that does not resolve yields `None`.
pub fn get_variable(env: &ScriptEnvironment, path: &str) -> Option<Value> {
    let mut segments = path.split('.');

    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = non_nil(env.resolve(first))?;

    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        let Value::Table(table) = current else {
            return None;
        };

        let mut next = table.get::<Value>(segment).ok()?;
        if next.is_nil() {
            if let Ok(index) = segment.parse::<i64>() {
                next = table.get::<Value>(index).ok()?;
            }
        }
        current = non_nil(next)?;
    }

    Some(current)
}

fn non_nil(value: Value) -> Option<Value> {
    (!value.is_nil()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostBindings;
    use crate::sandbox::{SandboxFactory, ScriptOrigin};
    use crate::scheduler::TickRunner;
    use std::rc::Rc;

    fn env_with(source: &str) -> (SandboxFactory, ScriptEnvironment) {
        let factory = SandboxFactory::new(&HostBindings::new(), Rc::new(TickRunner::new())).unwrap();
        let env = factory
            .create_sandbox("subject", ScriptOrigin::Inline(source.to_string()))
            .unwrap();
        factory.compile(&env, source).unwrap().call::<()>(()).unwrap();
        (factory, env)
    }

    fn text(value: Option<Value>) -> String {
        match value {
            Some(Value::String(s)) => s.to_string_lossy().to_string(),
            other => panic!("expected a string, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_path() {
        let (_factory, env) = env_with("state = { player = { hp = 10 } }");
        assert_eq!(get_variable(&env, "state.player.hp"), Some(Value::Integer(10)));
    }

    #[test]
    fn test_integer_segment_falls_back_to_index() {
        let (_factory, env) = env_with("list = { 'a', 'b', ['3'] = 'string key' }");
        assert_eq!(text(get_variable(&env, "list.2")), "b");
        assert_eq!(text(get_variable(&env, "list.3")), "string key");
    }

    #[test]
    fn test_missing_segments_are_none() {
        let (_factory, env) = env_with("state = { count = 1 }");
        assert!(get_variable(&env, "state.missing").is_none());
        assert!(get_variable(&env, "state.count.deeper").is_none());
        assert!(get_variable(&env, "nothing").is_none());
        assert!(get_variable(&env, "state..count").is_none());
        assert!(get_variable(&env, "").is_none());
    }

    #[test]
    fn test_reads_through_to_shared_environment() {
        let (_factory, env) = env_with("");
        let pi = get_variable(&env, "math.pi").unwrap();
        assert!(matches!(pi, Value::Number(n) if (n - std::f64::consts::PI).abs() < 1e-12));
    }
}
