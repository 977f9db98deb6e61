//! Error types for Luna

use thiserror::Error;

use crate::environment::ProtectionViolation;

#[derive(Error, Debug)]
pub enum LunaError {
    #[error("Parse error in script '{script}': {message}")]
    ParseError { script: String, message: String },

    #[error("Execution error in script '{script}': {message}")]
    ExecutionError { script: String, message: String },

    #[error("Protection violation in script '{script}': {message}")]
    ProtectionViolation { script: String, message: String },

    #[error("Script not loaded: {0}")]
    NotFound(String),

    #[error("Script '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Handle misuse: {0}")]
    HandleMisuse(String),

    #[error("Shared object error: {0}")]
    SharedObject(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Bundle error: {0}")]
    Bundle(String),

    #[error("Host error: {0}")]
    Host(String),

    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LunaError {
    /// Classify an error raised by guest code running on behalf of `script`.
    pub fn from_guest(script: &str, err: mlua::Error) -> Self {
        if let mlua::Error::SyntaxError { message, .. } = &err {
            return LunaError::ParseError {
                script: script.to_string(),
                message: message.clone(),
            };
        }

        if let Some(violation) = find_violation(&err) {
            return LunaError::ProtectionViolation {
                script: script.to_string(),
                message: violation.to_string(),
            };
        }

        LunaError::ExecutionError {
            script: script.to_string(),
            message: err.to_string(),
        }
    }

    /// Name of the script this error is about, if any.
    pub fn script(&self) -> Option<&str> {
        match self {
            LunaError::ParseError { script, .. }
            | LunaError::ExecutionError { script, .. }
            | LunaError::ProtectionViolation { script, .. } => Some(script),
            LunaError::NotFound(name) | LunaError::AlreadyLoaded(name) => Some(name),
            _ => None,
        }
    }
}

/// Walk the callback chain of a Lua error looking for a frozen-table write.
fn find_violation(err: &mlua::Error) -> Option<&ProtectionViolation> {
    match err {
        mlua::Error::CallbackError { cause, .. } => find_violation(cause),
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<ProtectionViolation>(),
        mlua::Error::WithContext { cause, .. } => find_violation(cause),
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, LunaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = mlua::Error::SyntaxError {
            message: "unexpected symbol near '='".to_string(),
            incomplete_input: false,
        };
        let classified = LunaError::from_guest("demo", err);
        assert!(matches!(classified, LunaError::ParseError { .. }));
        assert_eq!(classified.script(), Some("demo"));
    }

    #[test]
    fn test_runtime_error_is_execution_error() {
        let err = mlua::Error::RuntimeError("boom".to_string());
        let classified = LunaError::from_guest("demo", err);
        assert!(matches!(classified, LunaError::ExecutionError { .. }));
        assert!(classified.to_string().contains("boom"));
    }

    #[test]
    fn test_external_violation_is_protection_violation() {
        let err = mlua::Error::external(ProtectionViolation::new("upper"));
        let classified = LunaError::from_guest("demo", err);
        assert!(matches!(classified, LunaError::ProtectionViolation { .. }));
    }
}
