//! Value bridge: keeps guest values alive behind opaque integer handles
//!
//! The host never holds a guest callable across a scheduling boundary
//! directly. It pins the value here and carries the returned [`PinHandle`]
//! instead; the value stays reachable until the handle is unpinned.

use std::collections::HashMap;
use std::fmt;

use mlua::Value;

use crate::error::{LunaError, Result};

/// Opaque handle to a pinned guest value. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinHandle(u64);

impl PinHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

/// Host-owned table of strong references to guest values
#[derive(Default)]
pub struct ValueBridge {
    slots: HashMap<u64, Value>,
    next: u64,
}

impl ValueBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a strong reference to `value` and return its handle.
    pub fn pin(&mut self, value: Value) -> PinHandle {
        self.next += 1;
        self.slots.insert(self.next, value);
        PinHandle(self.next)
    }

    /// Release a pinned value. Unpinning twice is a `HandleMisuse`.
    pub fn unpin(&mut self, handle: PinHandle) -> Result<Value> {
        self.slots.remove(&handle.0).ok_or_else(|| {
            LunaError::HandleMisuse(format!("{} is not pinned (released twice or never issued)", handle))
        })
    }

    /// Read a pinned value without releasing it.
    pub fn get(&self, handle: PinHandle) -> Option<Value> {
        self.slots.get(&handle.0).cloned()
    }

    pub fn is_pinned(&self, handle: PinHandle) -> bool {
        self.slots.contains_key(&handle.0)
    }

    /// Number of values currently pinned
    pub fn pinned(&self) -> usize {
        self.slots.len()
    }
}
