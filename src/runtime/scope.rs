//! Name environment the evaluator reads and writes: one shared global map
//! plus a per-task call-frame chain, per spec §4.5/§5.
//!
//! Grounded in the shape of `Brahmastra-Labs-logicaffeine`'s `Interpreter`
//! (a `Vec<HashMap<Symbol, RuntimeValue>>` scope stack), split here into a
//! `Mutex`-guarded shared [`Globals`] and an unshared per-thread
//! [`CallFrames`] stack, because spec §5 requires the global map to be
//! writable concurrently from `par`-spawned tasks while each task's local
//! frames stay private.

use crate::runtime::value::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// The single global variable/channel/function-table-adjacent map, shared
/// across every task. Spec §5: "guarded by a mutex for writes; reads may
/// use the same mutex."
#[derive(Debug, Default)]
pub struct Globals {
    vars: Mutex<HashMap<String, Value>>,
}

impl Globals {
    /// An empty global scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a global by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.lock().expect("globals lock poisoned").get(name).cloned()
    }

    /// Whether a global binding exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.lock().expect("globals lock poisoned").contains_key(name)
    }

    /// Creates or overwrites a global binding.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.vars
            .lock()
            .expect("globals lock poisoned")
            .insert(name.into(), value);
    }
}

/// The call-frame chain for one task: a stack of local scopes, innermost
/// last. Never shared between tasks (spec §5: "not shared; no lock
/// required").
#[derive(Debug, Default)]
pub struct CallFrames {
    frames: Vec<HashMap<String, Value>>,
}

impl CallFrames {
    /// An empty frame chain (top-level / no active call).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a fresh frame, e.g. on function/method entry.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pops the innermost frame, e.g. on function/method return.
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Whether any call frame is currently active (i.e. we're inside a
    /// function/method body rather than at top level).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Binds `name` in the innermost frame, shadowing any outer binding
    /// (spec §3: "shadowing across scopes is permitted"). If no frame is
    /// active, declares straight into top-level-local semantics by pushing
    /// an implicit frame isn't appropriate here — callers without an active
    /// frame should use [`Globals::set`] instead.
    pub fn declare_local(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Looks up `name` across this chain only (innermost to outermost),
    /// without consulting globals.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames.iter().rev().find_map(|f| f.get(name).cloned())
    }

    /// Writes `name` to the innermost frame that already binds it, per
    /// spec §9's "global-vs-local scope mutation" contract. Returns `false`
    /// if no frame currently binds the name (caller falls back to the
    /// global map).
    pub fn assign_if_bound(&mut self, name: &str, value: Value) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if frame.contains_key(name) {
                frame.insert(name.to_string(), value);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_innermost_wins() {
        let mut frames = CallFrames::new();
        frames.push();
        frames.declare_local("x", Value::Integer(1));
        frames.push();
        frames.declare_local("x", Value::Integer(2));
        assert_eq!(frames.lookup("x"), Some(Value::Integer(2)));
        frames.pop();
        assert_eq!(frames.lookup("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn assign_falls_back_to_global_when_unbound_locally() {
        let mut frames = CallFrames::new();
        frames.push();
        assert!(!frames.assign_if_bound("g", Value::Integer(9)));
        let globals = Globals::new();
        globals.set("g", Value::Integer(9));
        assert_eq!(globals.get("g"), Some(Value::Integer(9)));
    }
}
