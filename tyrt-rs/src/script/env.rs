//! Name → value bindings: globals, write-once constants, and call frames.
//!
//! The active binding set is either the globals (top-level execution) or the
//! innermost call frame (a function/method body).  Frames never chain: a
//! callee sees its own parameters, the constants, and the globals, but not
//! its caller's locals.

use std::collections::HashMap;

use super::error::RuntimeError;
use super::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    globals: HashMap<String, Value>,
    constants: HashMap<String, Value>,
    /// Call-local scopes, innermost last.
    frames: Vec<HashMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a name: constants first, then the active call frame, then
    /// the globals.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.constants.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.frames.last().and_then(|f| f.get(name)) {
            return Some(v.clone());
        }
        self.globals.get(name).cloned()
    }

    /// Bind `name` in the active scope.  Constants cannot be rebound.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.constants.contains_key(name) {
            return Err(RuntimeError::ConstantReassignment(name.to_owned()));
        }
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name.to_owned(), value),
            None => self.globals.insert(name.to_owned(), value),
        };
        Ok(())
    }

    /// Define a constant.  Each name may be defined once.
    pub fn define_constant(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.constants.contains_key(name) {
            return Err(RuntimeError::ConstantReassignment(name.to_owned()));
        }
        self.constants.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Set a global directly, regardless of the active frame.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_owned(), value);
    }

    /// Enter a call.  Must be paired with [`pop_frame`](Self::pop_frame) on
    /// every exit path.
    pub fn push_frame(&mut self, locals: HashMap<String, Value>) {
        self.frames.push(locals);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Number of active call frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
