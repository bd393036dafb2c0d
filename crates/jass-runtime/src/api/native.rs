//! Native function registry and dispatch
//!
//! Natives are host capabilities invoked by numeric id with a fixed argument
//! count. The VM only sees the [`NativeDispatch`] trait; [`NativeTable`] is a
//! ready-made implementation holding Rust closures.
//!
//! # Examples
//!
//! ```rust
//! use jass_runtime::api::native::{NativeReturn, NativeTable};
//! use jass_runtime::api::FromJass;
//! use jass_runtime::symbol::GlobalScope;
//! use jass_runtime::Value;
//!
//! let mut natives = NativeTable::new();
//! natives.register("I2S", 1, |args| {
//!     let n = i32::from_jass(&args[0])?;
//!     Ok(NativeReturn::value(Value::string(n.to_string())))
//! });
//!
//! let mut scope = GlobalScope::new();
//! natives.declare_into(&mut scope).unwrap();
//! assert!(scope.lookup("I2S").is_some());
//! ```

use crate::symbol::{GlobalScope, NativeId, SymbolError};
use crate::value::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure reported by a host native
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NativeError {
    /// Host-defined failure
    #[error("{0}")]
    Message(String),
    /// Argument of the wrong type
    #[error("argument {index}: expected {expected}, found {found}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    /// Wrong number of arguments
    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },
}

impl NativeError {
    pub fn message(msg: impl Into<String>) -> Self {
        NativeError::Message(msg.into())
    }
}

/// What a native hands back to the VM
#[derive(Debug, Clone, PartialEq)]
pub enum NativeReturn {
    /// Push the value and continue
    Value(Value),
    /// Push the value and stop; the host resumes the VM later
    Suspend(Value),
}

impl NativeReturn {
    pub fn value(value: impl Into<Value>) -> Self {
        NativeReturn::Value(value.into())
    }

    /// Result for natives declared as returning nothing
    pub fn nothing() -> Self {
        NativeReturn::Value(Value::Nothing)
    }
}

impl From<Value> for NativeReturn {
    fn from(value: Value) -> Self {
        NativeReturn::Value(value)
    }
}

/// Host side of the `native` instruction
pub trait NativeDispatch {
    /// Invoke native `id` with its arguments in call order
    fn invoke(&mut self, id: NativeId, args: Vec<Value>) -> Result<NativeReturn, NativeError>;

    /// Registered name of `id`, or `None` when the id is unknown
    fn name(&self, id: NativeId) -> Option<&str>;
}

/// Type alias for native function implementation
type NativeFnImpl = Box<dyn FnMut(&[Value]) -> Result<NativeReturn, NativeError>>;

struct NativeEntry {
    name: String,
    arity: usize,
    implementation: NativeFnImpl,
}

/// Closure-backed [`NativeDispatch`]
#[derive(Default)]
pub struct NativeTable {
    entries: BTreeMap<NativeId, NativeEntry>,
    next_id: u32,
}

impl NativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native under the next free id
    ///
    /// # Arguments
    ///
    /// * `name` - Name scripts call it by
    /// * `arity` - Exact argument count, checked before the closure runs
    /// * `f` - Implementation
    pub fn register<F>(&mut self, name: &str, arity: usize, f: F) -> NativeId
    where
        F: FnMut(&[Value]) -> Result<NativeReturn, NativeError> + 'static,
    {
        while self.entries.contains_key(&NativeId(self.next_id)) {
            self.next_id += 1;
        }
        let id = NativeId(self.next_id);
        self.next_id += 1;
        self.insert(id, name, arity, Box::new(f));
        id
    }

    /// Register a native under a host-chosen id
    pub fn register_with_id<F>(
        &mut self,
        name: &str,
        id: NativeId,
        arity: usize,
        f: F,
    ) -> Result<(), SymbolError>
    where
        F: FnMut(&[Value]) -> Result<NativeReturn, NativeError> + 'static,
    {
        if let Some(existing) = self.entries.get(&id) {
            return Err(SymbolError::DuplicateNativeId {
                id: id.0,
                existing: existing.name.clone(),
            });
        }
        self.insert(id, name, arity, Box::new(f));
        Ok(())
    }

    fn insert(&mut self, id: NativeId, name: &str, arity: usize, implementation: NativeFnImpl) {
        self.entries.insert(
            id,
            NativeEntry {
                name: name.to_string(),
                arity,
                implementation,
            },
        );
    }

    /// Register every native's name, id and arity in `scope`
    pub fn declare_into(&self, scope: &mut GlobalScope) -> Result<(), SymbolError> {
        for (id, entry) in &self.entries {
            scope.register_native(&entry.name, *id, entry.arity)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NativeDispatch for NativeTable {
    fn invoke(&mut self, id: NativeId, args: Vec<Value>) -> Result<NativeReturn, NativeError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| NativeError::message(format!("unknown native id {}", id)))?;
        if args.len() != entry.arity {
            return Err(NativeError::Arity {
                expected: entry.arity,
                found: args.len(),
            });
        }
        (entry.implementation)(&args)
    }

    fn name(&self, id: NativeId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }
}

impl std::fmt::Debug for NativeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, e)| (id.0, (&e.name, e.arity))))
            .finish()
    }
}
