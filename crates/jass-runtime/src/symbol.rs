//! Symbol tables and name binding
//!
//! [`GlobalScope`] is built once before any function body is compiled and is
//! read-only afterwards. [`LocalTable`] is built incrementally while a single
//! function body is compiled.

use crate::ast::{self, Param};
use crate::types::Type;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Name of the synthetic function that runs global initializers
pub const INIT_FUNCTION: &str = "<globals>";

/// Index of a global storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub usize);

/// Index of a user function in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

/// Host-chosen id of a native function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u32);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a global name is bound to. A name maps to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSymbol {
    Global(GlobalId),
    Function(FunctionId),
    Native(NativeId),
}

impl GlobalSymbol {
    fn kind(&self) -> &'static str {
        match self {
            GlobalSymbol::Global(_) => "global variable",
            GlobalSymbol::Function(_) => "function",
            GlobalSymbol::Native(_) => "native",
        }
    }
}

/// A global storage slot
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSlot {
    pub id: GlobalId,
    pub name: String,
    pub ty: Type,
    pub constant: bool,
}

/// A user function as known before its body is compiled
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub id: FunctionId,
    pub name: String,
    /// Address of the function's entry stub
    pub entry: usize,
    pub params: Vec<Type>,
    pub return_type: Type,
}

impl FunctionDescriptor {
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// A host native
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDescriptor {
    pub id: NativeId,
    pub name: String,
    pub arity: usize,
}

/// Registration failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SymbolError {
    #[error("'{name}' is already declared as a {existing}")]
    Duplicate { name: String, existing: &'static str },
    #[error("native id {id} is already used by '{existing}'")]
    DuplicateNativeId { id: u32, existing: String },
}

/// Program-wide names: globals, user functions and natives
#[derive(Debug, Clone, Default)]
pub struct GlobalScope {
    names: HashMap<String, GlobalSymbol>,
    globals: Vec<GlobalSlot>,
    functions: Vec<FunctionDescriptor>,
    natives: BTreeMap<NativeId, NativeDescriptor>,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, name: &str, symbol: GlobalSymbol) -> Result<(), SymbolError> {
        if let Some(existing) = self.names.get(name) {
            return Err(SymbolError::Duplicate {
                name: name.to_string(),
                existing: existing.kind(),
            });
        }
        self.names.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Declare a global variable (scalar or array)
    pub fn declare_global(
        &mut self,
        name: &str,
        ty: Type,
        constant: bool,
    ) -> Result<GlobalId, SymbolError> {
        let id = GlobalId(self.globals.len());
        self.claim(name, GlobalSymbol::Global(id))?;
        self.globals.push(GlobalSlot {
            id,
            name: name.to_string(),
            ty,
            constant,
        });
        Ok(id)
    }

    /// Register a user function. Its entry address is its registration index.
    pub fn register_function(
        &mut self,
        name: &str,
        params: Vec<Type>,
        return_type: Type,
    ) -> Result<FunctionId, SymbolError> {
        let id = FunctionId(self.functions.len());
        self.claim(name, GlobalSymbol::Function(id))?;
        self.functions.push(FunctionDescriptor {
            id,
            name: name.to_string(),
            entry: id.0,
            params,
            return_type,
        });
        Ok(id)
    }

    /// Register a host native under a host-chosen id
    pub fn register_native(
        &mut self,
        name: &str,
        id: NativeId,
        arity: usize,
    ) -> Result<(), SymbolError> {
        if let Some(existing) = self.natives.get(&id) {
            return Err(SymbolError::DuplicateNativeId {
                id: id.0,
                existing: existing.name.clone(),
            });
        }
        self.claim(name, GlobalSymbol::Native(id))?;
        self.natives.insert(
            id,
            NativeDescriptor {
                id,
                name: name.to_string(),
                arity,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<GlobalSymbol> {
        self.names.get(name).copied()
    }

    pub fn global(&self, id: GlobalId) -> Option<&GlobalSlot> {
        self.globals.get(id.0)
    }

    pub fn function(&self, id: FunctionId) -> Option<&FunctionDescriptor> {
        self.functions.get(id.0)
    }

    pub fn native(&self, id: NativeId) -> Option<&NativeDescriptor> {
        self.natives.get(&id)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&FunctionDescriptor> {
        match self.lookup(name)? {
            GlobalSymbol::Function(id) => self.function(id),
            _ => None,
        }
    }

    pub fn global_by_name(&self, name: &str) -> Option<&GlobalSlot> {
        match self.lookup(name)? {
            GlobalSymbol::Global(id) => self.global(id),
            _ => None,
        }
    }

    /// Function whose entry stub sits at `entry`
    pub fn function_at_entry(&self, entry: usize) -> Option<&FunctionDescriptor> {
        self.functions.get(entry).filter(|f| f.entry == entry)
    }

    pub fn globals(&self) -> &[GlobalSlot] {
        &self.globals
    }

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    pub fn natives(&self) -> impl Iterator<Item = &NativeDescriptor> {
        self.natives.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

/// Registration pass over a parsed program: every global, every function,
/// and the `<globals>` initializer when any global has an initial value.
///
/// Runs before code generation so that calls to functions declared later in
/// the source resolve.
pub fn declare_program(scope: &mut GlobalScope, program: &ast::Program) -> Result<(), SymbolError> {
    for global in &program.globals {
        scope.declare_global(&global.name, global.ty.clone(), global.constant)?;
    }
    for function in &program.functions {
        let params = function.params.iter().map(|p| p.ty.clone()).collect();
        scope.register_function(&function.name, params, function.return_type.clone())?;
    }
    if program.globals.iter().any(|g| g.init.is_some()) {
        scope.register_function(INIT_FUNCTION, Vec::new(), Type::Nothing)?;
    }
    Ok(())
}

/// A local slot
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSlot {
    pub slot: usize,
    pub ty: Type,
}

/// Per-function local names. Parameters occupy slots `0..param_count`,
/// locals follow densely in declaration order.
#[derive(Debug, Clone, Default)]
pub struct LocalTable {
    slots: HashMap<String, LocalSlot>,
    next_slot: usize,
}

impl LocalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with parameters. Returns the offending name on a duplicate.
    pub fn with_params(params: &[Param]) -> Result<Self, String> {
        let mut table = Self::new();
        for param in params {
            if table.declare(&param.name, param.ty.clone()).is_none() {
                return Err(param.name.clone());
            }
        }
        Ok(table)
    }

    /// Allocate the next slot for `name`; `None` if the name is already local
    pub fn declare(&mut self, name: &str, ty: Type) -> Option<usize> {
        if self.slots.contains_key(name) {
            return None;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(name.to_string(), LocalSlot { slot, ty });
        Some(slot)
    }

    pub fn get(&self, name: &str) -> Option<&LocalSlot> {
        self.slots.get(name)
    }

    /// Number of slots allocated so far
    pub fn slot_count(&self) -> usize {
        self.next_slot
    }
}
