//! Compiled program
//!
//! The output of the compiler: the shared instruction array, the global scope
//! it was compiled against, and per-function layout. Immutable once built and
//! shared read-only between VM instances.

use crate::bytecode::Bytecode;
use crate::symbol::{FunctionId, GlobalScope, INIT_FUNCTION};
use crate::value::FunctionRef;
use std::sync::Arc;

/// Layout of one compiled function
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub id: FunctionId,
    pub name: Arc<str>,
    /// Address of the entry stub (`branch body`)
    pub entry: usize,
    /// First instruction of the body
    pub body: usize,
    /// One past the last instruction of the body
    pub end: usize,
    pub param_count: usize,
    /// Total local slots, parameters included
    pub local_count: usize,
}

impl CompiledFunction {
    /// Whether `address` lies inside this function's body
    pub fn contains(&self, address: usize) -> bool {
        (self.body..self.end).contains(&address)
    }

    pub fn to_ref(&self) -> FunctionRef {
        FunctionRef {
            id: self.id,
            name: Arc::clone(&self.name),
            entry: self.entry,
        }
    }
}

/// An executable program
#[derive(Debug, Clone)]
pub struct Program {
    pub bytecode: Bytecode,
    pub scope: GlobalScope,
    /// Indexed by [`FunctionId`]
    pub functions: Vec<CompiledFunction>,
}

impl Program {
    pub fn function(&self, id: FunctionId) -> Option<&CompiledFunction> {
        self.functions.get(id.0)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&CompiledFunction> {
        let descriptor = self.scope.function_by_name(name)?;
        self.function(descriptor.id)
    }

    pub fn function_at_entry(&self, entry: usize) -> Option<&CompiledFunction> {
        let descriptor = self.scope.function_at_entry(entry)?;
        self.function(descriptor.id)
    }

    /// Function whose body contains `address`
    pub fn function_containing(&self, address: usize) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.contains(address))
    }

    /// The synthetic global initializer, if the program has one
    pub fn init_function(&self) -> Option<&CompiledFunction> {
        self.function_by_name(INIT_FUNCTION)
    }
}
