//! JASS Runtime - compiler and virtual machine core
//!
//! This library provides the execution engine for JASS scripts:
//! - Value model and declared types
//! - Global and per-function symbol tables
//! - A flat, back-patched instruction set with validator and disassembler
//! - AST to bytecode compilation
//! - A stack VM with host native dispatch and suspension

/// JASS runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod api;
pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod program;
pub mod symbol;
pub mod types;
pub mod value;
pub mod vm;

// Re-export commonly used types
pub use api::{JassRuntime, NativeDispatch, NativeError, NativeReturn, NativeTable};
pub use bytecode::{disassemble, validate, Bytecode, Instruction};
pub use compiler::{compile_program, CompileError, Compiler};
pub use program::{CompiledFunction, Program};
pub use symbol::{GlobalScope, NativeId, SymbolError};
pub use types::Type;
pub use value::{FunctionRef, HandleId, RuntimeError, Value, JASS_MAX_ARRAY_SIZE};
pub use vm::{Globals, RunOutcome, Vm};
