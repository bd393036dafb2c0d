//! Public embedding API for the JASS runtime
//!
//! This module provides what a host needs to run scripts:
//! - Native function registration and dispatch
//! - Value conversion between Rust and JASS types
//! - A runtime facade that compiles, initialises and calls a program
//!
//! # Examples
//!
//! ```
//! use jass_runtime::api::native::{NativeReturn, NativeTable};
//! use jass_runtime::api::JassRuntime;
//! use jass_runtime::ast::{Expr, FunctionDecl, Program, Stmt};
//! use jass_runtime::Type;
//! use jass_config::VmConfig;
//!
//! let mut natives = NativeTable::new();
//! natives.register("Print", 1, |args| {
//!     println!("{}", args[0]);
//!     Ok(NativeReturn::nothing())
//! });
//!
//! let program = Program {
//!     globals: vec![],
//!     functions: vec![FunctionDecl::new(
//!         "main",
//!         vec![],
//!         Type::Nothing,
//!         vec![Stmt::call("Print", vec![Expr::string("hi")])],
//!     )],
//! };
//! let mut runtime = JassRuntime::load(&program, natives, VmConfig::default()).unwrap();
//! runtime.call("main", vec![]).unwrap();
//! ```

pub mod conversion;
pub mod native;
pub mod runtime;

// Re-export main types for convenience
pub use conversion::{ConversionError, FromJass, ToJass};
pub use native::{NativeDispatch, NativeError, NativeReturn, NativeTable};
pub use runtime::{JassRuntime, LoadError};
