//! Runtime facade for embedding
//!
//! Bundles the steps a host performs to run a script: register natives,
//! declare the program's symbols, compile, validate, allocate globals and run
//! the global initializer. State persists across calls.
//!
//! # Examples
//!
//! ```
//! use jass_runtime::api::native::NativeTable;
//! use jass_runtime::api::JassRuntime;
//! use jass_runtime::ast::{ArithmeticSign, Expr, FunctionDecl, Program, Stmt};
//! use jass_runtime::{RunOutcome, Type, Value};
//! use jass_config::VmConfig;
//!
//! let program = Program {
//!     globals: vec![],
//!     functions: vec![FunctionDecl::new(
//!         "f",
//!         vec![],
//!         Type::Integer,
//!         vec![Stmt::Return(Some(Expr::binary(ArithmeticSign::Add, Expr::int(1), Expr::int(1))))],
//!     )],
//! };
//! let mut runtime = JassRuntime::load(&program, NativeTable::new(), VmConfig::default()).unwrap();
//! assert_eq!(runtime.call("f", vec![]).unwrap(), RunOutcome::Finished(Value::Integer(2)));
//! ```

use crate::api::native::NativeTable;
use crate::ast;
use crate::bytecode::{validate, ValidationError};
use crate::compiler::{compile_program, CompileError};
use crate::program::Program;
use crate::symbol::{GlobalScope, SymbolError};
use crate::value::{RuntimeError, Value};
use crate::vm::{Globals, RunOutcome, Vm};
use jass_config::VmConfig;
use std::sync::Arc;
use thiserror::Error;

/// Failure while loading a program
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("native registration failed: {0}")]
    Natives(#[from] SymbolError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("program failed validation: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),
    #[error("global initializer failed: {0}")]
    Initializer(#[source] RuntimeError),
    #[error("global initializer suspended")]
    InitializerSuspended,
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A loaded program with its globals, natives and VM
pub struct JassRuntime {
    program: Arc<Program>,
    globals: Globals,
    natives: NativeTable,
    vm: Vm,
}

impl JassRuntime {
    /// Compile and initialise `program`
    pub fn load(
        program: &ast::Program,
        natives: NativeTable,
        config: VmConfig,
    ) -> Result<Self, LoadError> {
        let mut scope = GlobalScope::new();
        natives.declare_into(&mut scope)?;
        let compiled = Arc::new(compile_program(scope, program)?);
        validate(&compiled).map_err(LoadError::Validation)?;

        let globals = Globals::new(&compiled.scope);
        let vm = Vm::new(Arc::clone(&compiled), config);
        let mut runtime = Self {
            program: compiled,
            globals,
            natives,
            vm,
        };
        runtime.initialize()?;
        Ok(runtime)
    }

    /// Run `<globals>` if the program has one
    fn initialize(&mut self) -> Result<(), LoadError> {
        let Some(entry) = self.program.init_function().map(|f| f.entry) else {
            return Ok(());
        };
        match self
            .vm
            .start(entry, Vec::new(), &mut self.globals, &mut self.natives)
        {
            Ok(RunOutcome::Finished(_)) => Ok(()),
            Ok(RunOutcome::Suspended) => {
                self.vm.reset();
                Err(LoadError::InitializerSuspended)
            }
            Err(err) => Err(LoadError::Initializer(err)),
        }
    }

    /// Call a function by name
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<RunOutcome, RuntimeError> {
        self.vm
            .call(name, args, &mut self.globals, &mut self.natives)
    }

    /// Continue a suspended call
    pub fn resume(&mut self) -> Result<RunOutcome, RuntimeError> {
        self.vm.resume(&mut self.globals, &mut self.natives)
    }

    pub fn is_suspended(&self) -> bool {
        self.vm.is_suspended()
    }

    /// Current value of a global variable
    pub fn global(&self, name: &str) -> Option<&Value> {
        let slot = self.program.scope.global_by_name(name)?;
        self.globals.get(slot.id)
    }

    /// Overwrite a global variable; `false` if no such global exists
    pub fn set_global(&mut self, name: &str, value: Value) -> bool {
        match self.program.scope.global_by_name(name) {
            Some(slot) => self.globals.set(slot.id, value).is_ok(),
            None => false,
        }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn natives_mut(&mut self) -> &mut NativeTable {
        &mut self.natives
    }
}
