//! Shared test utilities
//!
//! Builders for small programs and helpers that compile and run them.

#![allow(dead_code)]

use jass_config::VmConfig;
use jass_runtime::ast::{self, FunctionDecl, GlobalDecl, Param, Stmt};
use jass_runtime::{
    compile_program, GlobalScope, Globals, NativeTable, Program, RunOutcome, RuntimeError, Type,
    Value, Vm,
};
use std::sync::Arc;

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

/// `function name takes nothing returns ret`
pub fn func(name: &str, ret: Type, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl::new(name, vec![], ret, body)
}

/// `function name takes params returns ret`
pub fn func_with(name: &str, params: &[(&str, Type)], ret: Type, body: Vec<Stmt>) -> FunctionDecl {
    let params = params
        .iter()
        .map(|(name, ty)| Param::new(*name, ty.clone()))
        .collect();
    FunctionDecl::new(name, params, ret, body)
}

pub fn global(name: &str, ty: Type) -> GlobalDecl {
    GlobalDecl {
        name: name.to_string(),
        ty,
        constant: false,
        init: None,
    }
}

/// Compile against a scope that already holds `natives`
pub fn compile(
    natives: &NativeTable,
    globals: Vec<GlobalDecl>,
    functions: Vec<FunctionDecl>,
) -> Program {
    let mut scope = GlobalScope::new();
    natives.declare_into(&mut scope).expect("native registration failed");
    compile_program(scope, &ast::Program { globals, functions }).expect("Compilation failed")
}

/// A compiled program with its VM and globals
pub struct Harness {
    pub vm: Vm,
    pub globals: Globals,
    pub natives: NativeTable,
}

impl Harness {
    pub fn new(
        natives: NativeTable,
        globals: Vec<GlobalDecl>,
        functions: Vec<FunctionDecl>,
    ) -> Self {
        Self::with_config(natives, globals, functions, VmConfig::default())
    }

    pub fn with_config(
        natives: NativeTable,
        globals: Vec<GlobalDecl>,
        functions: Vec<FunctionDecl>,
        config: VmConfig,
    ) -> Self {
        let program = compile(&natives, globals, functions);
        let globals = Globals::new(&program.scope);
        Self {
            vm: Vm::new(Arc::new(program), config),
            globals,
            natives,
        }
    }

    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<RunOutcome, RuntimeError> {
        self.vm
            .call(name, args, &mut self.globals, &mut self.natives)
    }

    pub fn resume(&mut self) -> Result<RunOutcome, RuntimeError> {
        self.vm.resume(&mut self.globals, &mut self.natives)
    }

    /// Call and expect the invocation to finish
    pub fn eval(&mut self, name: &str, args: Vec<Value>) -> Value {
        match self.call(name, args) {
            Ok(RunOutcome::Finished(value)) => value,
            other => panic!("Expected {} to finish, got {:?}", name, other),
        }
    }

    pub fn global(&self, name: &str) -> Value {
        let slot = self
            .vm
            .program()
            .scope
            .global_by_name(name)
            .unwrap_or_else(|| panic!("no global {}", name));
        self.globals.get(slot.id).cloned().expect("global slot")
    }
}

/// Compile a single no-argument function and run it
pub fn eval_body(ret: Type, body: Vec<Stmt>) -> Result<Value, RuntimeError> {
    let mut harness = Harness::new(NativeTable::new(), vec![], vec![func("main", ret, body)]);
    harness.call("main", vec![]).map(|outcome| match outcome {
        RunOutcome::Finished(value) => value,
        RunOutcome::Suspended => panic!("unexpected suspension"),
    })
}
