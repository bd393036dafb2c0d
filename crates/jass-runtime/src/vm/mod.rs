//! Stack-based virtual machine
//!
//! Executes a compiled [`Program`] with an operand stack, a call-frame stack
//! and an instruction pointer.
//! - One VM runs one invocation at a time; the program is shared via `Arc`
//! - Globals are owned by the host and lent to each run
//! - Natives are dispatched through the host's [`NativeDispatch`]
//! - A native may suspend the invocation; [`Vm::resume`] continues it

mod frame;
mod globals;

pub use frame::CallFrame;
pub use globals::Globals;

use crate::api::native::{NativeDispatch, NativeReturn};
use crate::bytecode::{Callee, Instruction};
use crate::program::{CompiledFunction, Program};
use crate::types::Type;
use crate::value::{self, FunctionRef, RuntimeError, Value, ValueArray};
use jass_config::VmConfig;
use std::sync::Arc;
use tracing::{debug, trace};

/// Host arguments bound to `real` parameters are widened like compiled calls
fn widen_args(program: &Program, function: &CompiledFunction, args: Vec<Value>) -> Vec<Value> {
    let Some(descriptor) = program.scope.function(function.id) else {
        return args;
    };
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| match descriptor.params.get(index) {
            Some(Type::Real) => value::widen_to_real(arg),
            _ => arg,
        })
        .collect()
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The started function returned this value
    Finished(Value),
    /// A native asked to suspend; call [`Vm::resume`] to continue
    Suspended,
}

impl RunOutcome {
    /// The returned value, if the invocation finished
    pub fn finished(self) -> Option<Value> {
        match self {
            RunOutcome::Finished(value) => Some(value),
            RunOutcome::Suspended => None,
        }
    }
}

/// Virtual machine state
pub struct Vm {
    program: Arc<Program>,
    config: VmConfig,
    /// Operand stack
    stack: Vec<Value>,
    /// Active call frames
    frames: Vec<CallFrame>,
    /// Frames announced by `new-stack-frame`, not yet activated
    pending: Vec<Callee>,
    /// Instruction pointer
    ip: usize,
    suspended: bool,
}

impl Vm {
    /// Create an idle VM over a compiled program
    pub fn new(program: Arc<Program>, config: VmConfig) -> Self {
        Self {
            program,
            config,
            stack: Vec::with_capacity(256),
            frames: Vec::new(),
            pending: Vec::new(),
            ip: 0,
            suspended: false,
        }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Whether an invocation is waiting for [`Vm::resume`]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Number of active call frames
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Current operand stack height
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Run the function whose entry stub is at `entry`
    pub fn start(
        &mut self,
        entry: usize,
        args: Vec<Value>,
        globals: &mut Globals,
        natives: &mut dyn NativeDispatch,
    ) -> Result<RunOutcome, RuntimeError> {
        if self.suspended {
            return Err(RuntimeError::AlreadyRunning);
        }
        let program = Arc::clone(&self.program);
        let function = program
            .function_at_entry(entry)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: format!("<entry {}>", entry),
            })?;
        let args = widen_args(&program, function, args);
        self.enter(function, args)?;
        debug!(function = %function.name, entry, "invocation started");
        self.run(globals, natives)
    }

    /// Run a function by name
    pub fn call(
        &mut self,
        name: &str,
        args: Vec<Value>,
        globals: &mut Globals,
        natives: &mut dyn NativeDispatch,
    ) -> Result<RunOutcome, RuntimeError> {
        let entry = self
            .program
            .function_by_name(name)
            .map(|f| f.entry)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_string(),
            })?;
        self.start(entry, args, globals, natives)
    }

    /// Run the function a `code` value refers to
    pub fn call_code(
        &mut self,
        code: &FunctionRef,
        args: Vec<Value>,
        globals: &mut Globals,
        natives: &mut dyn NativeDispatch,
    ) -> Result<RunOutcome, RuntimeError> {
        self.start(code.entry, args, globals, natives)
    }

    /// Continue a suspended invocation
    pub fn resume(
        &mut self,
        globals: &mut Globals,
        natives: &mut dyn NativeDispatch,
    ) -> Result<RunOutcome, RuntimeError> {
        if !self.suspended {
            return Err(RuntimeError::NotSuspended);
        }
        self.suspended = false;
        debug!(ip = self.ip, "invocation resumed");
        self.run(globals, natives)
    }

    /// Drop any invocation state and return to idle
    pub fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.pending.clear();
        self.ip = 0;
        self.suspended = false;
    }

    /// Set up the outermost frame for a host call
    fn enter(&mut self, function: &CompiledFunction, args: Vec<Value>) -> Result<(), RuntimeError> {
        if args.len() != function.param_count {
            return Err(RuntimeError::ArityMismatch {
                name: function.name.to_string(),
                expected: function.param_count,
                found: args.len(),
            });
        }
        self.reset();
        let mut locals = args;
        locals.resize(function.local_count, Value::Nothing);
        self.frames.push(CallFrame {
            callee: Callee::Function(function.id),
            locals,
            return_addr: None,
            stack_base: 0,
        });
        self.ip = function.entry;
        Ok(())
    }

    fn run(
        &mut self,
        globals: &mut Globals,
        natives: &mut dyn NativeDispatch,
    ) -> Result<RunOutcome, RuntimeError> {
        match self.execute(globals, natives) {
            Ok(RunOutcome::Finished(value)) => {
                debug!(result = %value, "invocation finished");
                self.reset();
                Ok(RunOutcome::Finished(value))
            }
            Ok(RunOutcome::Suspended) => {
                debug!(ip = self.ip, "invocation suspended");
                self.suspended = true;
                Ok(RunOutcome::Suspended)
            }
            Err(err) => {
                debug!(ip = self.ip, error = %err, "invocation failed");
                self.reset();
                Err(err)
            }
        }
    }

    /// Main execution loop
    fn execute(
        &mut self,
        globals: &mut Globals,
        natives: &mut dyn NativeDispatch,
    ) -> Result<RunOutcome, RuntimeError> {
        let program = Arc::clone(&self.program);
        let instructions = program.bytecode.instructions();
        let limit = self.config.instruction_limit;
        let mut executed: u64 = 0;

        loop {
            if let Some(limit) = limit {
                if executed >= limit {
                    return Err(RuntimeError::InstructionLimit { limit });
                }
            }
            executed += 1;

            let ip = self.ip;
            let instruction = instructions
                .get(ip)
                .ok_or(RuntimeError::InvalidBranchTarget { target: ip })?;
            trace!(ip, %instruction, depth = self.frames.len(), "execute");
            let mut next = ip + 1;

            match instruction {
                Instruction::PushLiteral(value) => self.push(value.clone())?,
                Instruction::LocalReference(slot) => {
                    let value = self.local(*slot)?.clone();
                    self.push(value)?;
                }
                Instruction::GlobalReference(id) => {
                    let value = globals
                        .get(*id)
                        .cloned()
                        .ok_or(RuntimeError::InvalidSlot { slot: id.0 })?;
                    self.push(value)?;
                }
                Instruction::LocalAssign(slot) => {
                    let value = self.pop(ip)?;
                    *self.local(*slot)? = value;
                }
                Instruction::GlobalAssign(id) => {
                    let value = self.pop(ip)?;
                    globals.set(*id, value)?;
                }
                Instruction::ArrayReference => {
                    let index = self.pop_index(ip)?;
                    let element = match self.pop(ip)? {
                        Value::Array(array) => array.get(index)?,
                        other => return Err(expected_array("array-reference", &other)),
                    };
                    self.push(element)?;
                }
                Instruction::LocalArrayAssign(slot) => {
                    let value = self.pop(ip)?;
                    let index = self.pop_index(ip)?;
                    store_element(self.local(*slot)?, index, value)?;
                }
                Instruction::GlobalArrayAssign(id) => {
                    let value = self.pop(ip)?;
                    let index = self.pop_index(ip)?;
                    store_element(globals.get_mut(*id)?, index, value)?;
                }
                Instruction::DeclareLocalArray { slot, element } => {
                    *self.local(*slot)? = Value::Array(ValueArray::new(element.clone()));
                }
                Instruction::Arithmetic(sign) => {
                    let right = self.pop(ip)?;
                    let left = self.pop(ip)?;
                    self.push(value::arithmetic(*sign, &left, &right)?)?;
                }
                Instruction::Negate => {
                    let operand = self.pop(ip)?;
                    self.push(value::negate(&operand)?)?;
                }
                Instruction::Not => {
                    let operand = self.pop(ip)?;
                    self.push(value::not(&operand)?)?;
                }
                Instruction::IntegerToReal => {
                    let operand = self.pop(ip)?;
                    self.push(value::widen_to_real(operand))?;
                }
                Instruction::Branch(target) => next = *target,
                Instruction::ConditionalBranch(target) => {
                    if self.pop_condition(ip, "conditional-branch")? {
                        next = *target;
                    }
                }
                Instruction::InvertedConditionalBranch(target) => {
                    if !self.pop_condition(ip, "inverted-conditional-branch")? {
                        next = *target;
                    }
                }
                Instruction::NewStackFrame(callee) => self.pending.push(*callee),
                Instruction::SetReturnAddr(addr) => self.activate_frame(&program, ip, *addr)?,
                Instruction::Native { id, argc } => {
                    let frame = self.frames.pop().ok_or(RuntimeError::NoPendingFrame { ip })?;
                    if frame.callee != Callee::Native(*id) {
                        return Err(RuntimeError::FrameMismatch { ip });
                    }
                    let args = self.pop_n(*argc, ip)?;
                    if natives.name(*id).is_none() {
                        return Err(RuntimeError::UnknownNative { id: id.0 });
                    }
                    let answer = match natives.invoke(*id, args) {
                        Ok(answer) => answer,
                        Err(source) => {
                            return Err(RuntimeError::Native {
                                name: natives.name(*id).unwrap_or_default().to_string(),
                                source,
                            })
                        }
                    };
                    next = frame.return_addr.unwrap_or(next);
                    match answer {
                        NativeReturn::Value(value) => self.push(value)?,
                        NativeReturn::Suspend(value) => {
                            self.push(value)?;
                            self.ip = next;
                            return Ok(RunOutcome::Suspended);
                        }
                    }
                }
                Instruction::Return => {
                    let result = self.pop(ip)?;
                    let frame = self
                        .frames
                        .pop()
                        .ok_or(RuntimeError::ReturnWithoutFrame { ip })?;
                    if frame.is_native() {
                        return Err(RuntimeError::FrameMismatch { ip });
                    }
                    self.stack.truncate(frame.stack_base);
                    match frame.return_addr {
                        None => return Ok(RunOutcome::Finished(result)),
                        Some(addr) => {
                            self.push(result)?;
                            next = addr;
                        }
                    }
                }
                Instruction::Pop => {
                    self.pop(ip)?;
                }
                Instruction::DoNothing => {}
                Instruction::Placeholder => {
                    return Err(RuntimeError::UnresolvedInstruction { ip });
                }
            }

            self.ip = next;
        }
    }

    /// `set-return-addr`: bind the pending frame's arguments and make it active
    fn activate_frame(&mut self, program: &Program, ip: usize, addr: usize) -> Result<(), RuntimeError> {
        let callee = self.pending.pop().ok_or(RuntimeError::NoPendingFrame { ip })?;
        let frame = match callee {
            Callee::Function(id) => {
                let function = program.function(id).ok_or_else(|| RuntimeError::UnknownFunction {
                    name: format!("<function {}>", id),
                })?;
                if self.frames.len() >= self.config.max_call_depth {
                    return Err(RuntimeError::CallStackOverflow {
                        limit: self.config.max_call_depth,
                    });
                }
                let mut locals = self.pop_n(function.param_count, ip)?;
                locals.resize(function.local_count, Value::Nothing);
                CallFrame {
                    callee,
                    locals,
                    return_addr: Some(addr),
                    stack_base: self.stack.len(),
                }
            }
            Callee::Native(_) => CallFrame {
                callee,
                locals: Vec::new(),
                return_addr: Some(addr),
                stack_base: self.stack.len(),
            },
        };
        self.frames.push(frame);
        Ok(())
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.max_operand_stack {
            return Err(RuntimeError::OperandStackOverflow {
                limit: self.config.max_operand_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Lowest stack index the running code may pop
    fn floor(&self) -> usize {
        self.frames.last().map(|f| f.stack_base).unwrap_or(0)
    }

    fn pop(&mut self, ip: usize) -> Result<Value, RuntimeError> {
        if self.stack.len() <= self.floor() {
            return Err(RuntimeError::StackUnderflow { ip });
        }
        self.stack.pop().ok_or(RuntimeError::StackUnderflow { ip })
    }

    /// Pop `n` values, returned in push order
    fn pop_n(&mut self, n: usize, ip: usize) -> Result<Vec<Value>, RuntimeError> {
        let available = self.stack.len().saturating_sub(self.floor());
        if available < n {
            return Err(RuntimeError::StackUnderflow { ip });
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_index(&mut self, ip: usize) -> Result<i32, RuntimeError> {
        match self.pop(ip)? {
            Value::Integer(index) => Ok(index),
            other => Err(RuntimeError::UnexpectedType {
                op: "array index",
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }

    fn pop_condition(&mut self, ip: usize, op: &'static str) -> Result<bool, RuntimeError> {
        match self.pop(ip)? {
            Value::Boolean(b) => Ok(b),
            other => Err(RuntimeError::UnexpectedType {
                op,
                expected: "boolean",
                found: other.type_name(),
            }),
        }
    }

    fn local(&mut self, slot: usize) -> Result<&mut Value, RuntimeError> {
        self.frames
            .last_mut()
            .and_then(|frame| frame.locals.get_mut(slot))
            .ok_or(RuntimeError::InvalidSlot { slot })
    }
}

fn store_element(target: &mut Value, index: i32, value: Value) -> Result<(), RuntimeError> {
    match target {
        Value::Array(array) => array.set(index, value),
        other => Err(expected_array("array-assign", other)),
    }
}

fn expected_array(op: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::UnexpectedType {
        op,
        expected: "array",
        found: found.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::native::NativeTable;
    use crate::ast::{self, ArithmeticSign, Expr, FunctionDecl, Stmt};
    use crate::compiler::compile_program;
    use crate::symbol::GlobalScope;
    use crate::types::Type;
    use pretty_assertions::assert_eq;

    fn vm_for(functions: Vec<FunctionDecl>) -> (Vm, Globals) {
        let program = compile_program(
            GlobalScope::new(),
            &ast::Program {
                globals: vec![],
                functions,
            },
        )
        .expect("Compilation failed");
        let globals = Globals::new(&program.scope);
        (Vm::new(Arc::new(program), VmConfig::default()), globals)
    }

    #[test]
    fn test_return_one_plus_one() {
        let (mut vm, mut globals) = vm_for(vec![FunctionDecl::new(
            "f",
            vec![],
            Type::Integer,
            vec![Stmt::Return(Some(Expr::binary(
                ArithmeticSign::Add,
                Expr::int(1),
                Expr::int(1),
            )))],
        )]);
        let outcome = vm
            .call("f", vec![], &mut globals, &mut NativeTable::new())
            .unwrap();
        assert_eq!(outcome, RunOutcome::Finished(Value::Integer(2)));
        assert_eq!(vm.call_depth(), 0);
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn test_void_function_returns_nothing() {
        let (mut vm, mut globals) = vm_for(vec![FunctionDecl::new(
            "f",
            vec![],
            Type::Nothing,
            vec![Stmt::DoNothing],
        )]);
        let outcome = vm
            .call("f", vec![], &mut globals, &mut NativeTable::new())
            .unwrap();
        assert_eq!(outcome.finished(), Some(Value::Nothing));
    }

    #[test]
    fn test_error_resets_to_idle() {
        let (mut vm, mut globals) = vm_for(vec![FunctionDecl::new(
            "f",
            vec![],
            Type::Integer,
            vec![Stmt::Return(Some(Expr::binary(
                ArithmeticSign::Divide,
                Expr::int(1),
                Expr::int(0),
            )))],
        )]);
        let err = vm
            .call("f", vec![], &mut globals, &mut NativeTable::new())
            .unwrap_err();
        assert_eq!(err, RuntimeError::DivideByZero);
        assert_eq!(vm.call_depth(), 0);
        assert_eq!(vm.stack_len(), 0);
        assert!(!vm.is_suspended());
    }

    #[test]
    fn test_resume_without_suspension() {
        let (mut vm, mut globals) = vm_for(vec![]);
        assert_eq!(
            vm.resume(&mut globals, &mut NativeTable::new()),
            Err(RuntimeError::NotSuspended)
        );
    }

    #[test]
    fn test_unknown_entry() {
        let (mut vm, mut globals) = vm_for(vec![]);
        let err = vm
            .start(5, vec![], &mut globals, &mut NativeTable::new())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownFunction { .. }));
    }
}
