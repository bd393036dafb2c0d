//! Expression compilation

use crate::ast::{CallExpr, Expr, Literal, LogicalOp};
use crate::bytecode::{Callee, Instruction};
use crate::compiler::{CompilationContext, CompileError, Variable};
use crate::symbol::GlobalSymbol;
use crate::types::Type;
use crate::value::{FunctionRef, Value};
use std::sync::Arc;

impl CompilationContext<'_> {
    /// Compile an expression. Leaves exactly one value on the stack.
    pub(super) fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal(lit) => {
                self.emit(Instruction::PushLiteral(literal_value(lit)));
                Ok(())
            }
            Expr::Reference(name) => {
                let load = match self.resolve(name)? {
                    var if var.ty().is_array() => {
                        return Err(CompileError::MissingArrayIndex {
                            function: self.function_name(),
                            name: name.clone(),
                        })
                    }
                    Variable::Local { slot, .. } => Instruction::LocalReference(slot),
                    Variable::Global { id, .. } => Instruction::GlobalReference(id),
                };
                self.emit(load);
                Ok(())
            }
            Expr::ArrayRef { name, index } => {
                let load = match self.resolve(name)? {
                    var if !var.ty().is_array() => {
                        return Err(CompileError::NotAnArray {
                            function: self.function_name(),
                            name: name.clone(),
                        })
                    }
                    Variable::Local { slot, .. } => Instruction::LocalReference(slot),
                    Variable::Global { id, .. } => Instruction::GlobalReference(id),
                };
                self.emit(load);
                self.compile_expr(index)?;
                self.emit(Instruction::ArrayReference);
                Ok(())
            }
            Expr::Call(call) => self.compile_call(call),
            Expr::FunctionRef(name) => self.compile_function_ref(name),
            Expr::Arithmetic { sign, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(Instruction::Arithmetic(*sign));
                Ok(())
            }
            Expr::Logical { op, left, right } => self.compile_logical(*op, left, right),
            Expr::Negate(operand) => {
                self.compile_expr(operand)?;
                self.emit(Instruction::Negate);
                Ok(())
            }
            Expr::Not(operand) => {
                self.compile_expr(operand)?;
                self.emit(Instruction::Not);
                Ok(())
            }
        }
    }

    /// Compile a value headed for a slot of type `target`
    ///
    /// Integers stored into `real` slots are widened: literals at compile
    /// time, anything else by `integer-to-real`.
    pub(super) fn compile_expr_into(&mut self, expr: &Expr, target: &Type) -> Result<(), CompileError> {
        if *target != Type::Real {
            return self.compile_expr(expr);
        }
        match expr {
            Expr::Literal(Literal::Integer(i)) => {
                self.emit(Instruction::PushLiteral(Value::Real(*i as f32)));
            }
            Expr::Literal(Literal::Real(_)) => self.compile_expr(expr)?,
            _ => {
                self.compile_expr(expr)?;
                self.emit(Instruction::IntegerToReal);
            }
        }
        Ok(())
    }

    /// Compile a call to a user function or native
    ///
    /// ```text
    /// new-stack-frame callee
    /// <args, left to right>
    /// set-return-addr after
    /// branch entry | native id argc
    /// after:
    /// ```
    pub(super) fn compile_call(&mut self, call: &CallExpr) -> Result<(), CompileError> {
        // Natives take their arguments as given; user functions widen to
        // their declared parameter types
        let (callee, arity, params, entry) = match self.scope.lookup(&call.name) {
            Some(GlobalSymbol::Function(id)) => {
                let Some(function) = self.scope.function(id) else {
                    return Err(self.undefined_function(&call.name));
                };
                (
                    Callee::Function(id),
                    function.param_count(),
                    function.params.clone(),
                    Some(function.entry),
                )
            }
            Some(GlobalSymbol::Native(id)) => {
                let Some(native) = self.scope.native(id) else {
                    return Err(self.undefined_function(&call.name));
                };
                (Callee::Native(id), native.arity, Vec::new(), None)
            }
            Some(GlobalSymbol::Global(_)) | None => {
                return Err(self.undefined_function(&call.name))
            }
        };

        if call.args.len() != arity {
            return Err(CompileError::ArityMismatch {
                function: self.function_name(),
                callee: call.name.clone(),
                expected: arity,
                found: call.args.len(),
            });
        }

        self.emit(Instruction::NewStackFrame(callee));
        for (index, arg) in call.args.iter().enumerate() {
            match params.get(index) {
                Some(ty) => self.compile_expr_into(arg, ty)?,
                None => self.compile_expr(arg)?,
            }
        }
        let after = self.bytecode.current_address() + 2;
        self.emit(Instruction::SetReturnAddr(after));
        match (callee, entry) {
            (Callee::Native(id), _) => {
                self.emit(Instruction::Native { id, argc: arity });
            }
            (Callee::Function(_), Some(entry)) => {
                self.emit(Instruction::Branch(entry));
            }
            (Callee::Function(_), None) => return Err(self.undefined_function(&call.name)),
        }
        Ok(())
    }

    fn compile_function_ref(&mut self, name: &str) -> Result<(), CompileError> {
        let Some(function) = self.scope.function_by_name(name) else {
            return Err(self.undefined_function(name));
        };
        let code = FunctionRef {
            id: function.id,
            name: Arc::from(name),
            entry: function.entry,
        };
        self.emit(Instruction::PushLiteral(Value::Code(Some(code))));
        Ok(())
    }

    /// Short-circuit `and` / `or`
    ///
    /// ```text
    /// and:  left; inverted-conditional-branch F; right; branch end; F: push false; end:
    /// or:   left; conditional-branch T; right; branch end; T: push true; end:
    /// ```
    fn compile_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        let short = self.bytecode.reserve();
        self.compile_expr(right)?;
        let skip = self.bytecode.reserve();

        let target = self.bytecode.current_address();
        let (branch, value) = match op {
            LogicalOp::And => (Instruction::InvertedConditionalBranch(target), false),
            LogicalOp::Or => (Instruction::ConditionalBranch(target), true),
        };
        self.bytecode.patch(short, branch);
        self.emit(Instruction::PushLiteral(Value::Boolean(value)));

        let end = self.bytecode.current_address();
        self.bytecode.patch(skip, Instruction::Branch(end));
        Ok(())
    }

    fn undefined_function(&self, name: &str) -> CompileError {
        CompileError::UndefinedFunction {
            function: self.function_name(),
            name: name.to_string(),
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Real(r) => Value::Real(*r),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::String(s) => Value::string(s),
        Literal::Null => Value::Handle(None),
    }
}
