//! Statement compilation

use crate::ast::{ElseBranch, IfStmt, LocalDecl, Stmt};
use crate::bytecode::Instruction;
use crate::compiler::{CompilationContext, CompileError, LoopContext, Variable};
use crate::types::Type;
use crate::value::Value;

impl CompilationContext<'_> {
    /// Compile a statement list in order
    pub fn compile_block(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    /// Compile a statement
    pub(super) fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Set { name, value } => self.compile_set(name, value),
            Stmt::SetIndexed { name, index, value } => self.compile_set_indexed(name, index, value),
            Stmt::Call(call) => {
                self.compile_call(call)?;
                // Every call leaves one value; statements discard it
                self.emit(Instruction::Pop);
                Ok(())
            }
            Stmt::DoNothing => {
                self.emit(Instruction::DoNothing);
                Ok(())
            }
            Stmt::ExitWhen(cond) => self.compile_exitwhen(cond),
            Stmt::If(if_stmt) => self.compile_if(if_stmt),
            Stmt::Local(decl) => self.compile_local(decl),
            Stmt::Loop(body) => self.compile_loop(body),
            Stmt::Return(value) => {
                match value {
                    Some(expr) => {
                        let target = self.return_type.clone();
                        self.compile_expr_into(expr, &target)?
                    }
                    None => {
                        self.emit(Instruction::PushLiteral(Value::Nothing));
                    }
                }
                self.emit(Instruction::Return);
                Ok(())
            }
        }
    }

    fn compile_set(&mut self, name: &str, value: &crate::ast::Expr) -> Result<(), CompileError> {
        let (store, target) = match self.resolve(name)? {
            var if var.ty().is_array() => {
                return Err(CompileError::MissingArrayIndex {
                    function: self.function_name(),
                    name: name.to_string(),
                })
            }
            Variable::Global { constant: true, .. } if !self.allow_constant_writes => {
                return Err(CompileError::AssignToConstant {
                    function: self.function_name(),
                    name: name.to_string(),
                })
            }
            Variable::Local { slot, ty } => (Instruction::LocalAssign(slot), ty.clone()),
            Variable::Global { id, ty, .. } => (Instruction::GlobalAssign(id), ty.clone()),
        };
        self.compile_expr_into(value, &target)?;
        self.emit(store);
        Ok(())
    }

    /// Index first, then value; the VM pops value then index
    fn compile_set_indexed(
        &mut self,
        name: &str,
        index: &crate::ast::Expr,
        value: &crate::ast::Expr,
    ) -> Result<(), CompileError> {
        let (store, element) = match self.resolve(name)? {
            var if !var.ty().is_array() => {
                return Err(CompileError::NotAnArray {
                    function: self.function_name(),
                    name: name.to_string(),
                })
            }
            Variable::Global { constant: true, .. } if !self.allow_constant_writes => {
                return Err(CompileError::AssignToConstant {
                    function: self.function_name(),
                    name: name.to_string(),
                })
            }
            Variable::Local { slot, ty } => (
                Instruction::LocalArrayAssign(slot),
                ty.element_type().cloned().unwrap_or(Type::Nothing),
            ),
            Variable::Global { id, ty, .. } => (
                Instruction::GlobalArrayAssign(id),
                ty.element_type().cloned().unwrap_or(Type::Nothing),
            ),
        };
        self.compile_expr(index)?;
        self.compile_expr_into(value, &element)?;
        self.emit(store);
        Ok(())
    }

    fn compile_local(&mut self, decl: &LocalDecl) -> Result<(), CompileError> {
        if let Some(element) = decl.ty.element_type() {
            if !element.is_valid_element() {
                return Err(CompileError::NestedArrayType {
                    function: self.function_name(),
                    name: decl.name.clone(),
                });
            }
            if decl.init.is_some() {
                return Err(CompileError::ArrayInitializer {
                    function: self.function_name(),
                    name: decl.name.clone(),
                });
            }
            let slot = self.declare_local(decl)?;
            self.emit(Instruction::DeclareLocalArray {
                slot,
                element: element.clone(),
            });
            return Ok(());
        }

        // The initializer is compiled before the name exists, so it still
        // resolves a global of the same name.
        match &decl.init {
            Some(init) => self.compile_expr_into(init, &decl.ty)?,
            None => {
                self.emit(Instruction::PushLiteral(decl.ty.null_value()));
            }
        }
        let slot = self.declare_local(decl)?;
        self.emit(Instruction::LocalAssign(slot));
        Ok(())
    }

    fn declare_local(&mut self, decl: &LocalDecl) -> Result<usize, CompileError> {
        self.locals
            .declare(&decl.name, decl.ty.clone())
            .ok_or_else(|| CompileError::DuplicateLocal {
                function: self.function_name(),
                name: decl.name.clone(),
            })
    }

    /// `cond; inverted-conditional-branch else; then; [branch end; else]`
    fn compile_if(&mut self, if_stmt: &IfStmt) -> Result<(), CompileError> {
        self.compile_expr(&if_stmt.cond)?;
        let skip_then = self.bytecode.reserve();

        self.compile_block(&if_stmt.then_body)?;

        match &if_stmt.else_branch {
            None => {
                let after = self.bytecode.current_address();
                self.bytecode
                    .patch(skip_then, Instruction::InvertedConditionalBranch(after));
            }
            Some(else_branch) => {
                let skip_else = self.bytecode.reserve();
                let else_start = self.bytecode.current_address();
                self.bytecode
                    .patch(skip_then, Instruction::InvertedConditionalBranch(else_start));

                match else_branch {
                    ElseBranch::ElseIf(nested) => self.compile_if(nested)?,
                    ElseBranch::Else(body) => self.compile_block(body)?,
                }

                let end = self.bytecode.current_address();
                self.bytecode.patch(skip_else, Instruction::Branch(end));
            }
        }
        Ok(())
    }

    /// `start: body; branch start; end:` with every exitwhen patched to
    /// `conditional-branch end`
    fn compile_loop(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        let start = self.bytecode.current_address();
        self.loops.push(LoopContext {
            start,
            exit_patches: Vec::new(),
        });

        let result = self.compile_block(body);
        let context = self.loops.pop();
        result?;

        let Some(context) = context else {
            return Ok(());
        };
        self.emit(Instruction::Branch(context.start));
        let end = self.bytecode.current_address();
        for exit in context.exit_patches {
            self.bytecode.patch(exit, Instruction::ConditionalBranch(end));
        }
        Ok(())
    }

    fn compile_exitwhen(&mut self, cond: &crate::ast::Expr) -> Result<(), CompileError> {
        if self.loops.is_empty() {
            return Err(CompileError::ExitWhenOutsideLoop {
                function: self.function_name(),
            });
        }
        self.compile_expr(cond)?;
        let exit = self.bytecode.reserve();
        if let Some(innermost) = self.loops.last_mut() {
            innermost.exit_patches.push(exit);
        }
        Ok(())
    }
}
