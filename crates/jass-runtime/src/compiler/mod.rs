//! AST to bytecode compiler
//!
//! Compiles every function of a program into one shared instruction array.
//! - Function `i` owns a one-instruction entry stub at address `i`, patched to
//!   `branch <body>` once the body is emitted, so calls to functions declared
//!   later in the source resolve without a second pass
//! - Expressions leave exactly one value on the stack
//! - Locals are tracked by slot in a per-function [`LocalTable`]
//! - Globals are tracked by [`GlobalId`]

mod expr;
mod stmt;

use crate::ast::{self, FunctionDecl, Stmt};
use crate::bytecode::{Bytecode, Instruction};
use crate::program::{CompiledFunction, Program};
use crate::symbol::{
    FunctionDescriptor, GlobalId, GlobalScope, LocalTable, SymbolError, INIT_FUNCTION,
};
use crate::types::Type;
use crate::value::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Compile-time failure. Aborts compilation of the named function.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("in '{function}': undefined identifier '{name}'")]
    UndefinedIdentifier { function: String, name: String },
    #[error("in '{function}': undefined function '{name}'")]
    UndefinedFunction { function: String, name: String },
    #[error("in '{function}': '{name}' is not an array")]
    NotAnArray { function: String, name: String },
    #[error("in '{function}': array '{name}' used without an index")]
    MissingArrayIndex { function: String, name: String },
    #[error("in '{function}': array '{name}' cannot have an initializer")]
    ArrayInitializer { function: String, name: String },
    #[error("in '{function}': '{name}' has an invalid array element type")]
    NestedArrayType { function: String, name: String },
    #[error("in '{function}': cannot assign to constant '{name}'")]
    AssignToConstant { function: String, name: String },
    #[error("in '{function}': '{name}' is already declared in this function")]
    DuplicateLocal { function: String, name: String },
    #[error("in '{function}': '{callee}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        function: String,
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("in '{function}': exitwhen outside of a loop")]
    ExitWhenOutsideLoop { function: String },
    #[error("function '{function}' has a body but was never declared")]
    MissingFunction { function: String },
    #[error("function '{function}' was declared but has no body")]
    MissingFunctionBody { function: String },
    #[error("in '{function}': unresolved branch at {address}")]
    UnresolvedBranch { function: String, address: usize },
    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

/// Loop context for exitwhen
#[derive(Debug, Clone)]
pub(super) struct LoopContext {
    pub(super) start: usize,
    /// Placeholders to patch with a branch past the loop
    pub(super) exit_patches: Vec<usize>,
}

/// A resolved variable
#[derive(Debug, Clone, Copy)]
pub(super) enum Variable<'a> {
    Local { slot: usize, ty: &'a Type },
    Global { id: GlobalId, ty: &'a Type, constant: bool },
}

impl Variable<'_> {
    pub(super) fn ty(&self) -> &Type {
        match self {
            Variable::Local { ty, .. } | Variable::Global { ty, .. } => ty,
        }
    }
}

/// State for compiling one function body
///
/// Owns that function's local table and loop stack; borrows the shared
/// instruction array and the read-only global scope.
pub struct CompilationContext<'a> {
    pub(super) scope: &'a GlobalScope,
    pub(super) bytecode: &'a mut Bytecode,
    pub(super) function: &'a str,
    pub(super) locals: LocalTable,
    pub(super) loops: Vec<LoopContext>,
    /// Constant globals are writable only from the global initializer
    pub(super) allow_constant_writes: bool,
    /// Declared return type; `return` values are widened to it
    pub(super) return_type: Type,
}

impl<'a> CompilationContext<'a> {
    pub fn new(
        scope: &'a GlobalScope,
        bytecode: &'a mut Bytecode,
        function: &'a str,
        locals: LocalTable,
    ) -> Self {
        Self {
            scope,
            bytecode,
            function,
            locals,
            loops: Vec::new(),
            allow_constant_writes: false,
            return_type: Type::Nothing,
        }
    }

    /// Resolve a variable: locals first, then globals
    pub(super) fn resolve(&self, name: &str) -> Result<Variable<'_>, CompileError> {
        if let Some(local) = self.locals.get(name) {
            return Ok(Variable::Local {
                slot: local.slot,
                ty: &local.ty,
            });
        }
        if let Some(global) = self.scope.global_by_name(name) {
            return Ok(Variable::Global {
                id: global.id,
                ty: &global.ty,
                constant: global.constant,
            });
        }
        Err(CompileError::UndefinedIdentifier {
            function: self.function.to_string(),
            name: name.to_string(),
        })
    }

    pub(super) fn emit(&mut self, instruction: Instruction) -> usize {
        self.bytecode.emit(instruction)
    }

    pub(super) fn function_name(&self) -> String {
        self.function.to_string()
    }
}

/// Compiler state
pub struct Compiler {
    scope: GlobalScope,
    bytecode: Bytecode,
}

impl Compiler {
    /// Create a compiler over a fully populated global scope
    pub fn new(scope: GlobalScope) -> Self {
        Self {
            scope,
            bytecode: Bytecode::new(),
        }
    }

    /// Compile every function of `program`
    ///
    /// Every function registered in the scope must have a body in `program`
    /// (the `<globals>` initializer is synthesised from the global
    /// declarations).
    pub fn compile(mut self, program: &ast::Program) -> Result<Program, CompileError> {
        let function_count = self.scope.function_count();
        for _ in 0..function_count {
            self.bytecode.reserve();
        }

        let mut compiled: Vec<Option<CompiledFunction>> = vec![None; function_count];

        for decl in &program.functions {
            let descriptor = self.scope.function_by_name(&decl.name).cloned().ok_or_else(|| {
                CompileError::MissingFunction {
                    function: decl.name.clone(),
                }
            })?;
            let function = self.compile_function(&descriptor, decl, false)?;
            compiled[descriptor.id.0] = Some(function);
        }

        if let Some(descriptor) = self.scope.function_by_name(INIT_FUNCTION).cloned() {
            let init = self.globals_initializer(program)?;
            let function = self.compile_function(&descriptor, &init, true)?;
            compiled[descriptor.id.0] = Some(function);
        } else {
            self.check_global_types(program)?;
        }

        let functions = compiled
            .into_iter()
            .zip(self.scope.functions())
            .map(|(function, descriptor)| {
                function.ok_or_else(|| CompileError::MissingFunctionBody {
                    function: descriptor.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Program {
            bytecode: self.bytecode,
            scope: self.scope,
            functions,
        })
    }

    /// Compile one function body and patch its entry stub
    fn compile_function(
        &mut self,
        descriptor: &FunctionDescriptor,
        decl: &FunctionDecl,
        initializer: bool,
    ) -> Result<CompiledFunction, CompileError> {
        let locals = LocalTable::with_params(&decl.params).map_err(|name| {
            CompileError::DuplicateLocal {
                function: decl.name.clone(),
                name,
            }
        })?;

        let body = self.bytecode.current_address();
        let local_count = {
            let mut ctx =
                CompilationContext::new(&self.scope, &mut self.bytecode, &decl.name, locals);
            ctx.allow_constant_writes = initializer;
            ctx.return_type = decl.return_type.clone();
            ctx.compile_block(&decl.body)?;

            // Implicit return for bodies that fall off the end
            ctx.emit(Instruction::PushLiteral(Value::Nothing));
            ctx.emit(Instruction::Return);
            ctx.locals.slot_count()
        };
        let end = self.bytecode.current_address();

        if let Some(&address) = self.bytecode.unresolved(body..end).first() {
            return Err(CompileError::UnresolvedBranch {
                function: decl.name.clone(),
                address,
            });
        }
        self.bytecode
            .patch(descriptor.entry, Instruction::Branch(body));

        debug!(
            function = %decl.name,
            entry = descriptor.entry,
            body,
            locals = local_count,
            "compiled function"
        );

        Ok(CompiledFunction {
            id: descriptor.id,
            name: Arc::from(decl.name.as_str()),
            entry: descriptor.entry,
            body,
            end,
            param_count: descriptor.param_count(),
            local_count,
        })
    }

    /// Array globals must hold valid element types
    fn check_global_types(&self, program: &ast::Program) -> Result<(), CompileError> {
        for global in &program.globals {
            if let Some(element) = global.ty.element_type() {
                if !element.is_valid_element() {
                    return Err(CompileError::NestedArrayType {
                        function: INIT_FUNCTION.to_string(),
                        name: global.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Body of `<globals>`: one assignment per initialised global, in
    /// declaration order
    fn globals_initializer(&self, program: &ast::Program) -> Result<FunctionDecl, CompileError> {
        self.check_global_types(program)?;
        let mut body = Vec::new();
        for global in &program.globals {
            let Some(init) = &global.init else { continue };
            if global.ty.is_array() {
                return Err(CompileError::ArrayInitializer {
                    function: INIT_FUNCTION.to_string(),
                    name: global.name.clone(),
                });
            }
            body.push(Stmt::set(global.name.clone(), init.clone()));
        }
        Ok(FunctionDecl::new(INIT_FUNCTION, Vec::new(), Type::Nothing, body))
    }
}

/// Register `program`'s symbols in `scope` and compile it
pub fn compile_program(
    mut scope: GlobalScope,
    program: &ast::Program,
) -> Result<Program, CompileError> {
    crate::symbol::declare_program(&mut scope, program)?;
    Compiler::new(scope).compile(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArithmeticSign, ElseBranch, Expr, GlobalDecl, LogicalOp, Param};
    use crate::bytecode::Callee;
    use crate::symbol::{FunctionId, NativeId};
    use pretty_assertions::assert_eq;

    fn function(name: &str, body: Vec<Stmt>) -> FunctionDecl {
        FunctionDecl::new(name, vec![], Type::Nothing, body)
    }

    fn compile_functions(functions: Vec<FunctionDecl>) -> Program {
        compile_with(GlobalScope::new(), vec![], functions).expect("Compilation failed")
    }

    fn compile_with(
        scope: GlobalScope,
        globals: Vec<GlobalDecl>,
        functions: Vec<FunctionDecl>,
    ) -> Result<Program, CompileError> {
        compile_program(scope, &ast::Program { globals, functions })
    }

    fn body_of<'p>(program: &'p Program, name: &str) -> &'p [Instruction] {
        let f = program.function_by_name(name).unwrap();
        &program.bytecode.instructions()[f.body..f.end]
    }

    fn global(name: &str, ty: Type, init: Option<Expr>) -> GlobalDecl {
        GlobalDecl {
            name: name.into(),
            ty,
            constant: false,
            init,
        }
    }

    #[test]
    fn test_return_one_plus_one() {
        let program = compile_functions(vec![FunctionDecl::new(
            "f",
            vec![],
            Type::Integer,
            vec![Stmt::Return(Some(Expr::binary(
                ArithmeticSign::Add,
                Expr::int(1),
                Expr::int(1),
            )))],
        )]);

        assert_eq!(program.bytecode.get(0), Some(&Instruction::Branch(1)));
        assert_eq!(
            body_of(&program, "f"),
            &[
                Instruction::PushLiteral(Value::Integer(1)),
                Instruction::PushLiteral(Value::Integer(1)),
                Instruction::Arithmetic(ArithmeticSign::Add),
                Instruction::Return,
                Instruction::PushLiteral(Value::Nothing),
                Instruction::Return,
            ]
        );
    }

    #[test]
    fn test_local_without_initializer_gets_typed_null() {
        let program = compile_functions(vec![function(
            "f",
            vec![Stmt::local("s", Type::String, None)],
        )]);
        let body = body_of(&program, "f");
        assert_eq!(body[0], Instruction::PushLiteral(Value::string("")));
        assert_eq!(body[1], Instruction::LocalAssign(0));
        assert_eq!(program.function_by_name("f").unwrap().local_count, 1);
    }

    #[test]
    fn test_real_slots_widen_integers() {
        let program = compile_functions(vec![FunctionDecl::new(
            "f",
            vec![Param::new("n", Type::Integer)],
            Type::Real,
            vec![
                Stmt::local("r", Type::Real, Some(Expr::int(1))),
                Stmt::set("r", Expr::var("n")),
                Stmt::Return(Some(Expr::var("r"))),
            ],
        )]);
        assert_eq!(
            body_of(&program, "f"),
            &[
                Instruction::PushLiteral(Value::Real(1.0)),
                Instruction::LocalAssign(1),
                Instruction::LocalReference(0),
                Instruction::IntegerToReal,
                Instruction::LocalAssign(1),
                Instruction::LocalReference(1),
                Instruction::IntegerToReal,
                Instruction::Return,
                Instruction::PushLiteral(Value::Nothing),
                Instruction::Return,
            ]
        );
    }

    #[test]
    fn test_local_array_declaration() {
        let program = compile_functions(vec![function(
            "f",
            vec![Stmt::local("xs", Type::array_of(Type::Integer), None)],
        )]);
        assert_eq!(
            body_of(&program, "f")[0],
            Instruction::DeclareLocalArray {
                slot: 0,
                element: Type::Integer
            }
        );
    }

    #[test]
    fn test_local_shadows_global() {
        let program = compile_with(
            GlobalScope::new(),
            vec![global("x", Type::Integer, None)],
            vec![function(
                "f",
                vec![
                    Stmt::set("x", Expr::int(1)),
                    Stmt::local("x", Type::Integer, Some(Expr::var("x"))),
                    Stmt::set("x", Expr::int(2)),
                ],
            )],
        )
        .unwrap();

        let body = body_of(&program, "f");
        assert_eq!(body[1], Instruction::GlobalAssign(GlobalId(0)));
        // The initializer still sees the global
        assert_eq!(body[2], Instruction::GlobalReference(GlobalId(0)));
        assert_eq!(body[3], Instruction::LocalAssign(0));
        assert_eq!(body[5], Instruction::LocalAssign(0));
    }

    #[test]
    fn test_forward_call_resolves() {
        let program = compile_functions(vec![
            function("a", vec![Stmt::call("b", vec![])]),
            function("b", vec![]),
        ]);

        let body = body_of(&program, "a");
        let b = program.function_by_name("b").unwrap();
        assert_eq!(
            &body[..4],
            &[
                Instruction::NewStackFrame(Callee::Function(FunctionId(1))),
                Instruction::SetReturnAddr(program.function_by_name("a").unwrap().body + 3),
                Instruction::Branch(b.entry),
                Instruction::Pop,
            ]
        );
        assert_eq!(program.bytecode.get(b.entry), Some(&Instruction::Branch(b.body)));
    }

    #[test]
    fn test_native_call() {
        let mut scope = GlobalScope::new();
        scope.register_native("Print", NativeId(7), 1).unwrap();
        let program = compile_with(
            scope,
            vec![],
            vec![function("f", vec![Stmt::call("Print", vec![Expr::string("hi")])])],
        )
        .unwrap();

        let body = body_of(&program, "f");
        let set_return = body
            .iter()
            .position(|i| matches!(i, Instruction::SetReturnAddr(_)))
            .unwrap();
        assert_eq!(
            &body[..5],
            &[
                Instruction::NewStackFrame(Callee::Native(NativeId(7))),
                Instruction::PushLiteral(Value::string("hi")),
                Instruction::SetReturnAddr(program.functions[0].body + set_return + 2),
                Instruction::Native {
                    id: NativeId(7),
                    argc: 1
                },
                Instruction::Pop,
            ]
        );
    }

    #[test]
    fn test_loop_with_exitwhen() {
        let program = compile_functions(vec![function(
            "f",
            vec![Stmt::Loop(vec![Stmt::ExitWhen(Expr::boolean(true))])],
        )]);
        let f = program.function_by_name("f").unwrap();
        let start = f.body;
        assert_eq!(
            &body_of(&program, "f")[..3],
            &[
                Instruction::PushLiteral(Value::Boolean(true)),
                Instruction::ConditionalBranch(start + 3),
                Instruction::Branch(start),
            ]
        );
    }

    #[test]
    fn test_if_else_patches_both_branches() {
        let program = compile_functions(vec![function(
            "f",
            vec![Stmt::if_then(
                Expr::boolean(true),
                vec![Stmt::DoNothing],
                Some(ElseBranch::Else(vec![Stmt::DoNothing, Stmt::DoNothing])),
            )],
        )]);
        let b = program.function_by_name("f").unwrap().body;
        assert_eq!(
            &body_of(&program, "f")[..6],
            &[
                Instruction::PushLiteral(Value::Boolean(true)),
                Instruction::InvertedConditionalBranch(b + 4),
                Instruction::DoNothing,
                Instruction::Branch(b + 6),
                Instruction::DoNothing,
                Instruction::DoNothing,
            ]
        );
    }

    #[test]
    fn test_and_short_circuits() {
        let program = compile_functions(vec![FunctionDecl::new(
            "f",
            vec![],
            Type::Boolean,
            vec![Stmt::Return(Some(Expr::logical(
                LogicalOp::And,
                Expr::boolean(false),
                Expr::boolean(true),
            )))],
        )]);
        let b = program.function_by_name("f").unwrap().body;
        assert_eq!(
            &body_of(&program, "f")[..5],
            &[
                Instruction::PushLiteral(Value::Boolean(false)),
                Instruction::InvertedConditionalBranch(b + 4),
                Instruction::PushLiteral(Value::Boolean(true)),
                Instruction::Branch(b + 5),
                Instruction::PushLiteral(Value::Boolean(false)),
            ]
        );
    }

    #[test]
    fn test_globals_initializer_is_synthesised() {
        let program = compile_with(
            GlobalScope::new(),
            vec![GlobalDecl {
                name: "LIMIT".into(),
                ty: Type::Integer,
                constant: true,
                init: Some(Expr::int(10)),
            }],
            vec![function("main", vec![])],
        )
        .unwrap();

        let init = program.init_function().unwrap();
        assert_eq!(init.entry, 1);
        assert_eq!(
            &program.bytecode.instructions()[init.body..init.body + 2],
            &[
                Instruction::PushLiteral(Value::Integer(10)),
                Instruction::GlobalAssign(GlobalId(0)),
            ]
        );
    }

    #[test]
    fn test_function_reference_literal() {
        let program = compile_functions(vec![
            function("cb", vec![]),
            FunctionDecl::new(
                "f",
                vec![],
                Type::Code,
                vec![Stmt::Return(Some(Expr::FunctionRef("cb".into())))],
            ),
        ]);
        match &body_of(&program, "f")[0] {
            Instruction::PushLiteral(Value::Code(Some(code))) => {
                assert_eq!(code.id, FunctionId(0));
                assert_eq!(&*code.name, "cb");
            }
            other => panic!("expected code literal, got {}", other),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_undefined_identifier() {
        let err = compile_with(
            GlobalScope::new(),
            vec![],
            vec![function("f", vec![Stmt::set("missing", Expr::int(1))])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::UndefinedIdentifier {
                function: "f".into(),
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_undefined_function() {
        let err = compile_with(
            GlobalScope::new(),
            vec![global("g", Type::Integer, None)],
            vec![function("f", vec![Stmt::call("g", vec![])])],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UndefinedFunction { name, .. } if name == "g"));
    }

    #[test]
    fn test_arity_checked_at_compile_time() {
        let err = compile_with(
            GlobalScope::new(),
            vec![],
            vec![
                FunctionDecl::new(
                    "add",
                    vec![Param::new("a", Type::Integer), Param::new("b", Type::Integer)],
                    Type::Integer,
                    vec![],
                ),
                function("f", vec![Stmt::call("add", vec![Expr::int(1)])]),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::ArityMismatch {
                function: "f".into(),
                callee: "add".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_constant_global_is_read_only_outside_initializer() {
        let err = compile_with(
            GlobalScope::new(),
            vec![GlobalDecl {
                name: "K".into(),
                ty: Type::Integer,
                constant: true,
                init: Some(Expr::int(1)),
            }],
            vec![function("f", vec![Stmt::set("K", Expr::int(2))])],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::AssignToConstant { .. }));
    }

    #[test]
    fn test_array_misuse() {
        let arrays = || vec![global("xs", Type::array_of(Type::Integer), None)];

        let err = compile_with(
            GlobalScope::new(),
            arrays(),
            vec![function("f", vec![Stmt::set("xs", Expr::int(1))])],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::MissingArrayIndex { .. }));

        let err = compile_with(
            GlobalScope::new(),
            vec![global("n", Type::Integer, None)],
            vec![function(
                "f",
                vec![Stmt::set_indexed("n", Expr::int(0), Expr::int(1))],
            )],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::NotAnArray { .. }));

        let err = compile_with(
            GlobalScope::new(),
            vec![],
            vec![function(
                "f",
                vec![Stmt::local(
                    "xs",
                    Type::array_of(Type::Integer),
                    Some(Expr::int(0)),
                )],
            )],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::ArrayInitializer { .. }));

        let err = compile_with(
            GlobalScope::new(),
            vec![global(
                "grid",
                Type::array_of(Type::array_of(Type::Integer)),
                None,
            )],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::NestedArrayType { .. }));
    }

    #[test]
    fn test_exitwhen_outside_loop() {
        let err = compile_with(
            GlobalScope::new(),
            vec![],
            vec![function("f", vec![Stmt::ExitWhen(Expr::boolean(true))])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::ExitWhenOutsideLoop {
                function: "f".into()
            }
        );
    }

    #[test]
    fn test_duplicate_local() {
        let err = compile_with(
            GlobalScope::new(),
            vec![],
            vec![function(
                "f",
                vec![
                    Stmt::local("a", Type::Integer, None),
                    Stmt::local("a", Type::Integer, None),
                ],
            )],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateLocal { name, .. } if name == "a"));
    }

    #[test]
    fn test_missing_function_body() {
        let mut scope = GlobalScope::new();
        scope
            .register_function("declared", vec![], Type::Nothing)
            .unwrap();
        let err = Compiler::new(scope)
            .compile(&ast::Program::default())
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::MissingFunctionBody {
                function: "declared".into()
            }
        );
    }

    #[test]
    fn test_body_without_registration() {
        let program = ast::Program {
            globals: vec![],
            functions: vec![function("stray", vec![])],
        };
        let err = Compiler::new(GlobalScope::new())
            .compile(&program)
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingFunction { .. }));
    }
}
