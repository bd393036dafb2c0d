//! Abstract Syntax Tree (AST) definitions
//!
//! The tree handed to the compiler by the (external) JASS parser. It is
//! assumed to be syntactically valid and type-correct; the compiler only
//! resolves names and linearises control flow.

use crate::types::Type;
use serde::{Deserialize, Serialize};

/// AST schema version
///
/// This version number is included in JSON dumps to ensure compatibility.
/// Increment when making breaking changes to the AST structure.
pub const AST_VERSION: u32 = 1;

/// A whole script: the `globals` block and every function
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub globals: Vec<GlobalDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

/// Versioned AST wrapper for JSON serialization
///
/// Used when a host hands a parsed script to the CLI or stores it on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedProgram {
    /// AST schema version
    pub ast_version: u32,
    /// The actual program AST
    #[serde(flatten)]
    pub program: Program,
}

impl VersionedProgram {
    /// Create a new versioned program wrapper
    pub fn new(program: Program) -> Self {
        Self {
            ast_version: AST_VERSION,
            program,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Program> for VersionedProgram {
    fn from(program: Program) -> Self {
        Self::new(program)
    }
}

/// Global variable declaration (`constant integer X = 5`, `unit array U`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub constant: bool,
    #[serde(default)]
    pub init: Option<Expr>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `set name = value`
    Set { name: String, value: Expr },
    /// `set name[index] = value`
    SetIndexed {
        name: String,
        index: Expr,
        value: Expr,
    },
    /// `call name(args)`
    Call(CallExpr),
    /// Explicit empty statement
    DoNothing,
    /// `exitwhen cond`
    ExitWhen(Expr),
    /// `if ... elseif ... else ... endif`
    If(IfStmt),
    /// `local type name [= init]`
    Local(LocalDecl),
    /// `loop ... endloop`
    Loop(Vec<Stmt>),
    /// `return [value]`
    Return(Option<Expr>),
}

/// Conditional with an optional `elseif`/`else` tail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    #[serde(default)]
    pub else_branch: Option<ElseBranch>,
}

/// Tail of an `if` statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElseBranch {
    ElseIf(Box<IfStmt>),
    Else(Vec<Stmt>),
}

/// Local variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub init: Option<Expr>,
}

/// Function call (statement or expression)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Variable reference
    Reference(String),
    /// `name[index]`
    ArrayRef { name: String, index: Box<Expr> },
    Call(CallExpr),
    /// `function name`
    FunctionRef(String),
    Arithmetic {
        sign: ArithmeticSign,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Short-circuit `and` / `or`
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Not(Box<Expr>),
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i32),
    Real(f32),
    Boolean(bool),
    String(String),
    /// The `null` keyword
    Null,
}

/// Binary operators evaluated by the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticSign {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl ArithmeticSign {
    /// Source-level spelling
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticSign::Add => "+",
            ArithmeticSign::Subtract => "-",
            ArithmeticSign::Multiply => "*",
            ArithmeticSign::Divide => "/",
            ArithmeticSign::Equal => "==",
            ArithmeticSign::NotEqual => "!=",
            ArithmeticSign::Less => "<",
            ArithmeticSign::LessEqual => "<=",
            ArithmeticSign::Greater => ">",
            ArithmeticSign::GreaterEqual => ">=",
        }
    }
}

/// Short-circuit boolean operators, compiled to branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

// Construction helpers used by hosts that build trees programmatically.

impl Expr {
    pub fn int(value: i32) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn real(value: f32) -> Self {
        Expr::Literal(Literal::Real(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Reference(name.into())
    }

    pub fn index(name: impl Into<String>, index: Expr) -> Self {
        Expr::ArrayRef {
            name: name.into(),
            index: Box::new(index),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(CallExpr {
            name: name.into(),
            args,
        })
    }

    pub fn binary(sign: ArithmeticSign, left: Expr, right: Expr) -> Self {
        Expr::Arithmetic {
            sign,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

impl Stmt {
    pub fn set(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Set {
            name: name.into(),
            value,
        }
    }

    pub fn set_indexed(name: impl Into<String>, index: Expr, value: Expr) -> Self {
        Stmt::SetIndexed {
            name: name.into(),
            index,
            value,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Stmt::Call(CallExpr {
            name: name.into(),
            args,
        })
    }

    pub fn local(name: impl Into<String>, ty: Type, init: Option<Expr>) -> Self {
        Stmt::Local(LocalDecl {
            name: name.into(),
            ty,
            init,
        })
    }

    pub fn if_then(cond: Expr, then_body: Vec<Stmt>, else_branch: Option<ElseBranch>) -> Self {
        Stmt::If(IfStmt {
            cond,
            then_body,
            else_branch,
        })
    }
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, params: Vec<Param>, return_type: Type, body: Vec<Stmt>) -> Self {
        FunctionDecl {
            name: name.into(),
            params,
            return_type,
            body,
        }
    }
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Param {
            name: name.into(),
            ty,
        }
    }
}
