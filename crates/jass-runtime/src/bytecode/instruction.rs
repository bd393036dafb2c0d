//! Instruction set
//!
//! Instructions carry their operands inline. An instruction's address is its
//! index in the shared instruction array.

use crate::ast::ArithmeticSign;
use crate::symbol::{FunctionId, GlobalId, NativeId};
use crate::types::Type;
use crate::value::Value;
use std::fmt;

/// Target of a frame being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Function(FunctionId),
    Native(NativeId),
}

/// A single VM instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // ===== Values =====
    /// Push an immediate value
    PushLiteral(Value),
    /// Push the content of a local slot
    LocalReference(usize),
    /// Push the content of a global slot
    GlobalReference(GlobalId),
    /// Pop a value into a local slot
    LocalAssign(usize),
    /// Pop a value into a global slot
    GlobalAssign(GlobalId),

    // ===== Arrays =====
    /// Pop index, pop array; push element
    ArrayReference,
    /// Pop value, pop index; store into the local array slot
    LocalArrayAssign(usize),
    /// Pop value, pop index; store into the global array slot
    GlobalArrayAssign(GlobalId),
    /// Put a fresh array of `element` into a local slot
    DeclareLocalArray { slot: usize, element: Type },

    // ===== Operators =====
    /// Pop right, pop left; push `left sign right`
    Arithmetic(ArithmeticSign),
    Negate,
    Not,
    /// Pop a value; push it as a real if it is an integer
    IntegerToReal,

    // ===== Control flow =====
    Branch(usize),
    /// Pop a boolean; jump when true
    ConditionalBranch(usize),
    /// Pop a boolean; jump when false
    InvertedConditionalBranch(usize),

    // ===== Calls =====
    /// Push a pending frame for the callee
    NewStackFrame(Callee),
    /// Bind arguments and return address to the pending frame
    SetReturnAddr(usize),
    /// Pop `argc` arguments, invoke the host native, push its result
    Native { id: NativeId, argc: usize },
    /// Pop the result and the frame, push the result, jump to the return address
    Return,

    // ===== Misc =====
    /// Discard the top of the stack
    Pop,
    DoNothing,
    /// Reserved slot awaiting a back-patch
    Placeholder,
}

impl Instruction {
    /// Static branch target, if any
    pub fn branch_target(&self) -> Option<usize> {
        match self {
            Instruction::Branch(target)
            | Instruction::ConditionalBranch(target)
            | Instruction::InvertedConditionalBranch(target)
            | Instruction::SetReturnAddr(target) => Some(*target),
            _ => None,
        }
    }

    /// Textual opcode name
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::PushLiteral(_) => "push-literal",
            Instruction::LocalReference(_) => "local-reference",
            Instruction::GlobalReference(_) => "global-reference",
            Instruction::LocalAssign(_) => "local-assign",
            Instruction::GlobalAssign(_) => "global-assign",
            Instruction::ArrayReference => "array-reference",
            Instruction::LocalArrayAssign(_) => "local-array-assign",
            Instruction::GlobalArrayAssign(_) => "global-array-assign",
            Instruction::DeclareLocalArray { .. } => "declare-local-array",
            Instruction::Arithmetic(_) => "arithmetic",
            Instruction::Negate => "negate",
            Instruction::Not => "not",
            Instruction::IntegerToReal => "integer-to-real",
            Instruction::Branch(_) => "branch",
            Instruction::ConditionalBranch(_) => "conditional-branch",
            Instruction::InvertedConditionalBranch(_) => "inverted-conditional-branch",
            Instruction::NewStackFrame(_) => "new-stack-frame",
            Instruction::SetReturnAddr(_) => "set-return-addr",
            Instruction::Native { .. } => "native",
            Instruction::Return => "return",
            Instruction::Pop => "pop",
            Instruction::DoNothing => "do-nothing",
            Instruction::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Instruction::PushLiteral(value) => write!(f, "{} {}", name, value),
            Instruction::LocalReference(slot)
            | Instruction::LocalAssign(slot)
            | Instruction::LocalArrayAssign(slot) => write!(f, "{} {}", name, slot),
            Instruction::GlobalReference(id)
            | Instruction::GlobalAssign(id)
            | Instruction::GlobalArrayAssign(id) => write!(f, "{} {}", name, id),
            Instruction::DeclareLocalArray { slot, element } => {
                write!(f, "{} {} {}", name, slot, element)
            }
            Instruction::Arithmetic(sign) => write!(f, "{} {}", name, sign.symbol()),
            Instruction::Branch(target)
            | Instruction::ConditionalBranch(target)
            | Instruction::InvertedConditionalBranch(target)
            | Instruction::SetReturnAddr(target) => write!(f, "{} {:04}", name, target),
            Instruction::NewStackFrame(Callee::Function(id)) => {
                write!(f, "{} function {}", name, id)
            }
            Instruction::NewStackFrame(Callee::Native(id)) => write!(f, "{} native {}", name, id),
            Instruction::Native { id, argc } => write!(f, "{} {} {}", name, id, argc),
            _ => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Instruction::PushLiteral(Value::Integer(5)), "push-literal 5")]
    #[case(Instruction::PushLiteral(Value::string("hi")), "push-literal \"hi\"")]
    #[case(Instruction::LocalAssign(0), "local-assign 0")]
    #[case(Instruction::GlobalReference(GlobalId(3)), "global-reference 3")]
    #[case(Instruction::Arithmetic(ArithmeticSign::LessEqual), "arithmetic <=")]
    #[case(Instruction::Branch(12), "branch 0012")]
    #[case(Instruction::NewStackFrame(Callee::Native(NativeId(7))), "new-stack-frame native 7")]
    #[case(Instruction::Native { id: NativeId(7), argc: 1 }, "native 7 1")]
    #[case(
        Instruction::DeclareLocalArray { slot: 2, element: Type::handle("unit") },
        "declare-local-array 2 unit"
    )]
    #[case(Instruction::IntegerToReal, "integer-to-real")]
    #[case(Instruction::Return, "return")]
    fn test_display(#[case] instruction: Instruction, #[case] expected: &str) {
        assert_eq!(instruction.to_string(), expected);
    }

    #[test]
    fn test_branch_targets() {
        assert_eq!(Instruction::ConditionalBranch(4).branch_target(), Some(4));
        assert_eq!(Instruction::SetReturnAddr(9).branch_target(), Some(9));
        assert_eq!(Instruction::Return.branch_target(), None);
    }
}
