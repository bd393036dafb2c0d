//! Bytecode validator: static checks before VM execution
//!
//! Performs these checks over a compiled [`Program`]:
//! 1. **Targets**: every branch and return address lies inside the array
//! 2. **Placeholders**: no reserved slot survived compilation
//! 3. **Symbols**: function, native and global ids exist in the scope
//! 4. **Native arity**: `native` argument counts match the registered arity
//! 5. **Locals**: local slots stay below the enclosing function's slot count
//! 6. **Layout**: entry stubs branch to their body, bodies end in `return`

use crate::bytecode::{Callee, Instruction};
use crate::program::Program;

// ============================================================================
// Public API
// ============================================================================

/// A validation error with the address where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Instruction address where the error was detected.
    pub address: usize,
    /// What went wrong.
    pub kind: ValidationErrorKind,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "address {:04}: {}", self.address, self.kind)
    }
}

impl std::error::Error for ValidationError {}

/// Kinds of errors the validator can detect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A branch or return target falls outside `[0, len)`.
    TargetOutOfBounds { target: usize, len: usize },
    /// A placeholder was never patched.
    UnresolvedPlaceholder,
    /// `new-stack-frame` names a function that does not exist.
    UnknownFunction { id: usize },
    /// A native id that is not registered.
    UnknownNative { id: u32 },
    /// A `native` instruction whose argument count differs from the arity.
    NativeArity { id: u32, expected: usize, found: usize },
    /// A global id that is not declared.
    UnknownGlobal { id: usize },
    /// A local slot at or beyond the function's slot count.
    LocalSlotOutOfRange { slot: usize, local_count: usize },
    /// A local instruction outside every function body.
    LocalOutsideFunction,
    /// The entry stub does not branch to the function body.
    BadEntryStub { function: String },
    /// The function body does not end in `return`.
    MissingReturn { function: String },
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetOutOfBounds { target, len } => {
                write!(f, "target {} is out of bounds (len={})", target, len)
            }
            Self::UnresolvedPlaceholder => write!(f, "unresolved placeholder"),
            Self::UnknownFunction { id } => write!(f, "unknown function id {}", id),
            Self::UnknownNative { id } => write!(f, "unknown native id {}", id),
            Self::NativeArity {
                id,
                expected,
                found,
            } => write!(
                f,
                "native {} expects {} arguments, instruction passes {}",
                id, expected, found
            ),
            Self::UnknownGlobal { id } => write!(f, "unknown global id {}", id),
            Self::LocalSlotOutOfRange { slot, local_count } => write!(
                f,
                "local slot {} out of range (function has {} slots)",
                slot, local_count
            ),
            Self::LocalOutsideFunction => write!(f, "local access outside a function body"),
            Self::BadEntryStub { function } => {
                write!(f, "entry stub of '{}' does not branch to its body", function)
            }
            Self::MissingReturn { function } => {
                write!(f, "body of '{}' does not end with return", function)
            }
        }
    }
}

/// Validate `program`, collecting all errors found.
///
/// Returns `Ok(())` if no issues are found, otherwise `Err(errors)` with every
/// detected problem. Does NOT short-circuit on the first error.
pub fn validate(program: &Program) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_instructions(program, &mut errors);
    check_layout(program, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// Passes
// ============================================================================

fn check_instructions(program: &Program, errors: &mut Vec<ValidationError>) {
    let instructions = program.bytecode.instructions();
    let len = instructions.len();
    let scope = &program.scope;
    let mut push = |address, kind| errors.push(ValidationError { address, kind });

    for (address, instruction) in instructions.iter().enumerate() {
        if let Some(target) = instruction.branch_target() {
            if target >= len {
                push(address, ValidationErrorKind::TargetOutOfBounds { target, len });
            }
        }

        match instruction {
            Instruction::Placeholder => push(address, ValidationErrorKind::UnresolvedPlaceholder),
            Instruction::NewStackFrame(Callee::Function(id)) => {
                if program.function(*id).is_none() {
                    push(address, ValidationErrorKind::UnknownFunction { id: id.0 });
                }
            }
            Instruction::NewStackFrame(Callee::Native(id)) => {
                if scope.native(*id).is_none() {
                    push(address, ValidationErrorKind::UnknownNative { id: id.0 });
                }
            }
            Instruction::Native { id, argc } => match scope.native(*id) {
                None => push(address, ValidationErrorKind::UnknownNative { id: id.0 }),
                Some(native) if native.arity != *argc => push(
                    address,
                    ValidationErrorKind::NativeArity {
                        id: id.0,
                        expected: native.arity,
                        found: *argc,
                    },
                ),
                Some(_) => {}
            },
            Instruction::GlobalReference(id)
            | Instruction::GlobalAssign(id)
            | Instruction::GlobalArrayAssign(id) => {
                if scope.global(*id).is_none() {
                    push(address, ValidationErrorKind::UnknownGlobal { id: id.0 });
                }
            }
            Instruction::LocalReference(slot)
            | Instruction::LocalAssign(slot)
            | Instruction::LocalArrayAssign(slot)
            | Instruction::DeclareLocalArray { slot, .. } => {
                match program.function_containing(address) {
                    None => push(address, ValidationErrorKind::LocalOutsideFunction),
                    Some(function) if *slot >= function.local_count => push(
                        address,
                        ValidationErrorKind::LocalSlotOutOfRange {
                            slot: *slot,
                            local_count: function.local_count,
                        },
                    ),
                    Some(_) => {}
                }
            }
            _ => {}
        }
    }
}

fn check_layout(program: &Program, errors: &mut Vec<ValidationError>) {
    let bytecode = &program.bytecode;
    for function in &program.functions {
        if bytecode.get(function.entry) != Some(&Instruction::Branch(function.body)) {
            errors.push(ValidationError {
                address: function.entry,
                kind: ValidationErrorKind::BadEntryStub {
                    function: function.name.to_string(),
                },
            });
        }

        let last = function.end.checked_sub(1).filter(|&l| l >= function.body);
        let ends_in_return =
            last.and_then(|l| bytecode.get(l)) == Some(&Instruction::Return);
        if !ends_in_return {
            errors.push(ValidationError {
                address: function.end,
                kind: ValidationErrorKind::MissingReturn {
                    function: function.name.to_string(),
                },
            });
        }
    }
}
