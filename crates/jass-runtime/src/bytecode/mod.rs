//! Bytecode instruction array
//!
//! One flat, zero-indexed, append-only array shared by every compiled
//! function. Forward branches are emitted as [`Instruction::Placeholder`]
//! and patched once their target is known.

mod disasm;
mod instruction;
mod validator;

pub use disasm::{disassemble, disassemble_bytecode};
pub use instruction::{Callee, Instruction};
pub use validator::{validate, ValidationError, ValidationErrorKind};

/// Instruction container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    instructions: Vec<Instruction>,
}

impl Bytecode {
    /// Create a new empty bytecode container
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction and return its address
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Reserve a slot to be patched later
    pub fn reserve(&mut self) -> usize {
        self.emit(Instruction::Placeholder)
    }

    /// Replace the instruction at `address`
    ///
    /// Used for forward jumps where the target isn't known yet
    pub fn patch(&mut self, address: usize, instruction: Instruction) {
        debug_assert!(
            matches!(self.instructions.get(address), Some(Instruction::Placeholder)),
            "patching non-placeholder at {}",
            address
        );
        if let Some(slot) = self.instructions.get_mut(address) {
            *slot = instruction;
        }
    }

    /// Address the next emitted instruction will get
    pub fn current_address(&self) -> usize {
        self.instructions.len()
    }

    pub fn get(&self, address: usize) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Addresses in `range` still holding a placeholder
    pub fn unresolved(&self, range: std::ops::Range<usize>) -> Vec<usize> {
        range
            .filter(|&addr| matches!(self.instructions.get(addr), Some(Instruction::Placeholder)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_reserve_and_patch() {
        let mut bytecode = Bytecode::new();
        let hole = bytecode.reserve();
        bytecode.emit(Instruction::PushLiteral(Value::Integer(1)));
        assert_eq!(bytecode.unresolved(0..bytecode.len()), vec![hole]);

        let target = bytecode.current_address();
        bytecode.patch(hole, Instruction::Branch(target));
        assert!(bytecode.unresolved(0..bytecode.len()).is_empty());
        assert_eq!(bytecode.get(hole), Some(&Instruction::Branch(2)));
    }

    #[test]
    fn test_addresses_are_indices() {
        let mut bytecode = Bytecode::new();
        assert_eq!(bytecode.emit(Instruction::DoNothing), 0);
        assert_eq!(bytecode.emit(Instruction::Return), 1);
        assert_eq!(bytecode.current_address(), 2);
    }
}
