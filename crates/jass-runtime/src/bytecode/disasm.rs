//! Bytecode disassembler
//!
//! Converts compiled programs back to a human-readable listing.
//! Used for debugging, testing, and `jass disasm` output.

use super::Bytecode;
use crate::program::Program;
use std::fmt::Write;

/// Disassemble a whole program
///
/// # Format
/// ```text
/// === Entry stubs ===
/// 0000  branch 0001  ; main
///
/// === main (params 0, locals 1) ===
/// 0001  push-literal 2
/// 0002  local-assign 0
/// ```
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    let instructions = program.bytecode.instructions();

    if !program.functions.is_empty() {
        let _ = writeln!(output, "=== Entry stubs ===");
        for function in &program.functions {
            if let Some(stub) = instructions.get(function.entry) {
                let _ = writeln!(output, "{:04}  {}  ; {}", function.entry, stub, function.name);
            }
        }
    }

    let mut functions: Vec<_> = program.functions.iter().collect();
    functions.sort_by_key(|f| f.body);
    for function in functions {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "=== {} (params {}, locals {}) ===",
            function.name, function.param_count, function.local_count
        );
        for address in function.body..function.end {
            if let Some(instruction) = instructions.get(address) {
                let _ = writeln!(output, "{:04}  {}", address, instruction);
            }
        }
    }

    output
}

/// Flat listing of a bytecode array, one instruction per line
pub fn disassemble_bytecode(bytecode: &Bytecode) -> String {
    let mut output = String::new();
    for (address, instruction) in bytecode.instructions().iter().enumerate() {
        let _ = writeln!(output, "{:04}  {}", address, instruction);
    }
    output
}
