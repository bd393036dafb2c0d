//! Disasm command - print the compiled bytecode

use super::compile_file;
use anyhow::Result;
use jass_runtime::disassemble;
use std::path::Path;

pub fn run(file_path: &Path) -> Result<()> {
    let program = compile_file(file_path)?;
    print!("{}", disassemble(&program));
    Ok(())
}
