//! Check command - compile and validate without executing

use super::compile_file;
use anyhow::Result;
use std::path::Path;

/// Compile and validate a program, reporting the first failure
pub fn run(file_path: &Path) -> Result<()> {
    let program = compile_file(file_path)?;
    println!(
        "{}: No errors found ({} functions, {} instructions)",
        file_path.display(),
        program.functions.len(),
        program.bytecode.len()
    );
    Ok(())
}
