pub mod check;
pub mod disasm;
pub mod natives;
pub mod run;

use anyhow::{bail, Context, Result};
use jass_runtime::api::NativeTable;
use jass_runtime::ast::{self, VersionedProgram, AST_VERSION};
use jass_runtime::{compile_program, validate, GlobalScope, Program};
use std::fs;
use std::path::Path;

/// Read and parse a program JSON file
pub fn load_ast(file_path: &Path) -> Result<ast::Program> {
    let source = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read program file: {}", file_path.display()))?;
    let versioned = VersionedProgram::from_json(&source)
        .with_context(|| format!("Invalid program JSON in {}", file_path.display()))?;
    if versioned.ast_version != AST_VERSION {
        bail!(
            "{}: unsupported AST version {} (expected {})",
            file_path.display(),
            versioned.ast_version,
            AST_VERSION
        );
    }
    Ok(versioned.program)
}

/// Compile and validate against the CLI's native set
pub fn compile_file(file_path: &Path) -> Result<Program> {
    let ast = load_ast(file_path)?;
    let natives = natives::standard_natives(std::io::sink());
    compile_with(&ast, &natives)
        .with_context(|| format!("Failed to compile {}", file_path.display()))
}

fn compile_with(ast: &ast::Program, natives: &NativeTable) -> Result<Program> {
    let mut scope = GlobalScope::new();
    natives.declare_into(&mut scope)?;
    let program = compile_program(scope, ast)?;
    if let Err(errors) = validate(&program) {
        let listing = errors
            .iter()
            .map(|e| format!("  {}", e))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("bytecode failed validation:\n{}", listing);
    }
    Ok(program)
}
