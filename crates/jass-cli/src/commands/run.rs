//! Run command - execute a compiled JASS program

use super::{load_ast, natives};
use anyhow::{Context, Result};
use jass_config::{ConfigLoader, VmConfig};
use jass_runtime::{JassRuntime, RunOutcome, Value};
use std::path::Path;
use tracing::debug;

/// Resolve VM limits from an explicit file or the nearest jass.toml
pub fn load_vm_config(config_path: Option<&Path>) -> Result<VmConfig> {
    let loader = ConfigLoader::new();
    let config = match config_path {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => loader
            .load_from_directory(&std::env::current_dir()?)
            .context("Failed to load configuration")?,
    };
    if let Some(root) = &config.project_root {
        debug!(root = %root.display(), "using project configuration");
    }
    Ok(config.vm().clone())
}

/// Run `entry` in the program at `file_path`
///
/// Prints the entry function's result unless it returns nothing.
pub fn run(file_path: &Path, entry: &str, config_path: Option<&Path>) -> Result<()> {
    let vm_config = load_vm_config(config_path)?;
    let ast = load_ast(file_path)?;
    let natives = natives::standard_natives(std::io::stdout());

    let mut runtime = JassRuntime::load(&ast, natives, vm_config)
        .with_context(|| format!("Failed to load {}", file_path.display()))?;

    let mut outcome = runtime
        .call(entry, Vec::new())
        .with_context(|| format!("Runtime error in '{}'", entry))?;
    // No host scheduler: a suspended script resumes immediately
    while outcome == RunOutcome::Suspended {
        debug!("resuming suspended invocation");
        outcome = runtime
            .resume()
            .with_context(|| format!("Runtime error in '{}'", entry))?;
    }

    if let RunOutcome::Finished(value) = outcome {
        match value {
            Value::Nothing => {}
            Value::String(s) => println!("{}", s),
            other => println!("{}", other),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn program_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file
    }

    #[test]
    fn test_run_missing_file() {
        let result = run(Path::new("nonexistent.json"), "main", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_missing_entry() {
        let file = program_file(
            r#"{ "ast_version": 1, "functions": [
                { "name": "main", "return_type": "Nothing", "body": [] }
            ] }"#,
        );
        let err = run(file.path(), "start", None).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown function: start"));
    }

    #[test]
    fn test_explicit_config_file() {
        let mut config = NamedTempFile::new().unwrap();
        writeln!(config, "[vm]\nmax_call_depth = 12").unwrap();
        let vm = load_vm_config(Some(config.path())).unwrap();
        assert_eq!(vm.max_call_depth, 12);
    }
}
