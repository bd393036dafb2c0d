use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

/// JASS script compiler and virtual machine.
///
/// Loads a parsed JASS program (serialized AST in JSON), compiles it to
/// bytecode and runs it on the stack VM.
///
/// EXAMPLES:
///     jass run map.json                 Run the `main` function
///     jass run map.json --entry init    Run another entry function
///     jass check map.json               Compile and validate without running
///     jass disasm map.json              Print the compiled bytecode
///
/// ENVIRONMENT VARIABLES:
///     JASS_ENTRY               Default entry function for `run`
///     JASS_MAX_CALL_DEPTH      Override vm.max_call_depth
///     JASS_MAX_OPERAND_STACK   Override vm.max_operand_stack
///     JASS_INSTRUCTION_LIMIT   Override vm.instruction_limit
///     RUST_LOG                 Log filter (e.g. jass_runtime=trace)
///     NO_COLOR                 Set to disable colored log output
#[derive(Parser)]
#[command(name = "jass")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a program
    ///
    /// Runs the global initializer, then calls the entry function and
    /// prints its result unless it returns nothing.
    ///
    /// EXAMPLES:
    ///     jass run map.json                       Run `main`
    ///     jass run map.json --entry init          Run `init`
    ///     jass run map.json --config jass.toml    Use explicit VM limits
    ///     jass run map.json -v                    Log VM activity
    #[command(visible_alias = "r")]
    Run {
        /// Path to the program JSON
        file: PathBuf,
        /// Function to call after initialisation
        #[arg(long, short = 'e', default_value = "main", env = "JASS_ENTRY")]
        entry: String,
        /// Path to jass.toml (default: searched upwards from the current directory)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// Verbose output (debug-level logging)
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Compile and validate a program without running it
    ///
    /// EXAMPLES:
    ///     jass check map.json
    #[command(visible_alias = "c")]
    Check {
        /// Path to the program JSON
        file: PathBuf,
    },

    /// Print the disassembled bytecode of a program
    ///
    /// EXAMPLES:
    ///     jass disasm map.json
    ///     jass disasm map.json > map.txt
    #[command(visible_alias = "d")]
    Disasm {
        /// Path to the program JSON
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();

    match cli.command {
        Commands::Run {
            file,
            entry,
            config,
            verbose,
        } => {
            cli_config.init_logging(verbose);
            commands::run::run(&file, &entry, config.as_deref())?;
        }
        Commands::Check { file } => {
            cli_config.init_logging(false);
            commands::check::run(&file)?;
        }
        Commands::Disasm { file } => {
            cli_config.init_logging(false);
            commands::disasm::run(&file)?;
        }
    }

    Ok(())
}
