//! TxScript compiler CLI.
//!
//! Provides the `txsc` binary. `compile` consumes a JSON-serialized AST
//! -- the external parser's delivery format -- and emits the compiled
//! script; `dis` disassembles hex script bytes back to their textual
//! form. Parser errors never reach the core: a malformed input file is
//! surfaced verbatim from the JSON deserializer.
//!
//! Uses the same `txsc_codegen::compile()` pipeline as the library
//! entry point, so both produce byte-identical output for the same AST
//! and options.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use txsc_check::ImplicitPushPolicy;
use txsc_codegen::{compile, emit, CodegenError, CompileOptions, Target};
use txsc_core::ast::Program;

/// TxScript compiler and tools.
#[derive(Parser)]
#[command(name = "txsc", about = "TxScript to transaction-script compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a parsed program (JSON AST) to a transaction script.
    Compile {
        /// Path to the JSON-serialized AST produced by the parser.
        #[arg(short, long)]
        input: PathBuf,

        /// Output dialect: asm or hex.
        #[arg(short, long, default_value = "asm")]
        target: String,

        /// Optimization: on or off.
        #[arg(long, default_value = "on")]
        optimize: String,

        /// Optimizer log detail, 0..=3.
        #[arg(short, long, default_value_t = 1)]
        verbosity: u8,

        /// Bare expression statements: allow, warn, or deny.
        #[arg(long, default_value = "warn")]
        implicit_pushes: String,

        /// Write the script here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Disassemble a hex-encoded script to its textual form.
    Dis {
        /// Hex-encoded script bytes.
        script: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Compile {
            input,
            target,
            optimize,
            verbosity,
            implicit_pushes,
            output,
        } => run_compile(
            &input,
            &target,
            &optimize,
            verbosity,
            &implicit_pushes,
            output,
        ),
        Commands::Dis { script } => run_dis(&script),
    };
    process::exit(exit_code);
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = codegen error, 2 = semantic
/// error, 3 = I/O or parse error.
fn run_compile(
    input: &PathBuf,
    target_str: &str,
    optimize_str: &str,
    verbosity: u8,
    implicit_pushes_str: &str,
    output: Option<PathBuf>,
) -> i32 {
    let target = match parse_target(target_str) {
        Ok(t) => t,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 1;
        }
    };
    let optimize = match parse_optimize(optimize_str) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 1;
        }
    };
    let implicit_pushes = match parse_policy(implicit_pushes_str) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 1;
        }
    };
    let verbosity = verbosity.min(3);

    init_tracing(verbosity);

    let text = match fs::read_to_string(input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", input.display(), e);
            return 3;
        }
    };
    // The parser's errors are surfaced verbatim.
    let program: Program = match serde_json::from_str(&text) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return 3;
        }
    };

    let options = CompileOptions {
        verbosity,
        implicit_pushes,
        optimize,
        target,
    };

    match compile(&program, &options) {
        Ok(result) => {
            for warning in &result.warnings {
                eprintln!("{}", warning);
            }
            match output {
                Some(path) => {
                    if let Err(e) = fs::write(&path, format!("{}\n", result.output)) {
                        eprintln!("Error: failed to write '{}': {}", path.display(), e);
                        return 3;
                    }
                }
                None => println!("{}", result.output),
            }
            0
        }
        Err(CodegenError::Semantic(e)) => {
            eprintln!("Error: {}", e);
            2
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Execute the dis subcommand: hex in, asm out.
fn run_dis(script_hex: &str) -> i32 {
    match emit::parse_hex(script_hex.trim()).and_then(|s| emit::emit_asm(&s)) {
        Ok(asm) => {
            println!("{}", asm);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Parse an output dialect flag.
fn parse_target(s: &str) -> Result<Target, String> {
    match s {
        "asm" => Ok(Target::Asm),
        "hex" => Ok(Target::Hex),
        _ => Err(format!("invalid target '{}', expected asm/hex", s)),
    }
}

/// Parse the optimize flag.
fn parse_optimize(s: &str) -> Result<bool, String> {
    match s {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(format!("invalid optimize value '{}', expected on/off", s)),
    }
}

/// Parse the implicit-push policy flag.
fn parse_policy(s: &str) -> Result<ImplicitPushPolicy, String> {
    match s {
        "allow" => Ok(ImplicitPushPolicy::Allow),
        "warn" => Ok(ImplicitPushPolicy::Warn),
        "deny" => Ok(ImplicitPushPolicy::Deny),
        _ => Err(format!(
            "invalid implicit-push policy '{}', expected allow/warn/deny",
            s
        )),
    }
}

/// Map the 0..=3 verbosity knob onto the subscriber's level filter.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing_subscriber::filter::LevelFilter::ERROR,
        1 => tracing_subscriber::filter::LevelFilter::INFO,
        2 => tracing_subscriber::filter::LevelFilter::DEBUG,
        _ => tracing_subscriber::filter::LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsers() {
        assert_eq!(parse_target("asm").unwrap(), Target::Asm);
        assert_eq!(parse_target("hex").unwrap(), Target::Hex);
        assert!(parse_target("elf").is_err());

        assert!(parse_optimize("on").unwrap());
        assert!(!parse_optimize("off").unwrap());
        assert!(parse_optimize("maybe").is_err());

        assert_eq!(parse_policy("deny").unwrap(), ImplicitPushPolicy::Deny);
        assert!(parse_policy("never").is_err());
    }
}
