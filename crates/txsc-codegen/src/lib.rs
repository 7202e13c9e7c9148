//! Code generation for TxScript programs.
//!
//! This crate provides the pipeline that turns a parsed [`Program`] into
//! an emitted transaction script:
//!
//! 1. semantic check ([`txsc_check::check_program`])
//! 2. AST constant folding (optimizer on)
//! 3. stack-aware lowering to opcode IR
//! 4. peephole rewriting and dead-code elimination to fixpoint
//! 5. emission as textual asm or hex bytes
//!
//! # Modules
//!
//! - [`error`] -- error types for all compilation failure modes
//! - [`stack`] -- the virtual stack maintained during lowering
//! - [`lower`] -- AST to opcode IR
//! - [`optimize`] -- folding, peephole, dead-code elimination
//! - [`emit`] -- emitter and disassembler
//!
//! All configuration travels in [`CompileOptions`]; there is no ambient
//! state, and compilation is deterministic: one AST plus one options value
//! yields byte-identical output.

pub mod emit;
pub mod error;
pub mod lower;
pub mod optimize;
pub mod stack;

pub use error::CodegenError;

use serde::{Deserialize, Serialize};
use tracing::debug;

use txsc_check::{check_program, CheckOptions, ImplicitPushPolicy, Warning};
use txsc_core::ast::Program;
use txsc_core::script::Script;

/// Output dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Space-separated `OP_*` tokens with length-prefixed hex pushes.
    Asm,
    /// Canonical consensus bytes, rendered as lowercase hex.
    Hex,
}

impl Default for Target {
    fn default() -> Self {
        Target::Asm
    }
}

/// Options controlling one compilation. Threaded through every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Optimizer log detail, 0..=3. At the default (1) every rewrite site
    /// emits one log entry.
    pub verbosity: u8,
    /// Treatment of bare expression statements.
    pub implicit_pushes: ImplicitPushPolicy,
    /// Constant folding, peephole, and dead-code elimination.
    pub optimize: bool,
    /// Output dialect.
    pub target: Target,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            verbosity: 1,
            implicit_pushes: ImplicitPushPolicy::default(),
            optimize: true,
            target: Target::default(),
        }
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    /// Emitted script in the requested dialect.
    pub output: String,
    /// The final (normalized) opcode IR.
    pub script: Script,
    /// Non-halting diagnostics from the semantic check.
    pub warnings: Vec<Warning>,
}

/// Compiles a parsed program to a transaction script.
pub fn compile(program: &Program, options: &CompileOptions) -> Result<CompileResult, CodegenError> {
    // 1. Semantic check -- invalid programs never reach lowering.
    let report = check_program(
        program,
        &CheckOptions {
            implicit_pushes: options.implicit_pushes,
        },
    )?;

    // 2. AST-level constant folding.
    let folded;
    let program = if options.optimize {
        folded = optimize::fold_program(program, options.verbosity);
        &folded
    } else {
        program
    };

    // 3. Lowering onto the stack machine.
    let mut script = lower::lower_program(program, options)?;
    debug!(target: "txsc::codegen", instrs = script.len(), "lowered");

    // 4. Opcode-level optimization to fixpoint.
    if options.optimize {
        optimize::optimize_script(&mut script, options.verbosity);
    }

    // 5. Emission.
    let output = match options.target {
        Target::Asm => emit::emit_asm(&script)?,
        Target::Hex => emit::emit_hex(&script)?,
    };

    Ok(CompileResult {
        output,
        script: script.normalized(),
        warnings: report.warnings,
    })
}
