//! Codegen error types covering lowering, emission, and disassembly.

use thiserror::Error;

use txsc_check::SemanticError;
use txsc_core::span::Span;

/// Errors produced by the lowering, optimization, and emission stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    /// The semantic checker rejected the program before lowering.
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// Lowering would reach below the bottom of the stack; the user's
    /// conditional balancing is wrong.
    #[error("stack underflow at {span}")]
    StackUnderflow { span: Span },

    /// An integer push outside the 4-byte script-number range.
    #[error("cannot encode push: {reason}")]
    InvalidPush { reason: String },

    /// Disassembly hit a byte that is not an opcode of the dialect.
    #[error("unknown opcode byte {byte:#04x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    /// Textual disassembly hit an unrecognizable token.
    #[error("unknown token '{token}'")]
    UnknownToken { token: String },

    /// A push ran past the end of the input during disassembly.
    #[error("truncated script")]
    TruncatedScript,

    /// Bug trap; never expected.
    #[error("internal invariant violated: {reason}")]
    InternalInvariant { reason: String },
}
