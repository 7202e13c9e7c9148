//! Core data model for the TxSC compiler.
//!
//! Houses everything the pipeline stages exchange: the TxScript AST with
//! source spans, the three-type system, the target opcode set with arity
//! metadata, the linear opcode IR, the script-number codec, and the fixed
//! built-in table.

pub mod ast;
pub mod builtins;
pub mod opcode;
pub mod ops;
pub mod script;
pub mod span;
pub mod types;

// Re-export commonly used types
pub use ast::{Expr, ExprKind, FuncDecl, Program, Stmt, StmtKind};
pub use builtins::{Builtin, BuiltinKind, Validator, BUILTINS};
pub use opcode::{Opcode, ALL_OPCODES};
pub use ops::{ArithOp, BinaryOp, BitOp, BoolOp, CmpOp, UnaryOp};
pub use script::{cast_to_bool, scriptnum_decode, scriptnum_encode, OpInstr, Script};
pub use span::Span;
pub use types::{ConstValue, Ty};
