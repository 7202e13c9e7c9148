//! The fixed built-in function table.
//!
//! Each entry maps a TxScript function name to its parameter/return types
//! and lowering behavior: most built-ins are a single opcode; `markInvalid`
//! and `raw` are compiler intrinsics; the `check_*`/`address_to_hash160`
//! validators run entirely at compile time and never reach the emitted
//! script. The table is a closed constant -- plugin registration is out of
//! scope.

use crate::opcode::Opcode;
use crate::types::Ty;

/// How a built-in lowers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// Emits exactly this opcode after its lowered arguments.
    Op(Opcode),
    /// Emits `OP_RETURN`; everything after is data embedding.
    MarkInvalid,
    /// Lowers its arguments against a fresh stack into an inner script,
    /// emitted as a single byte push.
    Raw,
    /// Compile-time validation; the (validated) constant value is pushed.
    Validate(Validator),
}

/// The compile-time validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Argument must be exactly 20 bytes.
    CheckHash160,
    /// Argument must be 33 bytes prefixed 0x02/0x03, or 65 prefixed 0x04.
    CheckPubkey,
    /// Base58check-decodes an address, discards the version byte, yields
    /// the 20-byte hash.
    AddressToHash160,
}

/// One row of the built-in table.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    /// Fixed parameter types, or `None` for variadic built-ins
    /// (`checkMultiSig`, `raw`).
    pub params: Option<&'static [Ty]>,
    pub ret: Ty,
    pub kind: BuiltinKind,
    /// Side-effecting built-ins may only appear in `verify`, `push`, or
    /// expression statements -- never inside bindings.
    pub has_side_effects: bool,
    /// `markInvalid` produces no value and is statement-only.
    pub produces_value: bool,
}

const INT: &[Ty] = &[Ty::Int];
const INT2: &[Ty] = &[Ty::Int, Ty::Int];
const INT3: &[Ty] = &[Ty::Int, Ty::Int, Ty::Int];
const BYTES: &[Ty] = &[Ty::Bytes];
const BYTES2: &[Ty] = &[Ty::Bytes, Ty::Bytes];
const BYTES_INT: &[Ty] = &[Ty::Bytes, Ty::Int];
const BYTES_INT2: &[Ty] = &[Ty::Bytes, Ty::Int, Ty::Int];
const EXPR2: &[Ty] = &[Ty::Expr, Ty::Expr];
const NONE: &[Ty] = &[];

/// The complete table, in documentation order.
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "abs",
        params: Some(INT),
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::Abs),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "size",
        params: Some(BYTES),
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::Size),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "min",
        params: Some(INT2),
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::Min),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "max",
        params: Some(INT2),
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::Max),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "concat",
        params: Some(BYTES2),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Cat),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "left",
        params: Some(BYTES_INT),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Left),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "right",
        params: Some(BYTES_INT),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Right),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "substr",
        params: Some(BYTES_INT2),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Substr),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "within",
        params: Some(INT3),
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::Within),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "ripemd160",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Ripemd160),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "sha1",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Sha1),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "sha256",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Sha256),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "hash160",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Hash160),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "hash256",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Op(Opcode::Hash256),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "checkSig",
        params: Some(EXPR2),
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::CheckSig),
        has_side_effects: true,
        produces_value: true,
    },
    Builtin {
        name: "checkMultiSig",
        params: None,
        ret: Ty::Int,
        kind: BuiltinKind::Op(Opcode::CheckMultiSig),
        has_side_effects: true,
        produces_value: true,
    },
    Builtin {
        name: "markInvalid",
        params: Some(NONE),
        ret: Ty::Expr,
        kind: BuiltinKind::MarkInvalid,
        has_side_effects: true,
        produces_value: false,
    },
    Builtin {
        name: "raw",
        params: None,
        ret: Ty::Bytes,
        kind: BuiltinKind::Raw,
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "check_hash160",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Validate(Validator::CheckHash160),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "check_pubkey",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Validate(Validator::CheckPubkey),
        has_side_effects: false,
        produces_value: true,
    },
    Builtin {
        name: "address_to_hash160",
        params: Some(BYTES),
        ret: Ty::Bytes,
        kind: BuiltinKind::Validate(Validator::AddressToHash160),
        has_side_effects: false,
        produces_value: true,
    },
];

/// Looks up a built-in by source name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}
