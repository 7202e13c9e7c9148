//! Compile-time constant evaluation.
//!
//! Backs three consumers: the semantic checker (validation built-ins must
//! resolve at compile time), the optimizer's AST folding pass, and binding
//! substitution for mutable reassignment and function capture.
//!
//! Evaluation is total and silent: anything that is not a compile-time
//! constant -- stack assumptions, side-effecting calls, division by a
//! constant zero -- evaluates to `None` and is left for the runtime.
//! Only the validators produce hard errors.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use txsc_core::ast::{Expr, ExprKind, FuncDecl, Stmt, StmtKind};
use txsc_core::builtins::{self, BuiltinKind, Validator};
use txsc_core::opcode::Opcode;
use txsc_core::ops::{ArithOp, BinaryOp, BitOp, BoolOp, CmpOp, UnaryOp};
use txsc_core::script::scriptnum_encode;
use txsc_core::span::Span;
use txsc_core::types::ConstValue;

use crate::diagnostics::SemanticError;
use crate::symbol::{Binding, SymbolTable};

/// Largest shift distance the folder will evaluate.
const MAX_FOLD_SHIFT: u32 = 4096;

/// Extracts a direct literal, without any name resolution.
pub fn literal_const(expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::Int(n) => Some(ConstValue::Int(n.clone())),
        ExprKind::Bytes(b) => Some(ConstValue::Bytes(b.clone())),
        _ => None,
    }
}

/// Evaluates `expr` against the bindings in `symbols`. `Ok(None)` means
/// the expression is not a compile-time constant; `Err` is reserved for
/// validator failures.
pub fn eval_expr(
    expr: &Expr,
    symbols: &SymbolTable,
) -> Result<Option<ConstValue>, SemanticError> {
    let mut locals = Vec::new();
    let mut visiting = Vec::new();
    eval_inner(expr, symbols, &mut locals, &mut visiting)
}

fn eval_inner(
    expr: &Expr,
    symbols: &SymbolTable,
    locals: &mut Vec<(String, ConstValue)>,
    visiting: &mut Vec<String>,
) -> Result<Option<ConstValue>, SemanticError> {
    match &expr.kind {
        ExprKind::Int(n) => Ok(Some(ConstValue::Int(n.clone()))),
        ExprKind::Bytes(b) => Ok(Some(ConstValue::Bytes(b.clone()))),
        ExprKind::Name(name) => {
            if let Some((_, value)) = locals.iter().rev().find(|(n, _)| n == name) {
                return Ok(Some(value.clone()));
            }
            match symbols.lookup(name).map(|sym| sym.binding.clone()) {
                Some(Binding::Const(value)) => Ok(Some(value)),
                Some(Binding::Expr { ast }) => {
                    if visiting.iter().any(|n| n == name) {
                        return Ok(None);
                    }
                    visiting.push(name.clone());
                    let result = eval_inner(&ast, symbols, locals, visiting);
                    visiting.pop();
                    result
                }
                _ => Ok(None),
            }
        }
        ExprKind::Unary { op, operand } => {
            let value = eval_inner(operand, symbols, locals, visiting)?;
            Ok(value.and_then(|v| apply_unary(*op, &v)))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = eval_inner(lhs, symbols, locals, visiting)?;
            let rhs = eval_inner(rhs, symbols, locals, visiting)?;
            match (lhs, rhs) {
                (Some(l), Some(r)) => Ok(apply_binary(*op, &l, &r)),
                _ => Ok(None),
            }
        }
        ExprKind::Call { name, args } => {
            eval_call(name, args, expr.span, symbols, locals, visiting)
        }
    }
}

fn eval_call(
    name: &str,
    args: &[Expr],
    span: Span,
    symbols: &SymbolTable,
    locals: &mut Vec<(String, ConstValue)>,
    visiting: &mut Vec<String>,
) -> Result<Option<ConstValue>, SemanticError> {
    if let Some(builtin) = builtins::lookup(name) {
        return match builtin.kind {
            BuiltinKind::MarkInvalid | BuiltinKind::Raw => Ok(None),
            BuiltinKind::Op(_) if builtin.has_side_effects => Ok(None),
            BuiltinKind::Op(opcode) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match eval_inner(arg, symbols, locals, visiting)? {
                        Some(value) => values.push(value),
                        None => return Ok(None),
                    }
                }
                Ok(apply_builtin_op(opcode, &values))
            }
            BuiltinKind::Validate(validator) => match args.first() {
                Some(arg) => match eval_inner(arg, symbols, locals, visiting)? {
                    Some(value) => run_validator(validator, &value, name, span).map(Some),
                    None => Ok(None),
                },
                None => Ok(None),
            },
        };
    }

    let decl = match symbols.lookup(name).map(|sym| sym.binding.clone()) {
        Some(Binding::Func(decl)) => decl,
        _ => return Ok(None),
    };
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match eval_inner(arg, symbols, locals, visiting)? {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }
    eval_user_call(&decl, values, symbols, visiting)
}

/// Evaluates an inlined call to a user function with constant arguments.
/// Only bodies built from `let`, reassignment, and the trailing `return`
/// are const-evaluable; anything else defers to runtime.
fn eval_user_call(
    decl: &FuncDecl,
    args: Vec<ConstValue>,
    symbols: &SymbolTable,
    visiting: &mut Vec<String>,
) -> Result<Option<ConstValue>, SemanticError> {
    if args.len() != decl.params.len() {
        return Ok(None);
    }
    let mut locals: Vec<(String, ConstValue)> = decl
        .params
        .iter()
        .cloned()
        .zip(args)
        .collect();
    for stmt in &decl.body {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                match eval_inner(value, symbols, &mut locals, visiting)? {
                    Some(v) => locals.push((name.clone(), v)),
                    None => return Ok(None),
                }
            }
            StmtKind::Assign { name, value } => {
                match eval_inner(value, symbols, &mut locals, visiting)? {
                    Some(v) => match locals.iter_mut().rev().find(|(n, _)| n == name) {
                        Some(slot) => slot.1 = v,
                        None => return Ok(None),
                    },
                    None => return Ok(None),
                }
            }
            StmtKind::Return { value } => {
                return eval_inner(value, symbols, &mut locals, visiting);
            }
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// Rewrites `expr` with every resolvable value name replaced by its
/// current binding: constants become literals, expression bindings are
/// spliced in. Stack assumptions and function names stay symbolic. Used
/// to capture binding values at reassignment and declaration time.
pub fn substitute(expr: &Expr, symbols: &SymbolTable) -> Expr {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Bytes(_) => expr.clone(),
        ExprKind::Name(name) => match symbols.lookup(name).map(|sym| &sym.binding) {
            Some(Binding::Const(ConstValue::Int(n))) => Expr::int(n.clone(), expr.span),
            Some(Binding::Const(ConstValue::Bytes(b))) => Expr::bytes(b.clone(), expr.span),
            Some(Binding::Expr { ast }) => {
                let mut inner = substitute(ast, symbols);
                inner.span = expr.span;
                inner
            }
            _ => expr.clone(),
        },
        ExprKind::Unary { op, operand } => {
            Expr::unary(*op, substitute(operand, symbols), expr.span)
        }
        ExprKind::Binary { op, lhs, rhs } => Expr::binary(
            *op,
            substitute(lhs, symbols),
            substitute(rhs, symbols),
            expr.span,
        ),
        ExprKind::Call { name, args } => Expr::call(
            name.clone(),
            args.iter().map(|a| substitute(a, symbols)).collect(),
            expr.span,
        ),
    }
}

// ---------------------------------------------------------------------------
// Operator evaluation
// ---------------------------------------------------------------------------

fn as_int(value: &ConstValue) -> Option<&BigInt> {
    match value {
        ConstValue::Int(n) => Some(n),
        ConstValue::Bytes(_) => None,
    }
}

/// The byte form a value takes on the runtime stack: byte strings as-is,
/// integers in script-number encoding.
pub fn const_to_stack_bytes(value: &ConstValue) -> Vec<u8> {
    match value {
        ConstValue::Int(n) => scriptnum_encode(n).to_vec(),
        ConstValue::Bytes(b) => b.clone(),
    }
}

fn bool_int(b: bool) -> ConstValue {
    ConstValue::Int(BigInt::from(if b { 1 } else { 0 }))
}

/// Applies a pure binary operator to two constants; `None` when the
/// operand types do not fit or the result is runtime-defined (division by
/// zero, oversized shift).
pub fn apply_binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    match op {
        BinaryOp::Arith(arith) => {
            let (l, r) = (as_int(lhs)?, as_int(rhs)?);
            let result = match arith {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
                ArithOp::Div => {
                    if r.is_zero() {
                        return None;
                    }
                    l / r
                }
                ArithOp::Mod => {
                    if r.is_zero() {
                        return None;
                    }
                    l % r
                }
            };
            Some(ConstValue::Int(result))
        }
        BinaryOp::Bit(bit) => {
            let (l, r) = (as_int(lhs)?, as_int(rhs)?);
            let result = match bit {
                BitOp::And => l & r,
                BitOp::Or => l | r,
                BitOp::Xor => l ^ r,
                BitOp::Shl | BitOp::Shr => {
                    let amount = r.to_u32().filter(|a| *a <= MAX_FOLD_SHIFT)?;
                    if matches!(bit, BitOp::Shl) {
                        l << amount
                    } else {
                        l >> amount
                    }
                }
            };
            Some(ConstValue::Int(result))
        }
        BinaryOp::Cmp(cmp) => match cmp {
            // Equality matches the runtime's byte comparison; on minimally
            // encoded numbers this coincides with numeric equality.
            CmpOp::Eq => Some(bool_int(
                const_to_stack_bytes(lhs) == const_to_stack_bytes(rhs),
            )),
            CmpOp::Ne => Some(bool_int(
                const_to_stack_bytes(lhs) != const_to_stack_bytes(rhs),
            )),
            CmpOp::Lt => Some(bool_int(as_int(lhs)? < as_int(rhs)?)),
            CmpOp::Le => Some(bool_int(as_int(lhs)? <= as_int(rhs)?)),
            CmpOp::Gt => Some(bool_int(as_int(lhs)? > as_int(rhs)?)),
            CmpOp::Ge => Some(bool_int(as_int(lhs)? >= as_int(rhs)?)),
        },
        BinaryOp::Bool(boolean) => {
            let (l, r) = (lhs.is_truthy(), rhs.is_truthy());
            Some(bool_int(match boolean {
                BoolOp::And => l && r,
                BoolOp::Or => l || r,
            }))
        }
    }
}

/// Applies a pure unary operator to a constant.
pub fn apply_unary(op: UnaryOp, value: &ConstValue) -> Option<ConstValue> {
    match op {
        UnaryOp::Neg => Some(ConstValue::Int(-as_int(value)?.clone())),
        UnaryOp::Not => Some(bool_int(!value.is_truthy())),
        UnaryOp::Invert => {
            let n = as_int(value)?;
            Some(ConstValue::Int(-n - 1))
        }
    }
}

/// Folds a pure opcode built-in over constant arguments.
fn apply_builtin_op(opcode: Opcode, args: &[ConstValue]) -> Option<ConstValue> {
    match (opcode, args) {
        (Opcode::Abs, [x]) => Some(ConstValue::Int(as_int(x)?.abs())),
        (Opcode::Size, [x]) => Some(ConstValue::Int(BigInt::from(
            const_to_stack_bytes(x).len(),
        ))),
        (Opcode::Min, [a, b]) => Some(ConstValue::Int(as_int(a)?.min(as_int(b)?).clone())),
        (Opcode::Max, [a, b]) => Some(ConstValue::Int(as_int(a)?.max(as_int(b)?).clone())),
        (Opcode::Cat, [a, b]) => {
            let mut bytes = const_to_stack_bytes(a);
            bytes.extend_from_slice(&const_to_stack_bytes(b));
            Some(ConstValue::Bytes(bytes))
        }
        (Opcode::Left, [a, n]) => {
            let bytes = const_to_stack_bytes(a);
            let n = as_int(n)?.to_usize().filter(|n| *n <= bytes.len())?;
            Some(ConstValue::Bytes(bytes[..n].to_vec()))
        }
        (Opcode::Right, [a, n]) => {
            let bytes = const_to_stack_bytes(a);
            let n = as_int(n)?.to_usize().filter(|n| *n <= bytes.len())?;
            Some(ConstValue::Bytes(bytes[bytes.len() - n..].to_vec()))
        }
        (Opcode::Substr, [a, start, len]) => {
            let bytes = const_to_stack_bytes(a);
            let start = as_int(start)?.to_usize()?;
            let len = as_int(len)?.to_usize()?;
            if start.checked_add(len)? > bytes.len() {
                return None;
            }
            Some(ConstValue::Bytes(bytes[start..start + len].to_vec()))
        }
        (Opcode::Within, [x, lo, hi]) => {
            let (x, lo, hi) = (as_int(x)?, as_int(lo)?, as_int(hi)?);
            Some(bool_int(lo <= x && x < hi))
        }
        (Opcode::Ripemd160, [x]) => Some(ConstValue::Bytes(ripemd160(&const_to_stack_bytes(x)))),
        (Opcode::Sha1, [x]) => Some(ConstValue::Bytes(sha1(&const_to_stack_bytes(x)))),
        (Opcode::Sha256, [x]) => Some(ConstValue::Bytes(sha256(&const_to_stack_bytes(x)))),
        (Opcode::Hash160, [x]) => Some(ConstValue::Bytes(hash160(&const_to_stack_bytes(x)))),
        (Opcode::Hash256, [x]) => Some(ConstValue::Bytes(hash256(&const_to_stack_bytes(x)))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Hash primitives (shared with the reference interpreter)
// ---------------------------------------------------------------------------

pub fn ripemd160(data: &[u8]) -> Vec<u8> {
    Ripemd160::digest(data).to_vec()
}

pub fn sha1(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

pub fn hash160(data: &[u8]) -> Vec<u8> {
    ripemd160(&sha256(data))
}

pub fn hash256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

// ---------------------------------------------------------------------------
// Validation built-ins
// ---------------------------------------------------------------------------

/// Runs a compile-time validator over a constant argument.
pub fn run_validator(
    validator: Validator,
    arg: &ConstValue,
    builtin_name: &str,
    span: Span,
) -> Result<ConstValue, SemanticError> {
    let fail = |reason: String| SemanticError::ValidationFailed {
        name: builtin_name.to_string(),
        reason,
        span,
    };
    let bytes = match arg {
        ConstValue::Bytes(b) => b,
        ConstValue::Int(_) => {
            return Err(fail("expected a byte literal".to_string()));
        }
    };
    match validator {
        Validator::CheckHash160 => {
            if bytes.len() != 20 {
                return Err(fail(format!("expected 20 bytes, got {}", bytes.len())));
            }
            Ok(ConstValue::Bytes(bytes.clone()))
        }
        Validator::CheckPubkey => {
            let valid = match bytes.len() {
                33 => matches!(bytes[0], 0x02 | 0x03),
                65 => bytes[0] == 0x04,
                _ => false,
            };
            if !valid {
                return Err(fail(format!(
                    "not a valid public key ({} bytes, prefix {:#04x})",
                    bytes.len(),
                    bytes.first().copied().unwrap_or(0)
                )));
            }
            Ok(ConstValue::Bytes(bytes.clone()))
        }
        Validator::AddressToHash160 => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| fail("address is not valid UTF-8".to_string()))?;
            let payload = base58_decode(text)
                .ok_or_else(|| fail("address is not valid base58".to_string()))?;
            if payload.len() != 25 {
                return Err(fail(format!(
                    "decoded address is {} bytes, expected 25",
                    payload.len()
                )));
            }
            let checksum = &hash256(&payload[..21])[..4];
            if checksum != &payload[21..] {
                return Err(fail("address checksum mismatch".to_string()));
            }
            Ok(ConstValue::Bytes(payload[1..21].to_vec()))
        }
    }
}

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Decodes a base58 string (Bitcoin alphabet). Leading '1's become
/// leading zero bytes.
pub fn base58_decode(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }
    let mut value = BigInt::zero();
    for ch in text.bytes() {
        let digit = BASE58_ALPHABET.iter().position(|&a| a == ch)?;
        value = value * BigInt::from(58u8) + BigInt::from(digit);
    }
    let leading_zeros = text.bytes().take_while(|&c| c == b'1').count();
    let mut out = vec![0u8; leading_zeros];
    if !value.is_zero() {
        let (_, magnitude) = value.to_bytes_be();
        out.extend_from_slice(&magnitude);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use txsc_core::span::Span;
    use txsc_core::types::Ty;

    use crate::symbol::Symbol;

    fn sp() -> Span {
        Span::new(1, 1)
    }

    fn int(v: i64) -> ConstValue {
        ConstValue::Int(BigInt::from(v))
    }

    #[test]
    fn arithmetic_folds() {
        let add = apply_binary(BinaryOp::Arith(ArithOp::Add), &int(5), &int(12));
        assert_eq!(add, Some(int(17)));
        let div = apply_binary(BinaryOp::Arith(ArithOp::Div), &int(7), &int(-2));
        assert_eq!(div, Some(int(-3))); // truncates toward zero
        let rem = apply_binary(BinaryOp::Arith(ArithOp::Mod), &int(-7), &int(2));
        assert_eq!(rem, Some(int(-1))); // sign follows dividend
    }

    #[test]
    fn division_by_zero_does_not_fold() {
        assert_eq!(
            apply_binary(BinaryOp::Arith(ArithOp::Div), &int(1), &int(0)),
            None
        );
        assert_eq!(
            apply_binary(BinaryOp::Arith(ArithOp::Mod), &int(1), &int(0)),
            None
        );
    }

    #[test]
    fn equality_compares_stack_encodings() {
        assert_eq!(
            apply_binary(BinaryOp::Cmp(CmpOp::Eq), &int(17), &int(17)),
            Some(int(1))
        );
        // 1 encodes as [0x01], so the byte literal '01' equals it.
        assert_eq!(
            apply_binary(
                BinaryOp::Cmp(CmpOp::Eq),
                &int(1),
                &ConstValue::Bytes(vec![0x01])
            ),
            Some(int(1))
        );
        assert_eq!(
            apply_binary(BinaryOp::Cmp(CmpOp::Ne), &int(1), &int(2)),
            Some(int(1))
        );
    }

    #[test]
    fn bitwise_and_shift_folds() {
        assert_eq!(
            apply_binary(BinaryOp::Bit(BitOp::And), &int(0b1100), &int(0b1010)),
            Some(int(0b1000))
        );
        assert_eq!(
            apply_binary(BinaryOp::Bit(BitOp::Shl), &int(3), &int(4)),
            Some(int(48))
        );
        assert_eq!(
            apply_binary(BinaryOp::Bit(BitOp::Shr), &int(-16), &int(2)),
            Some(int(-4))
        );
        // Negative or absurd shift distances are left for runtime.
        assert_eq!(
            apply_binary(BinaryOp::Bit(BitOp::Shl), &int(1), &int(-1)),
            None
        );
    }

    #[test]
    fn unary_folds() {
        assert_eq!(apply_unary(UnaryOp::Neg, &int(5)), Some(int(-5)));
        assert_eq!(apply_unary(UnaryOp::Not, &int(0)), Some(int(1)));
        assert_eq!(apply_unary(UnaryOp::Not, &int(5)), Some(int(0)));
        assert_eq!(apply_unary(UnaryOp::Invert, &int(0)), Some(int(-1)));
    }

    #[test]
    fn byte_builtins_fold() {
        let cat = Expr::call(
            "concat",
            vec![
                Expr::bytes(vec![0x11], sp()),
                Expr::bytes(vec![0x22], sp()),
            ],
            sp(),
        );
        let symbols = SymbolTable::new();
        assert_eq!(
            eval_expr(&cat, &symbols).unwrap(),
            Some(ConstValue::Bytes(vec![0x11, 0x22]))
        );

        let substr = Expr::call(
            "substr",
            vec![
                Expr::bytes(vec![1, 2, 3, 4], sp()),
                Expr::int(1, sp()),
                Expr::int(2, sp()),
            ],
            sp(),
        );
        assert_eq!(
            eval_expr(&substr, &symbols).unwrap(),
            Some(ConstValue::Bytes(vec![2, 3]))
        );
    }

    #[test]
    fn hash_builtins_match_known_vectors() {
        // sha256("abc")
        let sha = sha256(b"abc");
        assert_eq!(
            sha[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "sha256 prefix mismatch"
        );
        // sha1("")
        assert_eq!(sha1(b"")[..4], [0xda, 0x39, 0xa3, 0xee]);
        // hash160 of the empty string, a widely published vector
        assert_eq!(hash160(b"")[..4], [0xb4, 0x72, 0xa2, 0x66]);
    }

    #[test]
    fn checksig_never_folds() {
        let call = Expr::call(
            "checkSig",
            vec![Expr::bytes(vec![1], sp()), Expr::bytes(vec![2], sp())],
            sp(),
        );
        let symbols = SymbolTable::new();
        assert_eq!(eval_expr(&call, &symbols).unwrap(), None);
    }

    #[test]
    fn name_resolution_through_bindings() {
        let mut symbols = SymbolTable::new();
        symbols
            .declare("x", Symbol::new(Binding::Const(int(17)), Ty::Int, false, sp()))
            .unwrap();
        symbols
            .declare(
                "y",
                Symbol::new(
                    Binding::Expr {
                        ast: Expr::binary(
                            BinaryOp::Arith(ArithOp::Add),
                            Expr::name("x", sp()),
                            Expr::int(1, sp()),
                            sp(),
                        ),
                    },
                    Ty::Int,
                    false,
                    sp(),
                ),
            )
            .unwrap();

        let use_y = Expr::name("y", sp());
        assert_eq!(eval_expr(&use_y, &symbols).unwrap(), Some(int(18)));
    }

    #[test]
    fn self_referential_binding_does_not_loop() {
        let mut symbols = SymbolTable::new();
        symbols
            .declare(
                "x",
                Symbol::new(
                    Binding::Expr {
                        ast: Expr::name("x", sp()),
                    },
                    Ty::Expr,
                    false,
                    sp(),
                ),
            )
            .unwrap();
        assert_eq!(
            eval_expr(&Expr::name("x", sp()), &symbols).unwrap(),
            None
        );
    }

    #[test]
    fn user_function_with_constant_args_evaluates() {
        let decl = FuncDecl {
            name: "addFive".into(),
            ret_ty: Ty::Int,
            params: vec!["x".into()],
            body: vec![Stmt::return_(
                Expr::binary(
                    BinaryOp::Arith(ArithOp::Add),
                    Expr::name("x", sp()),
                    Expr::int(5, sp()),
                    sp(),
                ),
                sp(),
            )],
            span: sp(),
        };
        let mut symbols = SymbolTable::new();
        symbols
            .declare(
                "addFive",
                Symbol::new(Binding::Func(decl), Ty::Int, false, sp()),
            )
            .unwrap();

        let call = Expr::call("addFive", vec![Expr::int(10, sp())], sp());
        assert_eq!(eval_expr(&call, &symbols).unwrap(), Some(int(15)));
    }

    #[test]
    fn substitute_captures_current_values() {
        let mut symbols = SymbolTable::new();
        symbols
            .declare(
                "a",
                Symbol::new(
                    Binding::Expr {
                        ast: Expr::int(3, sp()),
                    },
                    Ty::Int,
                    true,
                    sp(),
                ),
            )
            .unwrap();
        // a + 1 with a bound to 3 becomes 3 + 1
        let rhs = Expr::binary(
            BinaryOp::Arith(ArithOp::Add),
            Expr::name("a", sp()),
            Expr::int(1, sp()),
            sp(),
        );
        let captured = substitute(&rhs, &symbols);
        match &captured.kind {
            ExprKind::Binary { lhs, .. } => {
                assert_eq!(lhs.kind, ExprKind::Int(BigInt::from(3)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn validator_check_hash160() {
        let ok = run_validator(
            Validator::CheckHash160,
            &ConstValue::Bytes(vec![0x10; 20]),
            "check_hash160",
            sp(),
        );
        assert!(ok.is_ok());
        let err = run_validator(
            Validator::CheckHash160,
            &ConstValue::Bytes(vec![0x10; 19]),
            "check_hash160",
            sp(),
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::ValidationFailed { .. }));
    }

    #[test]
    fn validator_check_pubkey() {
        let mut compressed = vec![0x02];
        compressed.extend_from_slice(&[0xab; 32]);
        assert!(run_validator(
            Validator::CheckPubkey,
            &ConstValue::Bytes(compressed),
            "check_pubkey",
            sp()
        )
        .is_ok());

        let mut uncompressed = vec![0x04];
        uncompressed.extend_from_slice(&[0xcd; 64]);
        assert!(run_validator(
            Validator::CheckPubkey,
            &ConstValue::Bytes(uncompressed),
            "check_pubkey",
            sp()
        )
        .is_ok());

        let mut bad_prefix = vec![0x05];
        bad_prefix.extend_from_slice(&[0xab; 32]);
        assert!(run_validator(
            Validator::CheckPubkey,
            &ConstValue::Bytes(bad_prefix),
            "check_pubkey",
            sp()
        )
        .is_err());
    }

    #[test]
    fn address_decodes_to_its_hash160() {
        // The canonical all-zeros address (version 0x00, hash160 of twenty
        // zero bytes).
        let address = "1111111111111111111114oLvT2";
        let result = run_validator(
            Validator::AddressToHash160,
            &ConstValue::Bytes(address.as_bytes().to_vec()),
            "address_to_hash160",
            sp(),
        )
        .unwrap();
        assert_eq!(result, ConstValue::Bytes(vec![0u8; 20]));
    }

    #[test]
    fn corrupted_address_fails_checksum() {
        let address = "1111111111111111111114oLvT3";
        let err = run_validator(
            Validator::AddressToHash160,
            &ConstValue::Bytes(address.as_bytes().to_vec()),
            "address_to_hash160",
            sp(),
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::ValidationFailed { .. }));
    }

    #[test]
    fn base58_rejects_invalid_characters() {
        assert!(base58_decode("0OIl").is_none());
        assert!(base58_decode("").is_none());
    }
}
