//! Reference stack-machine interpreter.
//!
//! A compact executor for the opcode IR, used by the test suite to state
//! the optimizer-equivalence property (`interpret(IR_unopt, stack) ==
//! interpret(IR_opt, stack)`). The compile pipeline never calls it.
//!
//! Semantics follow the compiler's own model: script numbers are
//! arbitrary precision, bitwise opcodes operate numerically, and the
//! signature checks are a deterministic stand-in (a signature/key pair
//! "verifies" when both are non-empty). It is a test oracle, not a
//! consensus implementation.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use thiserror::Error;

use txsc_core::opcode::Opcode;
use txsc_core::script::{cast_to_bool, scriptnum_decode, scriptnum_encode, OpInstr, Script};

use crate::consteval::{hash160, hash256, ripemd160, sha1, sha256};

/// Largest shift distance the machine will execute.
const MAX_SHIFT: u32 = 4096;

/// Structural execution failures. Script-level failures (failed verify,
/// division by zero, out-of-range substring) are not errors -- they mark
/// the script invalid in the [`ExecResult`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("stack underflow executing {op}")]
    StackUnderflow { op: String },

    #[error("unbalanced conditional")]
    UnbalancedConditional,
}

/// Outcome of executing a script against an initial stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    /// Set when `OP_RETURN` executed or a verify-class opcode failed.
    pub invalid: bool,
    /// The stack at termination, bottom first.
    pub stack: Vec<Vec<u8>>,
}

/// Executes `script` against `initial` (bottom first). Deterministic.
pub fn execute(script: &Script, initial: Vec<Vec<u8>>) -> Result<ExecResult, ExecError> {
    let mut machine = Machine {
        stack: initial,
        conds: Vec::new(),
    };
    for instr in script.iter() {
        if let Control::Halt = machine.step(instr)? {
            return Ok(ExecResult {
                invalid: true,
                stack: machine.stack,
            });
        }
    }
    if !machine.conds.is_empty() {
        return Err(ExecError::UnbalancedConditional);
    }
    Ok(ExecResult {
        invalid: false,
        stack: machine.stack,
    })
}

enum Control {
    Continue,
    Halt,
}

struct Cond {
    executing: bool,
    taken: bool,
    seen_else: bool,
}

struct Machine {
    stack: Vec<Vec<u8>>,
    conds: Vec<Cond>,
}

impl Machine {
    fn step(&mut self, instr: &OpInstr) -> Result<Control, ExecError> {
        let executing = self.conds.iter().all(|c| c.executing);
        match instr {
            OpInstr::PushInt(n) => {
                if executing {
                    self.stack.push(scriptnum_encode(n).to_vec());
                }
                Ok(Control::Continue)
            }
            OpInstr::PushBytes(b) => {
                if executing {
                    self.stack.push(b.clone());
                }
                Ok(Control::Continue)
            }
            OpInstr::Op(op) if op.is_control_flow() => self.step_control(*op, executing),
            OpInstr::Op(op) => {
                if executing {
                    self.exec_op(*op)
                } else {
                    Ok(Control::Continue)
                }
            }
        }
    }

    fn step_control(&mut self, op: Opcode, executing: bool) -> Result<Control, ExecError> {
        match op {
            Opcode::If | Opcode::NotIf => {
                if executing {
                    let value = self.pop(op)?;
                    let mut taken = cast_to_bool(&value);
                    if op == Opcode::NotIf {
                        taken = !taken;
                    }
                    self.conds.push(Cond {
                        executing: taken,
                        taken,
                        seen_else: false,
                    });
                } else {
                    // A conditional inside a skipped branch: both arms skip.
                    self.conds.push(Cond {
                        executing: false,
                        taken: true,
                        seen_else: false,
                    });
                }
                Ok(Control::Continue)
            }
            Opcode::Else => {
                let parent_executing = self
                    .conds
                    .iter()
                    .rev()
                    .skip(1)
                    .all(|c| c.executing);
                let top = self
                    .conds
                    .last_mut()
                    .ok_or(ExecError::UnbalancedConditional)?;
                if top.seen_else {
                    return Err(ExecError::UnbalancedConditional);
                }
                top.seen_else = true;
                top.executing = parent_executing && !top.taken;
                Ok(Control::Continue)
            }
            Opcode::EndIf => {
                self.conds
                    .pop()
                    .ok_or(ExecError::UnbalancedConditional)?;
                Ok(Control::Continue)
            }
            _ => unreachable!("not a control-flow opcode"),
        }
    }

    fn pop(&mut self, op: Opcode) -> Result<Vec<u8>, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow {
            op: op.name().to_string(),
        })
    }

    fn pop_num(&mut self, op: Opcode) -> Result<BigInt, ExecError> {
        Ok(scriptnum_decode(&self.pop(op)?))
    }

    fn peek_at(&self, depth: usize, op: Opcode) -> Result<Vec<u8>, ExecError> {
        if depth >= self.stack.len() {
            return Err(ExecError::StackUnderflow {
                op: op.name().to_string(),
            });
        }
        Ok(self.stack[self.stack.len() - 1 - depth].clone())
    }

    fn push_num(&mut self, n: BigInt) {
        self.stack.push(scriptnum_encode(&n).to_vec());
    }

    fn push_bool(&mut self, b: bool) {
        self.stack.push(if b { vec![1] } else { vec![] });
    }

    fn exec_op(&mut self, op: Opcode) -> Result<Control, ExecError> {
        use Opcode::*;
        match op {
            Verify => {
                let value = self.pop(op)?;
                if !cast_to_bool(&value) {
                    return Ok(Control::Halt);
                }
            }
            Return => return Ok(Control::Halt),

            Drop => {
                self.pop(op)?;
            }
            Dup => {
                let top = self.peek_at(0, op)?;
                self.stack.push(top);
            }
            Nip => {
                let top = self.pop(op)?;
                self.pop(op)?;
                self.stack.push(top);
            }
            Over => {
                let second = self.peek_at(1, op)?;
                self.stack.push(second);
            }
            Pick | Roll => {
                let depth = self.pop_num(op)?;
                let depth = match depth.to_usize().filter(|d| *d < self.stack.len()) {
                    Some(d) => d,
                    None => return Ok(Control::Halt),
                };
                let index = self.stack.len() - 1 - depth;
                let item = if op == Pick {
                    self.stack[index].clone()
                } else {
                    self.stack.remove(index)
                };
                self.stack.push(item);
            }
            Rot => {
                let x3 = self.pop(op)?;
                let x2 = self.pop(op)?;
                let x1 = self.pop(op)?;
                self.stack.push(x2);
                self.stack.push(x3);
                self.stack.push(x1);
            }
            Swap => {
                let x2 = self.pop(op)?;
                let x1 = self.pop(op)?;
                self.stack.push(x2);
                self.stack.push(x1);
            }
            Tuck => {
                let x2 = self.pop(op)?;
                let x1 = self.pop(op)?;
                self.stack.push(x2.clone());
                self.stack.push(x1);
                self.stack.push(x2);
            }

            Cat => {
                let b = self.pop(op)?;
                let mut a = self.pop(op)?;
                a.extend_from_slice(&b);
                self.stack.push(a);
            }
            Substr => {
                let len = self.pop_num(op)?;
                let start = self.pop_num(op)?;
                let s = self.pop(op)?;
                let (start, len) = match (start.to_usize(), len.to_usize()) {
                    (Some(start), Some(len)) if start + len <= s.len() => (start, len),
                    _ => return Ok(Control::Halt),
                };
                self.stack.push(s[start..start + len].to_vec());
            }
            Left => {
                let n = self.pop_num(op)?;
                let s = self.pop(op)?;
                match n.to_usize().filter(|n| *n <= s.len()) {
                    Some(n) => self.stack.push(s[..n].to_vec()),
                    None => return Ok(Control::Halt),
                }
            }
            Right => {
                let n = self.pop_num(op)?;
                let s = self.pop(op)?;
                match n.to_usize().filter(|n| *n <= s.len()) {
                    Some(n) => self.stack.push(s[s.len() - n..].to_vec()),
                    None => return Ok(Control::Halt),
                }
            }
            Size => {
                let top = self.peek_at(0, op)?;
                self.push_num(BigInt::from(top.len()));
            }

            Invert => {
                let n = self.pop_num(op)?;
                self.push_num(-n - 1);
            }
            And | Or | Xor => {
                let b = self.pop_num(op)?;
                let a = self.pop_num(op)?;
                let result = match op {
                    And => a & b,
                    Or => a | b,
                    _ => a ^ b,
                };
                self.push_num(result);
            }
            Equal => {
                let b = self.pop(op)?;
                let a = self.pop(op)?;
                self.push_bool(a == b);
            }
            EqualVerify => {
                let b = self.pop(op)?;
                let a = self.pop(op)?;
                if a != b {
                    return Ok(Control::Halt);
                }
            }

            Negate => {
                let n = self.pop_num(op)?;
                self.push_num(-n);
            }
            Abs => {
                let n = self.pop_num(op)?;
                self.push_num(n.abs());
            }
            Not => {
                let value = self.pop(op)?;
                self.push_bool(!cast_to_bool(&value));
            }
            ZeroNotEqual => {
                let n = self.pop_num(op)?;
                self.push_bool(!n.is_zero());
            }
            Add | Sub | Mul | Min | Max => {
                let b = self.pop_num(op)?;
                let a = self.pop_num(op)?;
                let result = match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Min => a.min(b),
                    _ => a.max(b),
                };
                self.push_num(result);
            }
            Div | Mod => {
                let b = self.pop_num(op)?;
                let a = self.pop_num(op)?;
                if b.is_zero() {
                    return Ok(Control::Halt);
                }
                self.push_num(if op == Div { a / b } else { a % b });
            }
            LShift | RShift => {
                let amount = self.pop_num(op)?;
                let n = self.pop_num(op)?;
                let amount = match amount.to_u32().filter(|a| *a <= MAX_SHIFT) {
                    Some(a) => a,
                    None => return Ok(Control::Halt),
                };
                self.push_num(if op == LShift { n << amount } else { n >> amount });
            }
            BoolAnd | BoolOr => {
                let b = self.pop(op)?;
                let a = self.pop(op)?;
                let (a, b) = (cast_to_bool(&a), cast_to_bool(&b));
                self.push_bool(if op == BoolAnd { a && b } else { a || b });
            }
            NumEqual | NumNotEqual | LessThan | GreaterThan | LessThanOrEqual
            | GreaterThanOrEqual => {
                let b = self.pop_num(op)?;
                let a = self.pop_num(op)?;
                let result = match op {
                    NumEqual => a == b,
                    NumNotEqual => a != b,
                    LessThan => a < b,
                    GreaterThan => a > b,
                    LessThanOrEqual => a <= b,
                    _ => a >= b,
                };
                self.push_bool(result);
            }
            NumEqualVerify => {
                let b = self.pop_num(op)?;
                let a = self.pop_num(op)?;
                if a != b {
                    return Ok(Control::Halt);
                }
            }
            Within => {
                let hi = self.pop_num(op)?;
                let lo = self.pop_num(op)?;
                let x = self.pop_num(op)?;
                self.push_bool(lo <= x && x < hi);
            }

            Ripemd160 => {
                let data = self.pop(op)?;
                self.stack.push(ripemd160(&data));
            }
            Sha1 => {
                let data = self.pop(op)?;
                self.stack.push(sha1(&data));
            }
            Sha256 => {
                let data = self.pop(op)?;
                self.stack.push(sha256(&data));
            }
            Hash160 => {
                let data = self.pop(op)?;
                self.stack.push(hash160(&data));
            }
            Hash256 => {
                let data = self.pop(op)?;
                self.stack.push(hash256(&data));
            }

            CheckSig | CheckSigVerify => {
                let key = self.pop(op)?;
                let sig = self.pop(op)?;
                let valid = !sig.is_empty() && !key.is_empty();
                if op == CheckSig {
                    self.push_bool(valid);
                } else if !valid {
                    return Ok(Control::Halt);
                }
            }
            CheckMultiSig | CheckMultiSigVerify => {
                let key_count = self.pop_num(op)?;
                let key_count = match key_count.to_usize().filter(|n| *n <= 20) {
                    Some(n) => n,
                    None => return Ok(Control::Halt),
                };
                let mut keys = Vec::with_capacity(key_count);
                for _ in 0..key_count {
                    keys.push(self.pop(op)?);
                }
                let sig_count = self.pop_num(op)?;
                let sig_count = match sig_count.to_usize().filter(|n| *n <= key_count) {
                    Some(n) => n,
                    None => return Ok(Control::Halt),
                };
                let mut sigs = Vec::with_capacity(sig_count);
                for _ in 0..sig_count {
                    sigs.push(self.pop(op)?);
                }
                let valid = sigs.iter().all(|s| !s.is_empty())
                    && keys.iter().all(|k| !k.is_empty());
                if op == CheckMultiSig {
                    self.push_bool(valid);
                } else if !valid {
                    return Ok(Control::Halt);
                }
            }

            If | NotIf | Else | EndIf => unreachable!("handled by step_control"),
        }
        Ok(Control::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(instrs: Vec<OpInstr>, initial: Vec<Vec<u8>>) -> ExecResult {
        let script: Script = instrs.into_iter().collect();
        execute(&script, initial).unwrap()
    }

    #[test]
    fn empty_script_passes_stack_through() {
        let result = run(vec![], vec![vec![0x01]]);
        assert!(!result.invalid);
        assert_eq!(result.stack, vec![vec![0x01]]);
    }

    #[test]
    fn arithmetic_executes() {
        let result = run(
            vec![
                OpInstr::push_int(5),
                OpInstr::push_int(12),
                OpInstr::Op(Opcode::Add),
            ],
            vec![],
        );
        assert_eq!(result.stack, vec![vec![17]]);
    }

    #[test]
    fn verify_fails_on_zero() {
        let result = run(
            vec![OpInstr::push_int(0), OpInstr::Op(Opcode::Verify)],
            vec![],
        );
        assert!(result.invalid);
    }

    #[test]
    fn return_marks_invalid_but_keeps_stack() {
        let result = run(
            vec![OpInstr::Op(Opcode::Return), OpInstr::PushBytes(vec![0x11])],
            vec![],
        );
        assert!(result.invalid);
        assert!(result.stack.is_empty());
    }

    #[test]
    fn conditionals_select_branch() {
        // 1 IF 10 ELSE 20 ENDIF
        let result = run(
            vec![
                OpInstr::push_int(1),
                OpInstr::Op(Opcode::If),
                OpInstr::push_int(10),
                OpInstr::Op(Opcode::Else),
                OpInstr::push_int(20),
                OpInstr::Op(Opcode::EndIf),
            ],
            vec![],
        );
        assert_eq!(result.stack, vec![vec![10]]);

        let result = run(
            vec![
                OpInstr::push_int(0),
                OpInstr::Op(Opcode::If),
                OpInstr::push_int(10),
                OpInstr::Op(Opcode::Else),
                OpInstr::push_int(20),
                OpInstr::Op(Opcode::EndIf),
            ],
            vec![],
        );
        assert_eq!(result.stack, vec![vec![20]]);
    }

    #[test]
    fn nested_skipped_conditionals_stay_skipped() {
        // 0 IF 1 IF 99 ENDIF ELSE 7 ENDIF
        let result = run(
            vec![
                OpInstr::push_int(0),
                OpInstr::Op(Opcode::If),
                OpInstr::push_int(1),
                OpInstr::Op(Opcode::If),
                OpInstr::push_int(99),
                OpInstr::Op(Opcode::EndIf),
                OpInstr::Op(Opcode::Else),
                OpInstr::push_int(7),
                OpInstr::Op(Opcode::EndIf),
            ],
            vec![],
        );
        assert_eq!(result.stack, vec![vec![7]]);
    }

    #[test]
    fn pick_and_roll() {
        // stack: a b c; 2 PICK copies a to the top
        let result = run(
            vec![OpInstr::push_int(2), OpInstr::Op(Opcode::Pick)],
            vec![vec![0xaa], vec![0xbb], vec![0xcc]],
        );
        assert_eq!(
            result.stack,
            vec![vec![0xaa], vec![0xbb], vec![0xcc], vec![0xaa]]
        );

        // 2 ROLL moves a to the top
        let result = run(
            vec![OpInstr::push_int(2), OpInstr::Op(Opcode::Roll)],
            vec![vec![0xaa], vec![0xbb], vec![0xcc]],
        );
        assert_eq!(result.stack, vec![vec![0xbb], vec![0xcc], vec![0xaa]]);
    }

    #[test]
    fn p2pkh_template_runs() {
        // DUP HASH160 <hash> EQUALVERIFY CHECKSIG over [sig, pubkey]
        let pubkey = vec![0x02; 33];
        let hash = hash160(&pubkey);
        let result = run(
            vec![
                OpInstr::Op(Opcode::Dup),
                OpInstr::Op(Opcode::Hash160),
                OpInstr::PushBytes(hash),
                OpInstr::Op(Opcode::EqualVerify),
                OpInstr::Op(Opcode::CheckSig),
            ],
            vec![vec![0x30; 70], pubkey],
        );
        assert!(!result.invalid);
        assert_eq!(result.stack, vec![vec![1]]);
    }

    #[test]
    fn division_by_zero_invalidates() {
        let result = run(
            vec![
                OpInstr::push_int(1),
                OpInstr::push_int(0),
                OpInstr::Op(Opcode::Div),
            ],
            vec![],
        );
        assert!(result.invalid);
    }

    #[test]
    fn underflow_is_a_structural_error() {
        let script: Script = vec![OpInstr::Op(Opcode::Add)].into_iter().collect();
        assert!(matches!(
            execute(&script, vec![]),
            Err(ExecError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn unbalanced_conditional_is_detected() {
        let script: Script = vec![OpInstr::push_int(1), OpInstr::Op(Opcode::If)]
            .into_iter()
            .collect();
        assert!(matches!(
            execute(&script, vec![]),
            Err(ExecError::UnbalancedConditional)
        ));
    }

    #[test]
    fn size_keeps_operand() {
        let result = run(
            vec![OpInstr::Op(Opcode::Size)],
            vec![vec![0xaa, 0xbb, 0xcc]],
        );
        assert_eq!(result.stack, vec![vec![0xaa, 0xbb, 0xcc], vec![3]]);
    }
}
