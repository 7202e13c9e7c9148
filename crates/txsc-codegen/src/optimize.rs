//! The optimizer: AST constant folding, peephole rewrites, dead-code
//! elimination.
//!
//! Folding runs once over the AST before lowering; the opcode-level
//! passes run to fixpoint afterwards. Every rewrite site emits a log
//! entry at the default verbosity. Rewrites are applied only where they
//! provably preserve stack shape and side-effect ordering -- adjacent
//! `OP_VERIFY`s are never merged, and `OP_NOT OP_NOT` is only dropped in
//! front of a boolean consumer.

use num_bigint::BigInt;
use tracing::info;

use txsc_check::check::capture_func_body;
use txsc_check::consteval;
use txsc_check::symbol::{Binding, Symbol, SymbolTable};
use txsc_core::ast::{Expr, ExprKind, Program, Stmt, StmtKind};
use txsc_core::opcode::Opcode;
use txsc_core::script::{OpInstr, Script};
use txsc_core::span::Span;
use txsc_core::types::{ConstValue, Ty};

// ---------------------------------------------------------------------------
// AST constant folding
// ---------------------------------------------------------------------------

/// Folds every constant-resolvable pure expression in the program and
/// drops `verify` statements whose condition folds truthy. Produces a
/// fresh tree; the input AST is never mutated.
pub fn fold_program(program: &Program, verbosity: u8) -> Program {
    let mut folder = Folder {
        symbols: SymbolTable::new(),
        verbosity,
    };
    Program::new(folder.fold_body(&program.stmts))
}

struct Folder {
    symbols: SymbolTable,
    verbosity: u8,
}

impl Folder {
    fn log(&self, span: Span, what: &str) {
        if self.verbosity >= 1 {
            info!(target: "txsc::optimizer", "fold at {}: {}", span, what);
        }
    }

    fn fold_body(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        stmts
            .iter()
            .filter_map(|stmt| self.fold_stmt(stmt))
            .collect()
    }

    fn fold_stmt(&mut self, stmt: &Stmt) -> Option<Stmt> {
        let kind = match &stmt.kind {
            StmtKind::Assume { names } => {
                for (i, name) in names.iter().enumerate() {
                    let depth = names.len() - 1 - i;
                    let _ = self.symbols.declare(
                        name,
                        Symbol::new(Binding::Stack { depth }, Ty::Expr, false, stmt.span),
                    );
                }
                stmt.kind.clone()
            }

            StmtKind::Let {
                name,
                mutable,
                value,
            } => {
                let value = self.fold_expr(value);
                let (binding, ty) = match consteval::literal_const(&value) {
                    Some(v) if !mutable => {
                        let ty = v.ty();
                        (Binding::Const(v), ty)
                    }
                    _ => (Binding::Expr { ast: value.clone() }, Ty::Expr),
                };
                let _ = self
                    .symbols
                    .declare(name, Symbol::new(binding, ty, *mutable, stmt.span));
                StmtKind::Let {
                    name: name.clone(),
                    mutable: *mutable,
                    value,
                }
            }

            StmtKind::Assign { name, value } => {
                let value = self.fold_expr(value);
                let captured = consteval::substitute(&value, &self.symbols);
                let _ = self.symbols.reassign(name, captured, Ty::Expr, stmt.span);
                StmtKind::Assign {
                    name: name.clone(),
                    value,
                }
            }

            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = self.fold_expr(cond);
                self.symbols.enter_scope();
                let then_body = self.fold_body(then_body);
                self.symbols.exit_scope();
                self.symbols.enter_scope();
                let else_body = self.fold_body(else_body);
                self.symbols.exit_scope();
                StmtKind::If {
                    cond,
                    then_body,
                    else_body,
                }
            }

            StmtKind::FuncDecl(decl) => {
                let captured = capture_func_body(decl, &self.symbols);
                let _ = self.symbols.declare(
                    &decl.name,
                    Symbol::new(Binding::Func(captured), decl.ret_ty, false, decl.span),
                );
                stmt.kind.clone()
            }

            StmtKind::Return { value } => StmtKind::Return {
                value: self.fold_expr(value),
            },

            StmtKind::Verify { value } => {
                let value = self.fold_expr(value);
                if let Some(v) = consteval::literal_const(&value) {
                    if v.is_truthy() {
                        self.log(stmt.span, "dropped tautological verify");
                        return None;
                    }
                }
                StmtKind::Verify { value }
            }

            StmtKind::Push { value } => StmtKind::Push {
                value: self.fold_expr(value),
            },

            StmtKind::Expr { value } => StmtKind::Expr {
                value: self.fold_expr(value),
            },
        };
        Some(Stmt::new(kind, stmt.span))
    }

    fn fold_expr(&mut self, expr: &Expr) -> Expr {
        if consteval::literal_const(expr).is_some() {
            return expr.clone();
        }
        // Validator errors cannot occur here: the checker has already run
        // every validator over the same expressions.
        if let Some(value) = consteval::eval_expr(expr, &self.symbols).unwrap_or(None) {
            self.log(expr.span, &format!("constant-folded to {}", value));
            return const_expr(value, expr.span);
        }
        match &expr.kind {
            ExprKind::Unary { op, operand } => {
                Expr::unary(*op, self.fold_expr(operand), expr.span)
            }
            ExprKind::Binary { op, lhs, rhs } => Expr::binary(
                *op,
                self.fold_expr(lhs),
                self.fold_expr(rhs),
                expr.span,
            ),
            ExprKind::Call { name, args } => Expr::call(
                name.clone(),
                args.iter().map(|a| self.fold_expr(a)).collect(),
                expr.span,
            ),
            _ => expr.clone(),
        }
    }
}

fn const_expr(value: ConstValue, span: Span) -> Expr {
    match value {
        ConstValue::Int(n) => Expr::int(n, span),
        ConstValue::Bytes(b) => Expr::bytes(b, span),
    }
}

// ---------------------------------------------------------------------------
// Peephole + dead-code elimination on the opcode IR
// ---------------------------------------------------------------------------

/// Runs peephole rewriting and dead-code elimination to fixpoint,
/// rewriting the script in place.
pub fn optimize_script(script: &mut Script, verbosity: u8) {
    loop {
        let mut changed = peephole_pass(script, verbosity);
        changed |= dce_pass(script, verbosity);
        if !changed {
            break;
        }
    }
}

fn log_rewrite(verbosity: u8, index: usize, what: &str) {
    if verbosity >= 1 {
        info!(target: "txsc::optimizer", "peephole at {}: {}", index, what);
    }
}

/// One left-to-right peephole sweep. Longer patterns match first.
fn peephole_pass(script: &mut Script, verbosity: u8) -> bool {
    use OpInstr::{Op, PushInt};

    let instrs = &script.instrs;
    let mut out: Vec<OpInstr> = Vec::with_capacity(instrs.len());
    let mut changed = false;
    let mut i = 0;

    while i < instrs.len() {
        // Three-instruction windows.
        match &instrs[i..] {
            [PushInt(a), PushInt(b), Op(Opcode::Add), ..] => {
                log_rewrite(verbosity, i, "folded pushed addition");
                out.push(OpInstr::PushInt(a + b));
                i += 3;
                changed = true;
                continue;
            }
            [PushInt(a), PushInt(b), Op(Opcode::Sub), ..] => {
                log_rewrite(verbosity, i, "folded pushed subtraction");
                out.push(OpInstr::PushInt(a - b));
                i += 3;
                changed = true;
                continue;
            }
            [Op(Opcode::Not), Op(Opcode::Not), Op(consumer @ (Opcode::Verify | Opcode::If)), ..] =>
            {
                // Double negation is only an identity for a boolean
                // consumer.
                log_rewrite(verbosity, i, "dropped double negation");
                out.push(OpInstr::Op(*consumer));
                i += 3;
                changed = true;
                continue;
            }
            _ => {}
        }

        // Two-instruction windows.
        match &instrs[i..] {
            [PushInt(n), Op(Opcode::Pick), ..] if *n == BigInt::from(0) => {
                log_rewrite(verbosity, i, "0 OP_PICK -> OP_DUP");
                out.push(OpInstr::Op(Opcode::Dup));
                i += 2;
                changed = true;
                continue;
            }
            [PushInt(n), Op(Opcode::Pick), ..] if *n == BigInt::from(1) => {
                log_rewrite(verbosity, i, "1 OP_PICK -> OP_OVER");
                out.push(OpInstr::Op(Opcode::Over));
                i += 2;
                changed = true;
                continue;
            }
            [PushInt(n), Op(Opcode::Roll), ..] if *n == BigInt::from(0) => {
                log_rewrite(verbosity, i, "0 OP_ROLL -> nothing");
                i += 2;
                changed = true;
                continue;
            }
            [PushInt(n), Op(Opcode::Roll), ..] if *n == BigInt::from(1) => {
                log_rewrite(verbosity, i, "1 OP_ROLL -> OP_SWAP");
                out.push(OpInstr::Op(Opcode::Swap));
                i += 2;
                changed = true;
                continue;
            }
            [Op(Opcode::Swap), Op(Opcode::Swap), ..] => {
                log_rewrite(verbosity, i, "cancelled swap pair");
                i += 2;
                changed = true;
                continue;
            }
            [Op(Opcode::Dup), Op(Opcode::Drop), ..] => {
                log_rewrite(verbosity, i, "cancelled dup/drop pair");
                i += 2;
                changed = true;
                continue;
            }
            [PushInt(n), Op(Opcode::Verify), ..] if *n != BigInt::from(0) => {
                log_rewrite(verbosity, i, "dropped tautological verify");
                i += 2;
                changed = true;
                continue;
            }
            [Op(op), Op(Opcode::Verify), ..] if op.verify_variant().is_some() => {
                let fused = op.verify_variant().expect("guard checked");
                log_rewrite(verbosity, i, &format!("fused into {}", fused.name()));
                out.push(OpInstr::Op(fused));
                i += 2;
                changed = true;
                continue;
            }
            _ => {}
        }

        out.push(instrs[i].clone());
        i += 1;
    }

    if changed {
        script.instrs = out;
    }
    changed
}

/// Dead-code elimination: after an unconditional `OP_RETURN` only data
/// pushes survive (the data-embedding idiom), and a push immediately
/// consumed by `OP_DROP` is removed.
fn dce_pass(script: &mut Script, verbosity: u8) -> bool {
    let mut changed = false;

    // Keep only pushes after the first top-level OP_RETURN.
    let mut depth = 0u32;
    let mut return_at = None;
    for (index, instr) in script.instrs.iter().enumerate() {
        match instr {
            OpInstr::Op(Opcode::If) | OpInstr::Op(Opcode::NotIf) => depth += 1,
            OpInstr::Op(Opcode::EndIf) => depth = depth.saturating_sub(1),
            OpInstr::Op(Opcode::Return) if depth == 0 => {
                return_at = Some(index);
                break;
            }
            _ => {}
        }
    }
    if let Some(index) = return_at {
        let before = script.instrs.len();
        let mut kept = script.instrs[..=index].to_vec();
        kept.extend(
            script.instrs[index + 1..]
                .iter()
                .filter(|instr| instr.is_push())
                .cloned(),
        );
        if kept.len() != before {
            if verbosity >= 1 {
                info!(
                    target: "txsc::optimizer",
                    "dce: removed {} non-push instruction(s) after OP_RETURN",
                    before - kept.len()
                );
            }
            script.instrs = kept;
            changed = true;
        }
    }

    // Pushes immediately dropped.
    let mut out: Vec<OpInstr> = Vec::with_capacity(script.instrs.len());
    let mut i = 0;
    let mut dropped = false;
    while i < script.instrs.len() {
        if script.instrs[i].is_push()
            && script.instrs.get(i + 1) == Some(&OpInstr::Op(Opcode::Drop))
        {
            if verbosity >= 1 {
                info!(target: "txsc::optimizer", "dce: removed dropped push at {}", i);
            }
            i += 2;
            dropped = true;
            continue;
        }
        out.push(script.instrs[i].clone());
        i += 1;
    }
    if dropped {
        script.instrs = out;
        changed = true;
    }

    changed
}
