//! The semantic checker: a single pass over the AST.
//!
//! Resolves every name, infers and enforces expression types, checks
//! built-in and function arity, validates `assume` placement and function
//! body shape, runs the compile-time validators, and performs conditional
//! branch balancing -- an `if`/`else` whose branches have different net
//! stack effects invalidates every stack assumption in scope from that
//! point on.
//!
//! The checker halts at the first error; warnings (implicit pushes, unused
//! bindings) accumulate in the [`CheckReport`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use txsc_core::ast::{Expr, ExprKind, FuncDecl, Program, Stmt, StmtKind};
use txsc_core::builtins::{self, BuiltinKind};
use txsc_core::ops::UnaryOp;
use txsc_core::span::Span;
use txsc_core::types::Ty;

use crate::consteval;
use crate::diagnostics::{SemanticError, Warning};
use crate::symbol::{Binding, Symbol, SymbolTable};

/// Treatment of bare expression statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplicitPushPolicy {
    Allow,
    Warn,
    Deny,
}

impl Default for ImplicitPushPolicy {
    fn default() -> Self {
        ImplicitPushPolicy::Warn
    }
}

/// Options consumed by the checker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckOptions {
    pub implicit_pushes: ImplicitPushPolicy,
}

/// Result of a successful check.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub warnings: Vec<Warning>,
}

/// Checks a whole program. Returns the warning report, or the first
/// semantic error encountered.
pub fn check_program(
    program: &Program,
    options: &CheckOptions,
) -> Result<CheckReport, SemanticError> {
    let mut checker = Checker {
        options,
        symbols: SymbolTable::new(),
        warnings: Vec::new(),
        assumptions_valid: true,
    };
    checker.run(program)?;
    Ok(CheckReport {
        warnings: checker.warnings,
    })
}

/// Statement position: inside a function body and/or a conditional branch.
#[derive(Debug, Clone, Copy, Default)]
struct StmtCtx {
    in_func: bool,
    in_branch: bool,
}

struct Checker<'a> {
    options: &'a CheckOptions,
    symbols: SymbolTable,
    warnings: Vec<Warning>,
    assumptions_valid: bool,
}

impl Checker<'_> {
    fn run(&mut self, program: &Program) -> Result<(), SemanticError> {
        let ctx = StmtCtx::default();
        for (i, stmt) in program.stmts.iter().enumerate() {
            self.check_stmt(stmt, i == 0, ctx)?;
        }
        let root = std::mem::replace(&mut self.symbols, SymbolTable::new()).finish();
        self.collect_unused(&root);
        Ok(())
    }

    fn collect_unused(&mut self, scope: &IndexMap<String, Symbol>) {
        for (name, sym) in scope {
            if sym.from_let && !sym.used {
                self.warnings.push(Warning::unused_binding(name, sym.span));
            }
        }
    }

    /// Rejects declarations that would shadow a built-in.
    fn check_fresh_name(&self, name: &str, span: Span) -> Result<(), SemanticError> {
        if builtins::lookup(name).is_some() {
            return Err(SemanticError::RedeclaredName {
                name: name.to_string(),
                span,
            });
        }
        Ok(())
    }

    fn check_stmt(
        &mut self,
        stmt: &Stmt,
        is_first: bool,
        ctx: StmtCtx,
    ) -> Result<(), SemanticError> {
        match &stmt.kind {
            StmtKind::Assume { names } => {
                if ctx.in_func || ctx.in_branch || !is_first {
                    return Err(SemanticError::MisplacedAssume { span: stmt.span });
                }
                for (i, name) in names.iter().enumerate() {
                    self.check_fresh_name(name, stmt.span)?;
                    // The last-named assumption is at the top of the stack.
                    let depth = names.len() - 1 - i;
                    self.symbols.declare(
                        name,
                        Symbol::new(Binding::Stack { depth }, Ty::Expr, false, stmt.span),
                    )?;
                }
                Ok(())
            }

            StmtKind::Let {
                name,
                mutable,
                value,
            } => {
                let ty = self.check_expr(value, ctx)?;
                if self.expr_has_side_effects(value) {
                    return Err(SemanticError::PureExpressionRequired { span: value.span });
                }
                self.check_fresh_name(name, stmt.span)?;
                let binding = match consteval::literal_const(value) {
                    Some(v) if !mutable => Binding::Const(v),
                    _ => Binding::Expr { ast: value.clone() },
                };
                self.symbols.declare(
                    name,
                    Symbol::new(binding, ty, *mutable, stmt.span).from_let(),
                )
            }

            StmtKind::Assign { name, value } => {
                if ctx.in_branch {
                    // A binding is compile-time state; a runtime-conditional
                    // value cannot be represented by one.
                    return Err(SemanticError::MisplacedStatement {
                        what: "assignment inside a conditional branch".to_string(),
                        span: stmt.span,
                    });
                }
                let ty = self.check_expr(value, ctx)?;
                if self.expr_has_side_effects(value) {
                    return Err(SemanticError::PureExpressionRequired { span: value.span });
                }
                // Capture current binding values so the stored expression
                // never references its own name.
                let captured = consteval::substitute(value, &self.symbols);
                self.symbols.reassign(name, captured, ty, stmt.span)
            }

            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.check_expr(cond, ctx)?;
                let branch_ctx = StmtCtx {
                    in_branch: true,
                    ..ctx
                };
                self.symbols.enter_scope();
                let then_result = self.check_body(then_body, branch_ctx);
                let scope = self.symbols.exit_scope();
                then_result?;
                self.collect_unused(&scope);

                self.symbols.enter_scope();
                let else_result = self.check_body(else_body, branch_ctx);
                let scope = self.symbols.exit_scope();
                else_result?;
                self.collect_unused(&scope);

                let net_then = net_effect(then_body);
                let net_else = net_effect(else_body);
                match (net_then, net_else) {
                    (Some(a), Some(b)) if a == b => {}
                    _ => self.assumptions_valid = false,
                }
                Ok(())
            }

            StmtKind::FuncDecl(decl) => {
                if ctx.in_func || ctx.in_branch {
                    return Err(SemanticError::MisplacedStatement {
                        what: "function declaration".to_string(),
                        span: stmt.span,
                    });
                }
                self.check_func_decl(decl)?;
                self.check_fresh_name(&decl.name, decl.span)?;
                // Capture outer value bindings as of declaration time;
                // the body then only mentions parameters, assumptions,
                // and other functions.
                let captured = capture_func_body(decl, &self.symbols);
                self.symbols.declare(
                    &decl.name,
                    Symbol::new(Binding::Func(captured), decl.ret_ty, false, decl.span),
                )
            }

            StmtKind::Return { .. } => Err(SemanticError::MisplacedStatement {
                what: "return".to_string(),
                span: stmt.span,
            }),

            StmtKind::Verify { value } => {
                // Side-effecting operands are fine here: verify is exactly
                // where observable calls belong.
                self.check_expr(value, ctx)?;
                Ok(())
            }

            StmtKind::Push { value } => {
                if ctx.in_func {
                    return Err(SemanticError::MisplacedStatement {
                        what: "push inside a function body".to_string(),
                        span: stmt.span,
                    });
                }
                self.check_expr(value, ctx)?;
                Ok(())
            }

            StmtKind::Expr { value } => {
                if let Some(args) = mark_invalid_args(value) {
                    if ctx.in_func {
                        return Err(SemanticError::MisplacedStatement {
                            what: "markInvalid inside a function body".to_string(),
                            span: stmt.span,
                        });
                    }
                    if !args.is_empty() {
                        return Err(SemanticError::ArityMismatch {
                            name: "markInvalid".to_string(),
                            expected: "0".to_string(),
                            found: args.len(),
                            span: stmt.span,
                        });
                    }
                    return Ok(());
                }
                if ctx.in_func {
                    return Err(SemanticError::MisplacedStatement {
                        what: "expression statement inside a function body".to_string(),
                        span: stmt.span,
                    });
                }
                self.check_expr(value, ctx)?;
                match self.options.implicit_pushes {
                    ImplicitPushPolicy::Allow => {}
                    ImplicitPushPolicy::Warn => {
                        self.warnings.push(Warning::implicit_push(stmt.span));
                    }
                    ImplicitPushPolicy::Deny => {
                        return Err(SemanticError::ImplicitPush { span: stmt.span });
                    }
                }
                Ok(())
            }
        }
    }

    fn check_body(&mut self, body: &[Stmt], ctx: StmtCtx) -> Result<(), SemanticError> {
        for stmt in body {
            self.check_stmt(stmt, false, ctx)?;
        }
        Ok(())
    }

    /// Checks a function declaration: parameter scope, body statement
    /// rules, and the single trailing `return` whose type must unify with
    /// the declared return type.
    fn check_func_decl(&mut self, decl: &FuncDecl) -> Result<(), SemanticError> {
        self.symbols.enter_scope();
        let result = self.check_func_body(decl);
        let scope = self.symbols.exit_scope();
        if result.is_ok() {
            self.collect_unused(&scope);
        }
        result
    }

    fn check_func_body(&mut self, decl: &FuncDecl) -> Result<(), SemanticError> {
        for param in &decl.params {
            self.check_fresh_name(param, decl.span)?;
            // Parameters may not shadow visible names: call arguments are
            // spliced into the body, where a shadowed name would rebind
            // to the parameter itself.
            if self.symbols.lookup(param).is_some() {
                return Err(SemanticError::RedeclaredName {
                    name: param.clone(),
                    span: decl.span,
                });
            }
            self.symbols.declare(
                param,
                Symbol::new(
                    Binding::Expr {
                        ast: Expr::name(param.clone(), decl.span),
                    },
                    Ty::Expr,
                    false,
                    decl.span,
                ),
            )?;
        }
        let ctx = StmtCtx {
            in_func: true,
            in_branch: false,
        };
        let (last, rest) = match decl.body.split_last() {
            Some(split) => split,
            None => {
                return Err(SemanticError::MisplacedStatement {
                    what: "function body without a return".to_string(),
                    span: decl.span,
                })
            }
        };
        for stmt in rest {
            self.check_stmt(stmt, false, ctx)?;
        }
        match &last.kind {
            StmtKind::Return { value } => {
                let ty = self.check_expr(value, ctx)?;
                if !ty.unifies(decl.ret_ty) {
                    return Err(SemanticError::TypeMismatch {
                        expected: decl.ret_ty,
                        found: ty,
                        span: value.span,
                    });
                }
                Ok(())
            }
            _ => Err(SemanticError::MisplacedStatement {
                what: "function body without a trailing return".to_string(),
                span: last.span,
            }),
        }
    }

    fn check_expr(&mut self, expr: &Expr, ctx: StmtCtx) -> Result<Ty, SemanticError> {
        match &expr.kind {
            ExprKind::Int(_) => Ok(Ty::Int),
            ExprKind::Bytes(_) => Ok(Ty::Bytes),

            ExprKind::Name(name) => {
                let sym = self.symbols.use_symbol(name, expr.span)?;
                match sym.binding {
                    Binding::Func(_) => Err(SemanticError::FunctionAsValue {
                        name: name.clone(),
                        span: expr.span,
                    }),
                    Binding::Stack { .. } => {
                        if !self.assumptions_valid {
                            return Err(SemanticError::AssumptionAfterImbalancedBranch {
                                name: name.clone(),
                                span: expr.span,
                            });
                        }
                        Ok(sym.ty)
                    }
                    _ => Ok(sym.ty),
                }
            }

            ExprKind::Unary { op, operand } => {
                let ty = self.check_expr(operand, ctx)?;
                match op {
                    UnaryOp::Neg | UnaryOp::Invert => {
                        if !ty.unifies(Ty::Int) {
                            return Err(SemanticError::TypeMismatch {
                                expected: Ty::Int,
                                found: ty,
                                span: operand.span,
                            });
                        }
                    }
                    UnaryOp::Not => {}
                }
                Ok(Ty::Int)
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let lt = self.check_expr(lhs, ctx)?;
                let rt = self.check_expr(rhs, ctx)?;
                if op.requires_int_operands() {
                    if !lt.unifies(Ty::Int) {
                        return Err(SemanticError::TypeMismatch {
                            expected: Ty::Int,
                            found: lt,
                            span: lhs.span,
                        });
                    }
                    if !rt.unifies(Ty::Int) {
                        return Err(SemanticError::TypeMismatch {
                            expected: Ty::Int,
                            found: rt,
                            span: rhs.span,
                        });
                    }
                } else if !lt.unifies(rt) {
                    return Err(SemanticError::TypeMismatch {
                        expected: lt,
                        found: rt,
                        span: rhs.span,
                    });
                }
                Ok(Ty::Int)
            }

            ExprKind::Call { name, args } => self.check_call(name, args, expr.span, ctx),
        }
    }

    fn check_call(
        &mut self,
        name: &str,
        args: &[Expr],
        span: Span,
        ctx: StmtCtx,
    ) -> Result<Ty, SemanticError> {
        if let Some(builtin) = builtins::lookup(name) {
            match builtin.kind {
                BuiltinKind::MarkInvalid => {
                    // Statement position is handled before check_expr is
                    // reached; anything else is an expression position.
                    return Err(SemanticError::MisplacedStatement {
                        what: "markInvalid in an expression".to_string(),
                        span,
                    });
                }
                BuiltinKind::Raw => {
                    if args.is_empty() {
                        return Err(SemanticError::ArityMismatch {
                            name: name.to_string(),
                            expected: "at least 1".to_string(),
                            found: 0,
                            span,
                        });
                    }
                    for arg in args {
                        self.check_expr(arg, ctx)?;
                        self.reject_assumption_refs(arg)?;
                    }
                    return Ok(Ty::Bytes);
                }
                BuiltinKind::Op(_) | BuiltinKind::Validate(_) => {}
            }

            match builtin.params {
                Some(params) => {
                    if args.len() != params.len() {
                        return Err(SemanticError::ArityMismatch {
                            name: name.to_string(),
                            expected: params.len().to_string(),
                            found: args.len(),
                            span,
                        });
                    }
                    for (arg, &pty) in args.iter().zip(params) {
                        let at = self.check_expr(arg, ctx)?;
                        if !at.unifies(pty) {
                            return Err(SemanticError::TypeMismatch {
                                expected: pty,
                                found: at,
                                span: arg.span,
                            });
                        }
                    }
                }
                None => {
                    // checkMultiSig: signatures and keys as written, with a
                    // trailing key count.
                    if args.len() < 2 {
                        return Err(SemanticError::ArityMismatch {
                            name: name.to_string(),
                            expected: "at least 2".to_string(),
                            found: args.len(),
                            span,
                        });
                    }
                    let (count, rest) = args.split_last().expect("checked non-empty");
                    for arg in rest {
                        self.check_expr(arg, ctx)?;
                    }
                    let count_ty = self.check_expr(count, ctx)?;
                    if !count_ty.unifies(Ty::Int) {
                        return Err(SemanticError::TypeMismatch {
                            expected: Ty::Int,
                            found: count_ty,
                            span: count.span,
                        });
                    }
                }
            }

            if let BuiltinKind::Validate(validator) = builtin.kind {
                let arg = &args[0];
                match consteval::eval_expr(arg, &self.symbols)? {
                    Some(value) => {
                        consteval::run_validator(validator, &value, name, span)?;
                    }
                    None => {
                        return Err(SemanticError::ValidationFailed {
                            name: name.to_string(),
                            reason: "argument is not a compile-time constant".to_string(),
                            span,
                        });
                    }
                }
            }
            return Ok(builtin.ret);
        }

        let sym = self.symbols.use_symbol(name, span)?;
        let decl = match sym.binding {
            Binding::Func(decl) => decl,
            _ => {
                return Err(SemanticError::NotCallable {
                    name: name.to_string(),
                    span,
                })
            }
        };
        if args.len() != decl.params.len() {
            return Err(SemanticError::ArityMismatch {
                name: name.to_string(),
                expected: decl.params.len().to_string(),
                found: args.len(),
                span,
            });
        }
        for arg in args {
            self.check_expr(arg, ctx)?;
            // Arguments become expression bindings for the inlined body and
            // may be lowered more than once; they must be pure.
            if self.expr_has_side_effects(arg) {
                return Err(SemanticError::PureExpressionRequired { span: arg.span });
            }
        }
        Ok(decl.ret_ty)
    }

    /// Rejects direct references to stack assumptions inside `raw(...)`;
    /// an inner script starts from a fresh stack where depths mean
    /// nothing.
    fn reject_assumption_refs(&self, expr: &Expr) -> Result<(), SemanticError> {
        match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(sym) = self.symbols.lookup(name) {
                    if matches!(sym.binding, Binding::Stack { .. }) {
                        return Err(SemanticError::MisplacedStatement {
                            what: format!("assumption '{}' inside raw()", name),
                            span: expr.span,
                        });
                    }
                }
                Ok(())
            }
            ExprKind::Unary { operand, .. } => self.reject_assumption_refs(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.reject_assumption_refs(lhs)?;
                self.reject_assumption_refs(rhs)
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.reject_assumption_refs(arg)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Whether lowering this expression would emit an opcode with side
    /// effects (`checkSig`, `checkMultiSig`, `markInvalid`, or a function
    /// whose body verifies).
    fn expr_has_side_effects(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Bytes(_) | ExprKind::Name(_) => false,
            ExprKind::Unary { operand, .. } => self.expr_has_side_effects(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr_has_side_effects(lhs) || self.expr_has_side_effects(rhs)
            }
            ExprKind::Call { name, args } => {
                let callee = match builtins::lookup(name) {
                    Some(builtin) => builtin.has_side_effects,
                    None => match self.symbols.lookup(name).map(|s| &s.binding) {
                        Some(Binding::Func(decl)) => self.func_has_side_effects(decl),
                        _ => false,
                    },
                };
                callee || args.iter().any(|a| self.expr_has_side_effects(a))
            }
        }
    }

    fn func_has_side_effects(&self, decl: &FuncDecl) -> bool {
        fn stmt_has(checker: &Checker<'_>, stmt: &Stmt) -> bool {
            match &stmt.kind {
                StmtKind::Verify { .. } => true,
                StmtKind::Let { value, .. }
                | StmtKind::Assign { value, .. }
                | StmtKind::Return { value }
                | StmtKind::Push { value }
                | StmtKind::Expr { value } => checker.expr_has_side_effects(value),
                StmtKind::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    checker.expr_has_side_effects(cond)
                        || then_body.iter().any(|s| stmt_has(checker, s))
                        || else_body.iter().any(|s| stmt_has(checker, s))
                }
                StmtKind::Assume { .. } | StmtKind::FuncDecl(_) => false,
            }
        }
        decl.body.iter().any(|s| stmt_has(self, s))
    }
}

/// Net stack effect of a statement sequence, or `None` when a nested
/// conditional makes it branch-dependent.
pub fn net_effect(stmts: &[Stmt]) -> Option<i64> {
    let mut net = 0i64;
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Push { .. } => net += 1,
            StmtKind::Expr { value } => {
                if mark_invalid_args(value).is_none() {
                    net += 1;
                }
            }
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => {
                let a = net_effect(then_body)?;
                let b = net_effect(else_body)?;
                if a != b {
                    return None;
                }
                net += a;
            }
            StmtKind::Verify { .. }
            | StmtKind::Let { .. }
            | StmtKind::Assign { .. }
            | StmtKind::Assume { .. }
            | StmtKind::FuncDecl(_)
            | StmtKind::Return { .. } => {}
        }
    }
    Some(net)
}

/// Returns the argument list if `expr` is a `markInvalid()` call.
pub fn mark_invalid_args(expr: &Expr) -> Option<&[Expr]> {
    match &expr.kind {
        ExprKind::Call { name, args } if name == "markInvalid" => Some(args),
        _ => None,
    }
}

/// Captures a function body at declaration time: every free value name is
/// replaced by its current binding, while parameters and body-local `let`
/// names stay symbolic (as do assumptions and function references).
pub fn capture_func_body(decl: &FuncDecl, symbols: &SymbolTable) -> FuncDecl {
    let mut shadowed: Vec<String> = decl.params.clone();
    collect_let_names(&decl.body, &mut shadowed);

    fn subst_expr(expr: &Expr, symbols: &SymbolTable, shadowed: &[String]) -> Expr {
        match &expr.kind {
            ExprKind::Name(name) if shadowed.iter().any(|s| s == name) => expr.clone(),
            ExprKind::Name(_) | ExprKind::Int(_) | ExprKind::Bytes(_) => {
                consteval::substitute(expr, symbols)
            }
            ExprKind::Unary { op, operand } => {
                Expr::unary(*op, subst_expr(operand, symbols, shadowed), expr.span)
            }
            ExprKind::Binary { op, lhs, rhs } => Expr::binary(
                *op,
                subst_expr(lhs, symbols, shadowed),
                subst_expr(rhs, symbols, shadowed),
                expr.span,
            ),
            ExprKind::Call { name, args } => Expr::call(
                name.clone(),
                args.iter()
                    .map(|a| subst_expr(a, symbols, shadowed))
                    .collect(),
                expr.span,
            ),
        }
    }

    fn subst_stmt(stmt: &Stmt, symbols: &SymbolTable, shadowed: &[String]) -> Stmt {
        let kind = match &stmt.kind {
            StmtKind::Let {
                name,
                mutable,
                value,
            } => StmtKind::Let {
                name: name.clone(),
                mutable: *mutable,
                value: subst_expr(value, symbols, shadowed),
            },
            StmtKind::Assign { name, value } => StmtKind::Assign {
                name: name.clone(),
                value: subst_expr(value, symbols, shadowed),
            },
            StmtKind::Return { value } => StmtKind::Return {
                value: subst_expr(value, symbols, shadowed),
            },
            StmtKind::Verify { value } => StmtKind::Verify {
                value: subst_expr(value, symbols, shadowed),
            },
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => StmtKind::If {
                cond: subst_expr(cond, symbols, shadowed),
                then_body: then_body
                    .iter()
                    .map(|s| subst_stmt(s, symbols, shadowed))
                    .collect(),
                else_body: else_body
                    .iter()
                    .map(|s| subst_stmt(s, symbols, shadowed))
                    .collect(),
            },
            other => other.clone(),
        };
        Stmt::new(kind, stmt.span)
    }

    FuncDecl {
        body: decl
            .body
            .iter()
            .map(|s| subst_stmt(s, symbols, &shadowed))
            .collect(),
        ..decl.clone()
    }
}

fn collect_let_names(body: &[Stmt], out: &mut Vec<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Let { name, .. } => out.push(name.clone()),
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => {
                collect_let_names(then_body, out);
                collect_let_names(else_body, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use txsc_core::ops::{ArithOp, BinaryOp, CmpOp};

    use crate::diagnostics::WarningKind;

    fn sp() -> Span {
        Span::new(1, 1)
    }

    fn check(program: &Program) -> Result<CheckReport, SemanticError> {
        check_program(program, &CheckOptions::default())
    }

    #[test]
    fn empty_program_checks() {
        assert!(check(&Program::default()).is_ok());
    }

    #[test]
    fn p2pkh_shape_checks() {
        let prog = Program::new(vec![
            Stmt::assume(vec!["sig", "pubkey"], sp()),
            Stmt::verify(
                Expr::binary(
                    BinaryOp::Cmp(CmpOp::Eq),
                    Expr::call("hash160", vec![Expr::name("pubkey", sp())], sp()),
                    Expr::bytes(vec![0x10; 20], sp()),
                    sp(),
                ),
                sp(),
            ),
            Stmt::expr(
                Expr::call(
                    "checkSig",
                    vec![Expr::name("sig", sp()), Expr::name("pubkey", sp())],
                    sp(),
                ),
                sp(),
            ),
        ]);
        let report = check(&prog).unwrap();
        // The bare checkSig statement warns under the default policy.
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::ImplicitPush);
    }

    #[test]
    fn assume_must_be_first() {
        let prog = Program::new(vec![
            Stmt::expr(Expr::int(1, sp()), sp()),
            Stmt::assume(vec!["x"], Span::new(2, 1)),
        ]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::MisplacedAssume { .. }));
    }

    #[test]
    fn arithmetic_rejects_bytes() {
        let prog = Program::new(vec![Stmt::verify(
            Expr::binary(
                BinaryOp::Arith(ArithOp::Add),
                Expr::bytes(vec![0x01], sp()),
                Expr::int(1, sp()),
                sp(),
            ),
            sp(),
        )]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(
            err,
            SemanticError::TypeMismatch {
                expected: Ty::Int,
                found: Ty::Bytes,
                ..
            }
        ));
    }

    #[test]
    fn builtin_arity_is_enforced() {
        let prog = Program::new(vec![Stmt::verify(
            Expr::call("min", vec![Expr::int(1, sp())], sp()),
            sp(),
        )]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::ArityMismatch { .. }));
    }

    #[test]
    fn side_effecting_let_is_rejected() {
        let prog = Program::new(vec![
            Stmt::assume(vec!["s", "p"], sp()),
            Stmt::let_(
                "x",
                false,
                Expr::call(
                    "checkSig",
                    vec![Expr::name("s", sp()), Expr::name("p", sp())],
                    sp(),
                ),
                sp(),
            ),
        ]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::PureExpressionRequired { .. }));
    }

    #[test]
    fn immutable_reassignment_fails() {
        let prog = Program::new(vec![
            Stmt::let_("a", false, Expr::int(3, sp()), sp()),
            Stmt::assign("a", Expr::int(4, sp()), sp()),
        ]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::ImmutableBinding { .. }));
    }

    #[test]
    fn mutable_reassignment_checks() {
        let prog = Program::new(vec![
            Stmt::let_("a", true, Expr::int(3, sp()), sp()),
            Stmt::assign(
                "a",
                Expr::binary(
                    BinaryOp::Arith(ArithOp::Add),
                    Expr::name("a", sp()),
                    Expr::int(1, sp()),
                    sp(),
                ),
                sp(),
            ),
            Stmt::push(Expr::name("a", sp()), sp()),
        ]);
        assert!(check(&prog).is_ok());
    }

    #[test]
    fn imbalanced_branches_invalidate_assumptions() {
        // assume a; if a == 1 { 2; } else { 2; 3; } a;
        let prog = Program::new(vec![
            Stmt::assume(vec!["a"], sp()),
            Stmt::if_(
                Expr::binary(
                    BinaryOp::Cmp(CmpOp::Eq),
                    Expr::name("a", sp()),
                    Expr::int(1, sp()),
                    sp(),
                ),
                vec![Stmt::expr(Expr::int(2, sp()), sp())],
                vec![
                    Stmt::expr(Expr::int(2, sp()), sp()),
                    Stmt::expr(Expr::int(3, sp()), sp()),
                ],
                sp(),
            ),
            Stmt::expr(Expr::name("a", Span::new(3, 1)), Span::new(3, 1)),
        ]);
        let err = check(&prog).unwrap_err();
        match err {
            SemanticError::AssumptionAfterImbalancedBranch { name, span } => {
                assert_eq!(name, "a");
                assert_eq!(span, Span::new(3, 1));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn balanced_branches_preserve_assumptions() {
        let prog = Program::new(vec![
            Stmt::assume(vec!["a"], sp()),
            Stmt::if_(
                Expr::name("a", sp()),
                vec![Stmt::expr(Expr::int(2, sp()), sp())],
                vec![Stmt::expr(Expr::int(3, sp()), sp())],
                sp(),
            ),
            Stmt::verify(Expr::name("a", sp()), sp()),
        ]);
        assert!(check(&prog).is_ok());
    }

    #[test]
    fn function_requires_trailing_return() {
        let decl = FuncDecl {
            name: "f".into(),
            ret_ty: Ty::Int,
            params: vec!["x".into()],
            body: vec![Stmt::verify(Expr::name("x", sp()), sp())],
            span: sp(),
        };
        let prog = Program::new(vec![Stmt::new(StmtKind::FuncDecl(decl), sp())]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::MisplacedStatement { .. }));
    }

    #[test]
    fn push_inside_function_is_rejected() {
        let decl = FuncDecl {
            name: "f".into(),
            ret_ty: Ty::Int,
            params: vec![],
            body: vec![
                Stmt::push(Expr::int(1, sp()), sp()),
                Stmt::return_(Expr::int(1, sp()), sp()),
            ],
            span: sp(),
        };
        let prog = Program::new(vec![Stmt::new(StmtKind::FuncDecl(decl), sp())]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::MisplacedStatement { .. }));
    }

    #[test]
    fn recursion_is_an_unknown_name() {
        let decl = FuncDecl {
            name: "f".into(),
            ret_ty: Ty::Int,
            params: vec!["x".into()],
            body: vec![Stmt::return_(
                Expr::call("f", vec![Expr::name("x", sp())], sp()),
                sp(),
            )],
            span: sp(),
        };
        let prog = Program::new(vec![Stmt::new(StmtKind::FuncDecl(decl), sp())]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::UnknownName { .. }));
    }

    #[test]
    fn function_call_arity_and_type() {
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
        let prog = Program::new(vec![
            Stmt::new(StmtKind::FuncDecl(decl), sp()),
            Stmt::verify(
                Expr::binary(
                    BinaryOp::Cmp(CmpOp::Eq),
                    Expr::call("addFive", vec![Expr::int(10, sp())], sp()),
                    Expr::int(15, sp()),
                    sp(),
                ),
                sp(),
            ),
        ]);
        assert!(check(&prog).is_ok());

        let bad_arity = Program::new(vec![
            prog.stmts[0].clone(),
            Stmt::verify(Expr::call("addFive", vec![], sp()), sp()),
        ]);
        assert!(matches!(
            check(&bad_arity).unwrap_err(),
            SemanticError::ArityMismatch { .. }
        ));
    }

    #[test]
    fn validator_runs_at_check_time() {
        let prog = Program::new(vec![Stmt::push(
            Expr::call(
                "check_hash160",
                vec![Expr::bytes(vec![0xab; 19], sp())],
                sp(),
            ),
            sp(),
        )]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::ValidationFailed { .. }));
    }

    #[test]
    fn validator_requires_constant_argument() {
        let prog = Program::new(vec![
            Stmt::assume(vec!["h"], sp()),
            Stmt::push(
                Expr::call("check_hash160", vec![Expr::name("h", sp())], sp()),
                sp(),
            ),
        ]);
        let err = check(&prog).unwrap_err();
        assert!(matches!(err, SemanticError::ValidationFailed { .. }));
    }

    #[test]
    fn implicit_push_policies() {
        let prog = Program::new(vec![Stmt::expr(Expr::int(1, sp()), sp())]);

        let allow = CheckOptions {
            implicit_pushes: ImplicitPushPolicy::Allow,
        };
        assert!(check_program(&prog, &allow).unwrap().warnings.is_empty());

        let warn = CheckOptions::default();
        assert_eq!(check_program(&prog, &warn).unwrap().warnings.len(), 1);

        let deny = CheckOptions {
            implicit_pushes: ImplicitPushPolicy::Deny,
        };
        assert!(matches!(
            check_program(&prog, &deny).unwrap_err(),
            SemanticError::ImplicitPush { .. }
        ));
    }

    #[test]
    fn unused_let_binding_warns() {
        let prog = Program::new(vec![Stmt::let_("x", false, Expr::int(1, sp()), sp())]);
        let report = check(&prog).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::UnusedBinding);
    }

    #[test]
    fn lone_assumption_does_not_warn() {
        let prog = Program::new(vec![Stmt::assume(vec!["x"], sp())]);
        assert!(check(&prog).unwrap().warnings.is_empty());
    }

    #[test]
    fn builtin_names_cannot_be_shadowed() {
        let prog = Program::new(vec![Stmt::let_("min", false, Expr::int(1, sp()), sp())]);
        assert!(matches!(
            check(&prog).unwrap_err(),
            SemanticError::RedeclaredName { .. }
        ));
    }

    #[test]
    fn net_effect_of_statement_kinds() {
        let stmts = vec![
            Stmt::let_("x", false, Expr::int(1, sp()), sp()),
            Stmt::expr(Expr::int(2, sp()), sp()),
            Stmt::push(Expr::int(3, sp()), sp()),
            Stmt::verify(Expr::int(1, sp()), sp()),
        ];
        assert_eq!(net_effect(&stmts), Some(2));

        let imbalanced = vec![Stmt::if_(
            Expr::int(1, sp()),
            vec![Stmt::expr(Expr::int(1, sp()), sp())],
            vec![],
            sp(),
        )];
        assert_eq!(net_effect(&imbalanced), None);
    }

    #[test]
    fn capture_respects_shadowing() {
        let mut symbols = SymbolTable::new();
        symbols
            .declare(
                "x",
                Symbol::new(
                    Binding::Const(txsc_core::types::ConstValue::Int(BigInt::from(9))),
                    Ty::Int,
                    false,
                    sp(),
                ),
            )
            .unwrap();
        // func int f(x) { return x; } -- the parameter shadows the outer x.
        let decl = FuncDecl {
            name: "f".into(),
            ret_ty: Ty::Int,
            params: vec!["x".into()],
            body: vec![Stmt::return_(Expr::name("x", sp()), sp())],
            span: sp(),
        };
        let captured = capture_func_body(&decl, &symbols);
        match &captured.body[0].kind {
            StmtKind::Return { value } => {
                assert_eq!(value.kind, ExprKind::Name("x".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
