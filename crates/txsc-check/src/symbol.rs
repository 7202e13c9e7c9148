//! Scoped symbol table mapping names to bindings.
//!
//! Scopes are lexical and nested; lookup walks inner to outer. A binding
//! is one of four kinds: a folded constant, an unevaluated expression
//! (re-lowered at each use site), a stack assumption recording its depth
//! at declaration, or a callable function. Scopes use [`IndexMap`] so that
//! unused-binding warnings come out in declaration order, keeping
//! diagnostics deterministic.

use indexmap::IndexMap;

use txsc_core::ast::{Expr, FuncDecl};
use txsc_core::span::Span;
use txsc_core::types::{ConstValue, Ty};

use crate::diagnostics::SemanticError;

/// What a name is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Fully evaluated constant, folded at declaration.
    Const(ConstValue),
    /// Unevaluated expression, substituted at each use site.
    Expr { ast: Expr },
    /// A stack assumption; `depth` counts from the top of the stack at the
    /// moment the `assume` statement was processed (0 = top).
    Stack { depth: usize },
    /// A user-defined function, inlined at each call site. The stored body
    /// has its free value names captured as of declaration time.
    Func(FuncDecl),
}

impl Binding {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Binding::Const(_) => "constant",
            Binding::Expr { .. } => "expression",
            Binding::Stack { .. } => "assumption",
            Binding::Func(_) => "function",
        }
    }
}

/// A declared name with its binding and bookkeeping flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub binding: Binding,
    /// Declared type; reassignment preserves it.
    pub ty: Ty,
    pub mutable: bool,
    pub span: Span,
    pub used: bool,
    /// Set for explicit `let` declarations -- the only bindings that
    /// trigger unused-binding warnings.
    pub from_let: bool,
}

impl Symbol {
    pub fn new(binding: Binding, ty: Ty, mutable: bool, span: Span) -> Self {
        Symbol {
            binding,
            ty,
            mutable,
            span,
            used: false,
            from_let: false,
        }
    }

    pub fn from_let(mut self) -> Self {
        self.from_let = true;
        self
    }
}

/// The scope stack. One root scope always exists.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    scopes: Vec<IndexMap<String, Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![IndexMap::new()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// Pops the innermost scope and returns its symbols (callers inspect
    /// them for unused-binding warnings).
    pub fn exit_scope(&mut self) -> IndexMap<String, Symbol> {
        debug_assert!(self.scopes.len() > 1, "cannot exit the root scope");
        self.scopes.pop().unwrap_or_default()
    }

    /// Pops the root scope at the end of a compilation.
    pub fn finish(mut self) -> IndexMap<String, Symbol> {
        self.scopes.pop().unwrap_or_default()
    }

    /// Declares `name` in the current scope. Fails with `RedeclaredName`
    /// if the name already exists there.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), SemanticError> {
        let span = symbol.span;
        let scope = self.scopes.last_mut().expect("root scope always exists");
        if scope.contains_key(name) {
            return Err(SemanticError::RedeclaredName {
                name: name.to_string(),
                span,
            });
        }
        scope.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Inner-to-outer lookup without touching use flags.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Marks a name as used (innermost match).
    pub fn mark_used(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(sym) = scope.get_mut(name) {
                sym.used = true;
                return;
            }
        }
    }

    /// Resolves a use of `name`: marks it used and returns a clone of the
    /// symbol, or `UnknownName`.
    pub fn use_symbol(&mut self, name: &str, span: Span) -> Result<Symbol, SemanticError> {
        self.mark_used(name);
        self.lookup(name)
            .cloned()
            .ok_or_else(|| SemanticError::UnknownName {
                name: name.to_string(),
                span,
            })
    }

    /// Replaces the expression of a mutable binding. Fails with
    /// `UnknownName` if absent and `ImmutableBinding` if the resolved
    /// binding is not a mutable expression binding. The declared type is
    /// preserved; `value_ty` must unify with it.
    pub fn reassign(
        &mut self,
        name: &str,
        value: Expr,
        value_ty: Ty,
        span: Span,
    ) -> Result<(), SemanticError> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(sym) = scope.get_mut(name) {
                if !sym.mutable || !matches!(sym.binding, Binding::Expr { .. }) {
                    return Err(SemanticError::ImmutableBinding {
                        name: name.to_string(),
                        span,
                    });
                }
                if !value_ty.unifies(sym.ty) {
                    return Err(SemanticError::TypeMismatch {
                        expected: sym.ty,
                        found: value_ty,
                        span,
                    });
                }
                sym.binding = Binding::Expr { ast: value };
                return Ok(());
            }
        }
        Err(SemanticError::UnknownName {
            name: name.to_string(),
            span,
        })
    }
}
