//! Semantic error and warning types with source spans.
//!
//! [`SemanticError`] is the halting taxonomy: the first one wins and aborts
//! the compilation. [`Warning`] is the non-halting channel (implicit
//! pushes, unused bindings); warnings are collected and reported but never
//! stop the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use txsc_core::span::Span;
use txsc_core::types::Ty;

/// A semantic error detected while resolving names, checking types, or
/// running compile-time validation. Every variant carries the span of the
/// offending source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum SemanticError {
    /// A name was used that no visible scope declares.
    #[error("unknown name '{name}' at {span}")]
    UnknownName { name: String, span: Span },

    /// A name was declared twice in the same scope, or shadows a built-in.
    #[error("name '{name}' is already declared at {span}")]
    RedeclaredName { name: String, span: Span },

    /// Assignment to a binding that is not `mutable`.
    #[error("cannot assign to immutable binding '{name}' at {span}")]
    ImmutableBinding { name: String, span: Span },

    /// `assume` anywhere but as the first statement of the script.
    #[error("assume must be the first statement, found at {span}")]
    MisplacedAssume { span: Span },

    /// A stack assumption used after an if/else whose branches had
    /// different net stack effects.
    #[error(
        "assumption '{name}' used at {span} after a conditional with \
         imbalanced branches"
    )]
    AssumptionAfterImbalancedBranch { name: String, span: Span },

    /// An operand or initializer had the wrong type.
    #[error("type mismatch at {span}: expected {expected}, got {found}")]
    TypeMismatch {
        expected: Ty,
        found: Ty,
        span: Span,
    },

    /// A side-effecting expression where only pure expressions are
    /// allowed (bindings, function arguments).
    #[error("type mismatch at {span}: expected pure expression")]
    PureExpressionRequired { span: Span },

    /// Wrong number of arguments to a built-in or user function.
    #[error("'{name}' expects {expected} argument(s), got {found} at {span}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
        span: Span,
    },

    /// A literal the later stages cannot represent.
    #[error("invalid literal at {span}: {reason}")]
    InvalidLiteral { reason: String, span: Span },

    /// A `check_*` built-in rejected its argument.
    #[error("{name} failed at {span}: {reason}")]
    ValidationFailed {
        name: String,
        reason: String,
        span: Span,
    },

    /// A statement in a position its kind does not allow (return outside a
    /// function, push inside one, nested function declarations, ...).
    #[error("misplaced {what} at {span}")]
    MisplacedStatement { what: String, span: Span },

    /// A function name used as a plain value; functions are only callable.
    #[error("function '{name}' used as a value at {span}")]
    FunctionAsValue { name: String, span: Span },

    /// A call of a name that is not a function.
    #[error("'{name}' is not a function at {span}")]
    NotCallable { name: String, span: Span },

    /// A bare expression statement under `implicit_pushes = deny`.
    #[error("implicit push of expression result at {span}")]
    ImplicitPush { span: Span },
}

/// Non-halting diagnostic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// A bare expression statement left its value on the stack.
    ImplicitPush,
    /// A `let` binding that was never read.
    UnusedBinding,
}

/// A non-halting diagnostic with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub span: Span,
    pub message: String,
}

impl Warning {
    pub fn implicit_push(span: Span) -> Self {
        Warning {
            kind: WarningKind::ImplicitPush,
            span,
            message: "expression result is implicitly pushed".to_string(),
        }
    }

    pub fn unused_binding(name: &str, span: Span) -> Self {
        Warning {
            kind: WarningKind::UnusedBinding,
            span,
            message: format!("binding '{}' is never used", name),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warning at {}: {}", self.span, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_spans() {
        let err = SemanticError::UnknownName {
            name: "pubkey".into(),
            span: Span::new(4, 9),
        };
        assert_eq!(err.to_string(), "unknown name 'pubkey' at 4:9");

        let err = SemanticError::TypeMismatch {
            expected: Ty::Int,
            found: Ty::Bytes,
            span: Span::new(2, 1),
        };
        assert_eq!(err.to_string(), "type mismatch at 2:1: expected int, got bytes");
    }

    #[test]
    fn pure_expression_message_matches_documented_wording() {
        let err = SemanticError::PureExpressionRequired {
            span: Span::new(1, 5),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch at 1:5: expected pure expression"
        );
    }

    #[test]
    fn warning_display() {
        let w = Warning::unused_binding("x", Span::new(3, 1));
        assert_eq!(w.to_string(), "warning at 3:1: binding 'x' is never used");
        assert_eq!(w.kind, WarningKind::UnusedBinding);
    }

    #[test]
    fn serde_roundtrip() {
        let err = SemanticError::ArityMismatch {
            name: "min".into(),
            expected: "2".into(),
            found: 3,
            span: Span::new(1, 1),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: SemanticError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
