use thiserror::Error;

use crate::expr::any::TypeName;
use crate::expr::token::Token;

/// Construction-time failure of an alarm expression.
///
/// Every variant is fatal to the `Expression` being built; evaluation-time
/// conditions (missing binding, malformed snapshot, failed narrowing) are
/// never errors — they degrade to the `Null` value instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    // Lexical
    #[error("syntax error at offset {0}: unrecognized token")]
    UnknownToken(usize),

    // Structural
    #[error("mismatched parentheses")]
    UnbalancedParens,

    #[error("dangling operator")]
    DanglingOperator,

    #[error("empty expression")]
    Empty,

    #[error("malformed expression: operands left without an operator")]
    Malformed,

    // Semantic
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("method {0} does not support change notifications")]
    NoNotification(String),

    #[error("method {method} expects {expected} index key(s), got {got}")]
    IndexCountMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("index key {position} of {method} is not convertible to its declared type")]
    IndexTypeMismatch { method: String, position: usize },

    #[error("cannot resolve \"{path}\" in the result of {method}")]
    UnresolvedPath { method: String, path: String },

    #[error("no common type for constant operands")]
    TypeNegotiation,

    #[error("operand types do not match: {0} != {1}")]
    TypeMismatch(TypeName, TypeName),

    #[error("operator {0} is not defined for type {1}")]
    UnsupportedOperator(Token, TypeName),
}
