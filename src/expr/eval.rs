//! Post-order tree evaluation. Values move out of pure functions; nothing
//! in the tree is mutated, so one checked tree can be evaluated from many
//! threads at once against independent bindings.

use std::collections::HashMap;

use crate::expr::any::{self, Any, TypeName};
use crate::expr::parser::{OprNode, TreeElement};
use crate::expr::token::Token;

pub fn eval(e: &TreeElement, bindings: &HashMap<String, String>) -> Any {
    match e {
        TreeElement::Const(c) => c.value.clone(),
        TreeElement::Var(v) => v.eval(bindings),
        TreeElement::Opr(o) => eval_opr(o, bindings),
    }
}

fn eval_opr(node: &OprNode, bindings: &HashMap<String, String>) -> Any {
    let lhs = match node.lhs.as_deref() {
        Some(child) => eval(child, bindings),
        None => Any::Null,
    };
    let rhs = node.rhs.as_deref().map(|child| eval(child, bindings));

    if lhs.is_null() || matches!(rhs, Some(Any::Null)) {
        // A Null operand under a non-boolean result type poisons the whole
        // sub-expression; under Bool the null rules decide.
        if node.result_type != Some(TypeName::Bool) {
            return Any::Null;
        }
        return eval_null(node.opr, &lhs, rhs.as_ref());
    }
    any::apply(node.opr, &lhs, rhs.as_ref()).unwrap_or(Any::Null)
}

/// Null-aware operator semantics: `null && x` is false, `null || x` is `x`
/// when boolean (false when both sides are null), `null == null` is true,
/// `!null` is true; ordering against null is false.
fn eval_null(opr: Token, lhs: &Any, rhs: Option<&Any>) -> Any {
    let both_null = lhs.is_null() && rhs.map_or(false, Any::is_null);
    match opr {
        Token::And => Any::Bool(false),
        Token::Or => {
            if both_null {
                return Any::Bool(false);
            }
            let other = if lhs.is_null() { rhs } else { Some(lhs) };
            match other {
                Some(Any::Bool(b)) => Any::Bool(*b),
                _ => Any::Null,
            }
        }
        Token::Equal => Any::Bool(both_null),
        Token::NotEqual => Any::Bool(!both_null),
        Token::Neg => Any::Bool(true),
        Token::Great | Token::GreatEqual | Token::Less | Token::LessEqual => Any::Bool(false),
        _ => Any::Null,
    }
}
