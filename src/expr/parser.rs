//! Expression tree nodes and the Shunting-Yard builder that links them.
//!
//! The tokenizer hands over a flat sequence of unlinked elements; the
//! builder keeps two stacks (completed sub-trees, pending operators) and
//! attaches children on pop. Every structural error the grammar can produce
//! surfaces here as a specific [`ExprError`].

use std::fmt;

use crate::error::ExprError;
use crate::expr::any::{self, Any, TypeName};
use crate::expr::token::Token;
use crate::expr::var::VarNode;
use crate::inventory::EnumDescriptor;

#[derive(Debug, Clone)]
pub enum TreeElement {
    Opr(OprNode),
    Const(ConstNode),
    Var(VarNode),
}

impl TreeElement {
    /// The node's resolved type, once the checking pass has run.
    pub fn result_type(&self) -> Option<TypeName> {
        match self {
            TreeElement::Opr(o) => o.result_type,
            TreeElement::Const(c) => Some(c.value.type_name()),
            TreeElement::Var(v) => v.result_type,
        }
    }
}

/// An operator with at most two children. `rhs` is `None` for unary `!`.
#[derive(Debug, Clone)]
pub struct OprNode {
    pub opr: Token,
    pub lhs: Option<Box<TreeElement>>,
    pub rhs: Option<Box<TreeElement>>,
    pub result_type: Option<TypeName>,
}

/// A literal. `raw` keeps the exact source spelling so the tree
/// pretty-prints back to re-parseable text; `value` may be re-negotiated
/// to a different concrete type during checking.
#[derive(Debug, Clone)]
pub struct ConstNode {
    pub value: Any,
    pub raw: String,
    pub descriptor: Option<EnumDescriptor>,
}

impl ConstNode {
    pub fn new(value: Any, raw: impl Into<String>) -> ConstNode {
        ConstNode {
            value,
            raw: raw.into(),
            descriptor: None,
        }
    }

    /// Re-interpret this literal as `target`, in place. With an enum
    /// descriptor the literal must be a member-name string and becomes the
    /// member's `Int32` value. Returns false when the literal cannot carry
    /// the requested type.
    pub fn convert_to(&mut self, target: TypeName, descriptor: Option<&EnumDescriptor>) -> bool {
        if let Some(d) = descriptor {
            let member = match &self.value {
                Any::Str(s) => s,
                _ => return false,
            };
            return match d.value_of(member) {
                Some(v) => {
                    self.value = Any::Int32(v);
                    self.descriptor = Some(d.clone());
                    true
                }
                None => false,
            };
        }
        if self.value.type_name() == target {
            return true;
        }
        if target.is_numeric() {
            // A numeric literal's spelling converts to any type it fits in.
            if let Ok(wide) = self.raw.parse::<i128>() {
                if let Some(v) = any::narrow_i128(target, wide) {
                    self.value = v;
                    return true;
                }
            }
        }
        false
    }
}

/// Two-stack precedence parser. Leaves and operators arrive in source
/// order; `finish` drains the stacks and yields the single root.
pub struct TreeBuilder {
    elements: Vec<TreeElement>,
    operators: Vec<Token>,
    open_parens: u32,
    last_is_opr: bool,
}

impl TreeBuilder {
    pub fn new() -> TreeBuilder {
        TreeBuilder {
            elements: Vec::new(),
            operators: Vec::new(),
            open_parens: 0,
            last_is_opr: false,
        }
    }

    pub fn push_leaf(&mut self, e: TreeElement) {
        self.elements.push(e);
        self.last_is_opr = false;
    }

    pub fn push_opr(&mut self, opr: Token) -> Result<(), ExprError> {
        match opr {
            Token::StartP => {
                self.operators.push(opr);
                self.open_parens += 1;
                self.last_is_opr = false;
            }
            Token::EndP => {
                if self.last_is_opr {
                    return Err(ExprError::DanglingOperator);
                }
                if self.open_parens == 0 {
                    return Err(ExprError::UnbalancedParens);
                }
                loop {
                    match self.operators.pop() {
                        Some(Token::StartP) => {
                            self.open_parens -= 1;
                            break;
                        }
                        Some(top) => self.attach(top)?,
                        None => return Err(ExprError::UnbalancedParens),
                    }
                }
                self.last_is_opr = false;
            }
            _ => {
                while let Some(&top) = self.operators.last() {
                    if top == Token::StartP {
                        break;
                    }
                    // Unary `!` is right-associative: a `!` on top of the
                    // stack must not be popped by an incoming `!`.
                    let pops = if opr.is_unary() {
                        top.prio() > opr.prio()
                    } else {
                        top.prio() >= opr.prio()
                    };
                    if !pops {
                        break;
                    }
                    if let Some(top) = self.operators.pop() {
                        self.attach(top)?;
                    }
                }
                self.operators.push(opr);
                self.last_is_opr = true;
            }
        }
        Ok(())
    }

    /// Pop children off the element stack (rhs first, LIFO) and push the
    /// completed operator node back as a sub-tree.
    fn attach(&mut self, opr: Token) -> Result<(), ExprError> {
        let rhs = if opr.is_unary() {
            None
        } else {
            Some(Box::new(
                self.elements.pop().ok_or(ExprError::DanglingOperator)?,
            ))
        };
        let lhs = Box::new(self.elements.pop().ok_or(ExprError::DanglingOperator)?);
        self.elements.push(TreeElement::Opr(OprNode {
            opr,
            lhs: Some(lhs),
            rhs,
            result_type: None,
        }));
        Ok(())
    }

    pub fn finish(mut self) -> Result<TreeElement, ExprError> {
        if self.last_is_opr {
            return Err(ExprError::DanglingOperator);
        }
        while let Some(top) = self.operators.pop() {
            if top == Token::StartP {
                return Err(ExprError::UnbalancedParens);
            }
            self.attach(top)?;
        }
        if self.elements.len() > 1 {
            return Err(ExprError::Malformed);
        }
        self.elements.pop().ok_or(ExprError::Empty)
    }
}

impl Default for TreeBuilder {
    fn default() -> TreeBuilder {
        TreeBuilder::new()
    }
}

impl fmt::Display for TreeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeElement::Const(c) => f.write_str(&c.raw),
            TreeElement::Var(v) => f.write_str(&v.raw),
            TreeElement::Opr(o) => match (&o.lhs, &o.rhs) {
                (Some(child), None) if o.opr.is_unary() => write!(f, "!{child}"),
                (Some(lhs), Some(rhs)) => write!(f, "({lhs} {} {rhs})", o.opr),
                _ => f.write_str(o.opr.symbol()),
            },
        }
    }
}
