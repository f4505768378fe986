//! Bottom-up type resolution of a parsed tree. Runs exactly once, right
//! after the Shunting-Yard pass; afterwards every node carries a resolved
//! result type and evaluation can no longer fail structurally.

use crate::error::ExprError;
use crate::expr::any::TypeName;
use crate::expr::parser::{OprNode, TreeElement};
use crate::expr::token::Token;
use crate::inventory::{EnumDescriptor, Inventory};

/// First common type wins when two literal operands negotiate.
const NEGOTIATION_ORDER: [TypeName; 6] = [
    TypeName::Uint32,
    TypeName::Int32,
    TypeName::Uint64,
    TypeName::Int64,
    TypeName::Bool,
    TypeName::Str,
];

pub fn check(e: &mut TreeElement, inventory: &Inventory) -> Result<(), ExprError> {
    match e {
        TreeElement::Const(_) => Ok(()),
        TreeElement::Var(v) => v.check(inventory),
        TreeElement::Opr(o) => check_opr(o, inventory),
    }
}

fn check_opr(node: &mut OprNode, inventory: &Inventory) -> Result<(), ExprError> {
    if let Some(lhs) = node.lhs.as_deref_mut() {
        check(lhs, inventory)?;
    }
    if let Some(rhs) = node.rhs.as_deref_mut() {
        check(rhs, inventory)?;
    }

    negotiate(node)?;

    let lhs = node.lhs.as_deref().ok_or(ExprError::Malformed)?;
    let lhs_type = lhs.result_type().ok_or(ExprError::TypeNegotiation)?;
    let rhs = node.rhs.as_deref();
    let rhs_type = match rhs {
        Some(r) => Some(r.result_type().ok_or(ExprError::TypeNegotiation)?),
        None => None,
    };

    // Operand types must agree, except that Null compares against anything.
    if let Some(rt) = rhs_type {
        if lhs_type != rt && lhs_type != TypeName::Null && rt != TypeName::Null {
            return Err(ExprError::TypeMismatch(lhs_type, rt));
        }
    }

    // Enum-backed variables only support equality, and the comparison is
    // always boolean regardless of the Int32 carrier type.
    if is_enum_var(lhs) || rhs.map_or(false, is_enum_var) {
        if !matches!(node.opr, Token::Equal | Token::NotEqual) {
            return Err(ExprError::UnsupportedOperator(node.opr, TypeName::Int32));
        }
        node.result_type = Some(TypeName::Bool);
        return Ok(());
    }

    let result = lhs_type
        .operator_result(node.opr)
        .ok_or(ExprError::UnsupportedOperator(node.opr, lhs_type))?;
    node.result_type = Some(result);
    Ok(())
}

/// Make both operands agree on a concrete type where literals leave room:
/// two literals negotiate through [`NEGOTIATION_ORDER`], a single literal
/// re-interprets itself as the other side's resolved type (enum-aware).
/// `nil` literals stay `Null` and are tolerated by the mismatch check.
fn negotiate(node: &mut OprNode) -> Result<(), ExprError> {
    let (lhs, rhs) = match (node.lhs.as_deref_mut(), node.rhs.as_deref_mut()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Ok(()),
    };
    match (lhs, rhs) {
        (TreeElement::Const(a), TreeElement::Const(b)) => {
            if a.value.is_null() || b.value.is_null() {
                return Ok(());
            }
            if a.value.type_name() == b.value.type_name() {
                return Ok(());
            }
            for t in NEGOTIATION_ORDER {
                let mut ca = a.clone();
                let mut cb = b.clone();
                if ca.convert_to(t, None) && cb.convert_to(t, None) {
                    *a = ca;
                    *b = cb;
                    return Ok(());
                }
            }
            Err(ExprError::TypeNegotiation)
        }
        (TreeElement::Const(c), other) | (other, TreeElement::Const(c)) => {
            if c.value.is_null() {
                return Ok(());
            }
            if let Some(target) = other.result_type() {
                // Failure is fine here; the mismatch check reports it.
                c.convert_to(target, enum_descriptor_of(other));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn is_enum_var(e: &TreeElement) -> bool {
    matches!(e, TreeElement::Var(v) if v.is_enum())
}

fn enum_descriptor_of(e: &TreeElement) -> Option<&EnumDescriptor> {
    match e {
        TreeElement::Var(v) => v.enum_descriptor.as_ref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::any::Any;
    use crate::expr::parser::ConstNode;
    use crate::expr::var::VarNode;
    use crate::inventory::{EnumDescriptor, EnumElement, Method, TypeDescriptor};

    fn opr(t: Token, lhs: TreeElement, rhs: Option<TreeElement>) -> TreeElement {
        TreeElement::Opr(OprNode {
            opr: t,
            lhs: Some(Box::new(lhs)),
            rhs: rhs.map(Box::new),
            result_type: None,
        })
    }

    fn num(raw: &str) -> TreeElement {
        let value = crate::expr::var::number_literal(raw).expect("number literal");
        TreeElement::Const(ConstNode::new(value, raw))
    }

    fn string(s: &str) -> TreeElement {
        TreeElement::Const(ConstNode::new(Any::Str(s.into()), format!("\"{s}\"")))
    }

    fn nil() -> TreeElement {
        TreeElement::Const(ConstNode::new(Any::Null, "nil"))
    }

    fn inv_with_enum_var() -> (Inventory, VarNode) {
        let inv = Inventory::new().with_method(
            "s.get",
            Method {
                params: vec![],
                notification: true,
                result: TypeDescriptor::Enum(EnumDescriptor {
                    name: "Color".into(),
                    elements: vec![
                        EnumElement {
                            name: "A".into(),
                            value: 0,
                        },
                        EnumElement {
                            name: "B".into(),
                            value: 1,
                        },
                    ],
                }),
            },
        );
        let (mut v, _) = VarNode::parse("s").expect("var");
        v.check(&inv).expect("check");
        (inv, v)
    }

    #[test]
    fn literal_pair_negotiates_first_common_type() {
        let inv = Inventory::new();
        let mut e = opr(Token::Equal, num("5"), Some(num("-5")));
        check(&mut e, &inv).unwrap();
        // uint32 fails for -5, int32 is the first fit for both
        match &e {
            TreeElement::Opr(o) => {
                assert_eq!(o.result_type, Some(TypeName::Bool));
                match o.lhs.as_deref() {
                    Some(TreeElement::Const(c)) => assert_eq!(c.value, Any::Int32(5)),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn literal_pair_without_common_type() {
        let mut e = opr(Token::Equal, num("5"), Some(string("5")));
        assert_eq!(
            check(&mut e, &Inventory::new()),
            Err(ExprError::TypeNegotiation)
        );
    }

    #[test]
    fn arithmetic_keeps_operand_type() {
        let mut e = opr(Token::Plus, num("2"), Some(num("3")));
        check(&mut e, &Inventory::new()).unwrap();
        assert_eq!(e.result_type(), Some(TypeName::Uint32));
    }

    #[test]
    fn nil_compares_with_anything() {
        let mut e = opr(Token::Equal, num("5"), Some(nil()));
        check(&mut e, &Inventory::new()).unwrap();
        assert_eq!(e.result_type(), Some(TypeName::Bool));

        let mut e = opr(Token::Equal, nil(), Some(nil()));
        check(&mut e, &Inventory::new()).unwrap();
        assert_eq!(e.result_type(), Some(TypeName::Bool));
    }

    #[test]
    fn bool_rejects_arithmetic() {
        let t = TreeElement::Const(ConstNode::new(Any::Bool(true), "true"));
        let f = TreeElement::Const(ConstNode::new(Any::Bool(false), "false"));
        let mut e = opr(Token::Plus, t, Some(f));
        assert_eq!(
            check(&mut e, &Inventory::new()),
            Err(ExprError::UnsupportedOperator(Token::Plus, TypeName::Bool))
        );
    }

    #[test]
    fn enum_var_compares_against_member_name() {
        let (inv, v) = inv_with_enum_var();
        let mut e = opr(Token::Equal, TreeElement::Var(v.clone()), Some(string("B")));
        check(&mut e, &inv).unwrap();
        assert_eq!(e.result_type(), Some(TypeName::Bool));
        match &e {
            TreeElement::Opr(o) => match o.rhs.as_deref() {
                Some(TreeElement::Const(c)) => assert_eq!(c.value, Any::Int32(1)),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }

        // not a member
        let mut e = opr(Token::Equal, TreeElement::Var(v.clone()), Some(string("Z")));
        assert_eq!(
            check(&mut e, &inv),
            Err(ExprError::TypeMismatch(TypeName::Int32, TypeName::Str))
        );

        // ordering is not defined for enums
        let mut e = opr(Token::Less, TreeElement::Var(v), Some(string("B")));
        assert_eq!(
            check(&mut e, &inv),
            Err(ExprError::UnsupportedOperator(Token::Less, TypeName::Int32))
        );
    }

    #[test]
    fn single_literal_adopts_variable_type() {
        let inv = Inventory::new().with_method(
            "m.get",
            Method {
                params: vec![],
                notification: true,
                result: TypeDescriptor::Leaf {
                    name: TypeName::Uint8,
                },
            },
        );
        let (mut v, _) = VarNode::parse("m").expect("var");
        v.check(&inv).expect("check");
        let mut e = opr(Token::Great, TreeElement::Var(v), Some(num("200")));
        check(&mut e, &inv).unwrap();
        match &e {
            TreeElement::Opr(o) => match o.rhs.as_deref() {
                Some(TreeElement::Const(c)) => assert_eq!(c.value, Any::Uint8(200)),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
