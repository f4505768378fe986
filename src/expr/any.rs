use std::fmt;

use serde::Deserialize;

use super::token::Token;

/// A scalar as it appears in a JSON snapshot, before any narrowing.
///
/// Numbers are captured as the smallest unsigned/signed 32/64-bit class that
/// holds them; conversion to the expression's static type happens later via
/// [`Any::from_json`].
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPrimitive {
    Null,
    Bool(bool),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    Str(String),
}

impl JsonPrimitive {
    /// Widen any numeric primitive to i128 for range-checked narrowing.
    fn as_i128(&self) -> Option<i128> {
        match self {
            JsonPrimitive::U32(v) => Some(i128::from(*v)),
            JsonPrimitive::U64(v) => Some(i128::from(*v)),
            JsonPrimitive::I32(v) => Some(i128::from(*v)),
            JsonPrimitive::I64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }
}

/// Name of a concrete runtime type; the keys of the operator tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
    Null,
    Bool,
    #[serde(rename = "string")]
    Str,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Json,
}

impl TypeName {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeName::Int16
                | TypeName::Int32
                | TypeName::Int64
                | TypeName::Uint8
                | TypeName::Uint16
                | TypeName::Uint32
                | TypeName::Uint64
        )
    }

    /// Result type of applying `t` to operands of this type, or `None` if
    /// the operator is not defined for it.
    pub fn operator_result(self, t: Token) -> Option<TypeName> {
        match self {
            TypeName::Bool => match t {
                Token::And | Token::Or | Token::Neg | Token::Equal | Token::NotEqual => {
                    Some(TypeName::Bool)
                }
                _ => None,
            },
            TypeName::Str => match t {
                Token::Equal | Token::NotEqual => Some(TypeName::Bool),
                _ => None,
            },
            // Null is the universal "no value": any operator applied to it
            // declares a boolean result, and the null rules decide at
            // evaluation time.
            TypeName::Null => match t {
                Token::StartP | Token::EndP => None,
                _ => Some(TypeName::Bool),
            },
            n if n.is_numeric() => match t {
                Token::Plus | Token::Minus | Token::Mult | Token::Div => Some(n),
                Token::Equal
                | Token::NotEqual
                | Token::Great
                | Token::Less
                | Token::GreatEqual
                | Token::LessEqual => Some(TypeName::Bool),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeName::Null => "null",
            TypeName::Bool => "bool",
            TypeName::Str => "string",
            TypeName::Int16 => "int16",
            TypeName::Int32 => "int32",
            TypeName::Int64 => "int64",
            TypeName::Uint8 => "uint8",
            TypeName::Uint16 => "uint16",
            TypeName::Uint32 => "uint32",
            TypeName::Uint64 => "uint64",
            TypeName::Json => "json",
        };
        f.write_str(name)
    }
}

/// The engine's runtime value.
///
/// A closed set: every operator is an exhaustive match, so adding a variant
/// forces its behavior to be defined everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Any {
    Null,
    Bool(bool),
    Str(String),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Json(JsonPrimitive),
}

impl Any {
    pub fn type_name(&self) -> TypeName {
        match self {
            Any::Null => TypeName::Null,
            Any::Bool(_) => TypeName::Bool,
            Any::Str(_) => TypeName::Str,
            Any::Int16(_) => TypeName::Int16,
            Any::Int32(_) => TypeName::Int32,
            Any::Int64(_) => TypeName::Int64,
            Any::Uint8(_) => TypeName::Uint8,
            Any::Uint16(_) => TypeName::Uint16,
            Any::Uint32(_) => TypeName::Uint32,
            Any::Uint64(_) => TypeName::Uint64,
            Any::Json(_) => TypeName::Json,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Any::Null)
    }

    /// Construct a value of the requested static type from a JSON scalar,
    /// with range-checked numeric narrowing. `None` means the primitive
    /// does not fit the target.
    pub fn from_json(target: TypeName, p: &JsonPrimitive) -> Option<Any> {
        match target {
            TypeName::Bool => match p {
                JsonPrimitive::Bool(b) => Some(Any::Bool(*b)),
                _ => None,
            },
            TypeName::Str => match p {
                JsonPrimitive::Str(s) => Some(Any::Str(s.clone())),
                _ => None,
            },
            n if n.is_numeric() => narrow_i128(n, p.as_i128()?),
            _ => None,
        }
    }
}

/// Range-checked narrowing of a wide integer into the requested type.
pub(crate) fn narrow_i128(target: TypeName, v: i128) -> Option<Any> {
    match target {
        TypeName::Int16 => i16::try_from(v).ok().map(Any::Int16),
        TypeName::Int32 => i32::try_from(v).ok().map(Any::Int32),
        TypeName::Int64 => i64::try_from(v).ok().map(Any::Int64),
        TypeName::Uint8 => u8::try_from(v).ok().map(Any::Uint8),
        TypeName::Uint16 => u16::try_from(v).ok().map(Any::Uint16),
        TypeName::Uint32 => u32::try_from(v).ok().map(Any::Uint32),
        TypeName::Uint64 => u64::try_from(v).ok().map(Any::Uint64),
        _ => None,
    }
}

/// Integer operators: arithmetic stays in the operand type (checked, so
/// overflow and division by zero yield `None`), comparisons produce `Bool`.
macro_rules! int_opr {
    ($a:expr, $b:expr, $opr:expr, $wrap:expr) => {
        match $opr {
            Token::Plus => $a.checked_add($b).map($wrap),
            Token::Minus => $a.checked_sub($b).map($wrap),
            Token::Mult => $a.checked_mul($b).map($wrap),
            Token::Div => $a.checked_div($b).map($wrap),
            Token::Equal => Some(Any::Bool($a == $b)),
            Token::NotEqual => Some(Any::Bool($a != $b)),
            Token::Great => Some(Any::Bool($a > $b)),
            Token::GreatEqual => Some(Any::Bool($a >= $b)),
            Token::Less => Some(Any::Bool($a < $b)),
            Token::LessEqual => Some(Any::Bool($a <= $b)),
            _ => None,
        }
    };
}

fn bool_opr(opr: Token, a: bool, rhs: Option<&Any>) -> Option<Any> {
    if opr == Token::Neg {
        return Some(Any::Bool(!a));
    }
    let b = match rhs {
        Some(Any::Bool(b)) => *b,
        _ => return None,
    };
    match opr {
        Token::And => Some(Any::Bool(a && b)),
        Token::Or => Some(Any::Bool(a || b)),
        Token::Equal => Some(Any::Bool(a == b)),
        Token::NotEqual => Some(Any::Bool(a != b)),
        _ => None,
    }
}

/// Apply an operator to same-typed operands. `None` on a type mismatch or
/// an operator the type does not support; the caller treats that as `Null`.
///
/// Null operands never reach this function — the evaluator resolves them
/// through the null rules first.
pub fn apply(opr: Token, lhs: &Any, rhs: Option<&Any>) -> Option<Any> {
    if let Some(r) = rhs {
        if lhs.type_name() != r.type_name() {
            return None;
        }
    }

    match (lhs, rhs) {
        (Any::Bool(a), _) => bool_opr(opr, *a, rhs),
        (Any::Str(a), Some(Any::Str(b))) => match opr {
            Token::Equal => Some(Any::Bool(a == b)),
            Token::NotEqual => Some(Any::Bool(a != b)),
            _ => None,
        },
        (Any::Int16(a), Some(Any::Int16(b))) => int_opr!(*a, *b, opr, Any::Int16),
        (Any::Int32(a), Some(Any::Int32(b))) => int_opr!(*a, *b, opr, Any::Int32),
        (Any::Int64(a), Some(Any::Int64(b))) => int_opr!(*a, *b, opr, Any::Int64),
        (Any::Uint8(a), Some(Any::Uint8(b))) => int_opr!(*a, *b, opr, Any::Uint8),
        (Any::Uint16(a), Some(Any::Uint16(b))) => int_opr!(*a, *b, opr, Any::Uint16),
        (Any::Uint32(a), Some(Any::Uint32(b))) => int_opr!(*a, *b, opr, Any::Uint32),
        (Any::Uint64(a), Some(Any::Uint64(b))) => int_opr!(*a, *b, opr, Any::Uint64),
        _ => None,
    }
}
