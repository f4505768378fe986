//! Single-pass tokenizer: source text to a flat sequence of unlinked
//! leaves and operators.
//!
//! At each position the alternatives are tried in a fixed order: string
//! literal, word (the literals `nil`/`true`/`false` or a variable
//! reference), integer literal, multi-character operator, single-character
//! operator. Numbers come before operators so a `-` glued to digits lexes
//! as a negative literal. The first position matching nothing aborts the
//! scan with its offset.

use crate::error::ExprError;
use crate::expr::any::Any;
use crate::expr::parser::{ConstNode, TreeElement};
use crate::expr::token::Token;
use crate::expr::var::{self, VarNode};

#[derive(Debug, Clone)]
pub enum Lexeme {
    Leaf(TreeElement),
    Opr(Token),
}

pub fn tokenize(src: &str) -> Result<Vec<Lexeme>, ExprError> {
    let mut out = Vec::new();
    let mut pos = 0;
    let bytes = src.as_bytes();
    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if b == b'"' {
            let (node, used) = string_literal(&src[pos..]).ok_or(ExprError::UnknownToken(pos))?;
            out.push(Lexeme::Leaf(TreeElement::Const(node)));
            pos += used;
            continue;
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            let (node, used) = VarNode::parse(&src[pos..]).ok_or(ExprError::UnknownToken(pos))?;
            out.push(Lexeme::Leaf(word_leaf(node)));
            pos += used;
            continue;
        }
        let negative_number = b == b'-' && matches!(bytes.get(pos + 1), Some(d) if d.is_ascii_digit());
        if b.is_ascii_digit() || negative_number {
            let (node, used) = number(&src[pos..]).ok_or(ExprError::UnknownToken(pos))?;
            out.push(Lexeme::Leaf(TreeElement::Const(node)));
            pos += used;
            continue;
        }
        let (token, used) = operator(&src[pos..]).ok_or(ExprError::UnknownToken(pos))?;
        out.push(Lexeme::Opr(token));
        pos += used;
    }
    Ok(out)
}

/// A bare word that happens to be a literal is a constant, anything else
/// is a variable reference.
fn word_leaf(node: VarNode) -> TreeElement {
    match node.raw.as_str() {
        "nil" => TreeElement::Const(ConstNode::new(Any::Null, "nil")),
        "true" => TreeElement::Const(ConstNode::new(Any::Bool(true), "true")),
        "false" => TreeElement::Const(ConstNode::new(Any::Bool(false), "false")),
        _ => TreeElement::Var(node),
    }
}

fn string_literal(src: &str) -> Option<(ConstNode, usize)> {
    let mut value = String::new();
    let mut chars = src.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                let used = i + 1;
                return Some((ConstNode::new(Any::Str(value), &src[..used]), used));
            }
            '\\' => match chars.next() {
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                _ => return None,
            },
            c => value.push(c),
        }
    }
    None
}

fn number(src: &str) -> Option<(ConstNode, usize)> {
    let mut end = 0;
    if src.starts_with('-') {
        end = 1;
    }
    while matches!(src.as_bytes().get(end), Some(d) if d.is_ascii_digit()) {
        end += 1;
    }
    let raw = &src[..end];
    let value = var::number_literal(raw)?;
    Some((ConstNode::new(value, raw), end))
}

fn operator(src: &str) -> Option<(Token, usize)> {
    const TWO: [(&str, Token); 6] = [
        ("==", Token::Equal),
        ("!=", Token::NotEqual),
        (">=", Token::GreatEqual),
        ("<=", Token::LessEqual),
        ("&&", Token::And),
        ("||", Token::Or),
    ];
    for (text, token) in TWO {
        if src.starts_with(text) {
            return Some((token, 2));
        }
    }
    let token = match src.as_bytes().first()? {
        b'+' => Token::Plus,
        b'-' => Token::Minus,
        b'*' => Token::Mult,
        b'/' => Token::Div,
        b'!' => Token::Neg,
        b'>' => Token::Great,
        b'<' => Token::Less,
        b'(' => Token::StartP,
        b')' => Token::EndP,
        _ => return None,
    };
    Some((token, 1))
}
