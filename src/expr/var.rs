//! Variable references: `method[key]@path` leaves.
//!
//! Syntax: `name(.name|[key])* ['@' name(.name|[key])*]`. Everything before
//! `@` is the dotted method name; everything after is the path into the
//! method's result. Bracketed literals may sit on any dotted segment and are
//! collected, in order, into one index-key list — `a[1].b@x` and `a.b[1]@x`
//! mean the same thing.

use std::collections::HashMap;

use crate::error::ExprError;
use crate::expr::any::{Any, JsonPrimitive, TypeName};
use crate::expr::extract::{self, JsonParseToken};
use crate::expr::parser::ConstNode;
use crate::inventory::{EnumDescriptor, Inventory};

#[derive(Debug, Clone)]
pub struct VarNode {
    pub raw: String,
    pub method_name: String,
    pub variable_path: Vec<String>,
    pub index_keys: Vec<ConstNode>,
    pub program: Vec<JsonParseToken>,
    pub result_type: Option<TypeName>,
    pub enum_descriptor: Option<EnumDescriptor>,
}

impl VarNode {
    pub fn is_enum(&self) -> bool {
        self.enum_descriptor.is_some()
    }

    /// Match a variable reference at the start of `src`. Returns the node
    /// and the number of bytes consumed, or `None` when the text is not a
    /// well-formed reference (the tokenizer then reports the offset).
    pub fn parse(src: &str) -> Option<(VarNode, usize)> {
        let mut cur = Cursor { src, pos: 0 };
        let (method_segs, mut index_keys) = parse_part(&mut cur)?;
        let mut variable_path = Vec::new();
        if cur.eat('@') {
            let (segs, keys) = parse_part(&mut cur)?;
            variable_path = segs;
            index_keys.extend(keys);
        }
        let node = VarNode {
            raw: src[..cur.pos].to_string(),
            method_name: method_segs.join("."),
            variable_path,
            index_keys,
            program: Vec::new(),
            result_type: None,
            enum_descriptor: None,
        };
        Some((node, cur.pos))
    }

    /// Resolve this reference against the schema: convert the index keys to
    /// the declared parameter types, walk the result descriptor along the
    /// variable path, and compile the path-match program.
    pub fn check(&mut self, inventory: &Inventory) -> Result<(), ExprError> {
        let (_, method) = inventory
            .resolve(&self.method_name)
            .ok_or_else(|| ExprError::UnknownMethod(self.method_name.clone()))?;
        if !method.notification {
            return Err(ExprError::NoNotification(self.method_name.clone()));
        }
        if method.params.len() != self.index_keys.len() {
            return Err(ExprError::IndexCountMismatch {
                method: self.method_name.clone(),
                expected: method.params.len(),
                got: self.index_keys.len(),
            });
        }
        for (i, (param, key)) in method.params.iter().zip(&mut self.index_keys).enumerate() {
            let fit = match param.ty.expr_type() {
                Some(target) => key.convert_to(target, param.ty.as_enum()),
                None => false,
            };
            if !fit {
                return Err(ExprError::IndexTypeMismatch {
                    method: self.method_name.clone(),
                    position: i,
                });
            }
        }

        let keyed = !method.params.is_empty();
        let mut program = vec![
            JsonParseToken::ObjectStart,
            JsonParseToken::ObjectElementStart("result".to_string()),
        ];
        if keyed {
            program.push(JsonParseToken::ArrayStart);
            program.push(JsonParseToken::SetModeKeySearch);
        }

        // A keyed method with a scalar cell may spell the cell out as the
        // single segment "val"; the row scanner finds it either way.
        let mut remaining: &[String] = &self.variable_path;
        if keyed
            && method.result.expr_type().is_some()
            && remaining.len() == 1
            && remaining[0] == "val"
        {
            remaining = &[];
        }

        let mut desc = &method.result;
        while let Some(seg) = remaining.first() {
            match desc.element(seg) {
                Some(next) => {
                    program.push(JsonParseToken::ObjectStart);
                    program.push(JsonParseToken::ObjectElementStart(seg.clone()));
                    desc = next;
                    remaining = &remaining[1..];
                }
                None => {
                    return Err(ExprError::UnresolvedPath {
                        method: self.method_name.clone(),
                        path: self.variable_path.join("."),
                    })
                }
            }
        }
        // The walk must end on something comparable, never a bare struct.
        let ty = desc.expr_type().ok_or_else(|| ExprError::UnresolvedPath {
            method: self.method_name.clone(),
            path: self.variable_path.join("."),
        })?;
        program.push(JsonParseToken::SetModeCaptureValue);

        self.result_type = Some(ty);
        self.enum_descriptor = desc.as_enum().cloned();
        self.program = program;
        Ok(())
    }

    /// Pull this variable's current value out of the bindings. Every
    /// failure degrades to `Null`: missing binding, failed extraction,
    /// value out of range for the resolved type.
    pub fn eval(&self, bindings: &HashMap<String, String>) -> Any {
        let snapshot = match bindings.get(&self.method_name) {
            Some(s) => s,
            None => return Any::Null,
        };
        let primitive = match extract::extract(&self.program, &self.index_keys, snapshot) {
            Some(p) => p,
            None => return Any::Null,
        };
        let ty = match self.result_type {
            Some(t) => t,
            None => return Any::Null,
        };
        if let Some(d) = &self.enum_descriptor {
            // Snapshots carry the member name, not the numeric value.
            if let JsonPrimitive::Str(name) = &primitive {
                return d.value_of(name).map(Any::Int32).unwrap_or(Any::Null);
            }
        }
        Any::from_json(ty, &primitive).unwrap_or(Any::Null)
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }
}

/// `name([key])*('.'name([key])*)*` — one side of the `@`.
fn parse_part(cur: &mut Cursor) -> Option<(Vec<String>, Vec<ConstNode>)> {
    let mut segs = Vec::new();
    let mut keys = Vec::new();
    loop {
        segs.push(parse_name(cur)?);
        while cur.peek() == Some('[') {
            keys.push(parse_key(cur)?);
        }
        if !cur.eat('.') {
            break;
        }
    }
    Some((segs, keys))
}

fn parse_name(cur: &mut Cursor) -> Option<String> {
    let start = cur.pos;
    match cur.peek() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => cur.pos += 1,
        _ => return None,
    }
    while let Some(c) = cur.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            cur.pos += 1;
        } else {
            break;
        }
    }
    Some(cur.src[start..cur.pos].to_string())
}

/// `[<literal>]` where the literal is a JSON scalar: integer, quoted
/// string, or bool. Exactly one literal per bracket pair.
fn parse_key(cur: &mut Cursor) -> Option<ConstNode> {
    if !cur.eat('[') {
        return None;
    }
    let key = match cur.peek()? {
        '"' => {
            let start = cur.pos;
            cur.pos += 1;
            loop {
                match cur.peek()? {
                    '"' => {
                        cur.pos += 1;
                        break;
                    }
                    c => cur.pos += c.len_utf8(),
                }
            }
            let raw = &cur.src[start..cur.pos];
            ConstNode::new(Any::Str(raw[1..raw.len() - 1].to_string()), raw)
        }
        c if c == '-' || c.is_ascii_digit() => {
            let start = cur.pos;
            if c == '-' {
                cur.pos += 1;
            }
            while matches!(cur.peek(), Some(d) if d.is_ascii_digit()) {
                cur.pos += 1;
            }
            let raw = &cur.src[start..cur.pos];
            let value = number_literal(raw)?;
            ConstNode::new(value, raw)
        }
        't' | 'f' => {
            let raw = if cur.src[cur.pos..].starts_with("true") {
                cur.pos += 4;
                "true"
            } else if cur.src[cur.pos..].starts_with("false") {
                cur.pos += 5;
                "false"
            } else {
                return None;
            };
            ConstNode::new(Any::Bool(raw == "true"), raw)
        }
        _ => return None,
    };
    if !cur.eat(']') {
        return None;
    }
    Some(key)
}

/// Integer literal classification shared with the tokenizer: unsigned is
/// tried before signed so large positive values land in `Uint64`.
pub(crate) fn number_literal(raw: &str) -> Option<Any> {
    if raw.starts_with('-') {
        if let Ok(v) = raw.parse::<i32>() {
            return Some(Any::Int32(v));
        }
        return raw.parse::<i64>().ok().map(Any::Int64);
    }
    if let Ok(v) = raw.parse::<u32>() {
        return Some(Any::Uint32(v));
    }
    raw.parse::<u64>().ok().map(Any::Uint64)
}
