//! Alarm expression engine.
//!
//! An [`Expression`] is compiled once from source text against a schema
//! [`Inventory`](crate::inventory::Inventory) — tokenize, build the tree,
//! resolve types — and is immutable afterwards. Evaluation takes a fresh
//! bindings map (method name to raw JSON snapshot) and produces a boolean;
//! anything that goes wrong at evaluation time degrades to `Null` and
//! usually to `false`, never to a panic or an error.

pub mod any;
pub mod check;
pub mod eval;
pub mod extract;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod var;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::ExprError;
use crate::expr::any::Any;
use crate::expr::lexer::Lexeme;
use crate::expr::parser::{TreeBuilder, TreeElement};
use crate::inventory::Inventory;

/// A compiled alarm expression. Construction never panics; a failed
/// construction is carried as a diagnosable error inside the value.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Option<TreeElement>,
    error: Option<ExprError>,
}

impl Expression {
    pub fn new(source: &str, inventory: &Inventory) -> Expression {
        match Expression::build(source, inventory) {
            Ok(root) => Expression {
                source: source.to_string(),
                root: Some(root),
                error: None,
            },
            Err(e) => Expression {
                source: source.to_string(),
                root: None,
                error: Some(e),
            },
        }
    }

    fn build(source: &str, inventory: &Inventory) -> Result<TreeElement, ExprError> {
        let mut builder = TreeBuilder::new();
        for lexeme in lexer::tokenize(source)? {
            match lexeme {
                Lexeme::Leaf(leaf) => builder.push_leaf(leaf),
                Lexeme::Opr(t) => builder.push_opr(t)?,
            }
        }
        let mut root = builder.finish()?;
        check::check(&mut root, inventory)?;
        Ok(root)
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&ExprError> {
        self.error.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The methods this expression reads, for the surrounding snapshotter
    /// to know what to poll.
    pub fn method_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        if let Some(root) = &self.root {
            collect_methods(root, &mut names);
        }
        names
    }

    /// Evaluate against a bindings snapshot. True exactly when the tree
    /// produces `Bool(true)`; a `Null` or non-boolean final value reads as
    /// false (see [`evaluate_value`](Expression::evaluate_value) for the
    /// distinction).
    pub fn evaluate(&self, bindings: &HashMap<String, String>) -> bool {
        matches!(self.evaluate_value(bindings), Any::Bool(true))
    }

    /// The raw final value, letting diagnostics tell `false` apart from a
    /// degraded `Null`. A failed construction evaluates to `Null`.
    pub fn evaluate_value(&self, bindings: &HashMap<String, String>) -> Any {
        match &self.root {
            Some(root) => eval::eval(root, bindings),
            None => Any::Null,
        }
    }
}

fn collect_methods(e: &TreeElement, out: &mut BTreeSet<String>) {
    match e {
        TreeElement::Var(v) => {
            out.insert(v.method_name.clone());
        }
        TreeElement::Opr(o) => {
            if let Some(lhs) = &o.lhs {
                collect_methods(lhs, out);
            }
            if let Some(rhs) = &o.rhs {
                collect_methods(rhs, out);
            }
        }
        TreeElement::Const(_) => {}
    }
}

/// Pretty-prints the checked tree, fully parenthesized, leaves verbatim;
/// the output re-parses to an equivalent expression. A failed construction
/// prints its original source.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{root}"),
            None => f.write_str(&self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::any::TypeName;
    use crate::expr::token::Token;

    fn inventory() -> Inventory {
        Inventory::from_json(
            r#"{
              "methods": {
                "table.get": {
                  "params": [ { "name": "idx", "type": { "class": "leaf", "name": "uint32" } } ],
                  "notification": true,
                  "result": { "class": "leaf", "name": "uint32" }
                },
                "test.status.t1.get": {
                  "params": [ { "name": "idx", "type": { "class": "leaf", "name": "uint32" } } ],
                  "notification": true,
                  "result": {
                    "class": "struct", "name": "Row",
                    "elements": [
                      { "name": "a", "type": { "class": "leaf", "name": "bool" } },
                      { "name": "b", "type": { "class": "leaf", "name": "uint32" } },
                      { "name": "c", "type": { "class": "enum", "name": "Color",
                          "elements": [ { "name": "A", "value": 0 }, { "name": "B", "value": 1 } ] } }
                    ]
                  }
                },
                "test.s1.get": {
                  "params": [],
                  "notification": true,
                  "result": {
                    "class": "struct", "name": "S",
                    "elements": [
                      { "name": "e_a", "type": { "class": "enum", "name": "Color",
                          "elements": [ { "name": "A", "value": 0 }, { "name": "B", "value": 1 } ] } }
                    ]
                  }
                },
                "missingVar.get": {
                  "params": [],
                  "notification": true,
                  "result": { "class": "leaf", "name": "uint32" }
                },
                "missingFlag.get": {
                  "params": [],
                  "notification": true,
                  "result": { "class": "leaf", "name": "bool" }
                },
                "u8.get": {
                  "params": [],
                  "notification": true,
                  "result": { "class": "leaf", "name": "uint8" }
                }
              }
            }"#,
        )
        .expect("inventory fixture")
    }

    fn bindings() -> HashMap<String, String> {
        let mut b = HashMap::new();
        b.insert(
            "table".to_string(),
            r#"{"id":1,"error":null,"result":[
                {"key":[0],"val":42},
                {"key":[1],"val":7}
            ]}"#
            .to_string(),
        );
        b.insert(
            "test.status.t1".to_string(),
            r#"{"id":2,"error":null,"result":[
                {"key":1,"val":{"a":true,"b":10,"c":"A"}},
                {"key":2,"val":{"a":false,"b":20,"c":"B"}}
            ]}"#
            .to_string(),
        );
        b.insert(
            "test.s1".to_string(),
            r#"{"id":3,"error":null,"result":{"e_a":"A"}}"#.to_string(),
        );
        b
    }

    fn expr(src: &str) -> Expression {
        Expression::new(src, &inventory())
    }

    fn eval_true(src: &str) -> bool {
        let e = expr(src);
        assert!(e.ok(), "{src}: {:?}", e.error());
        e.evaluate(&bindings())
    }

    #[test]
    fn boolean_and_string_literals() {
        for src in [
            "true",
            "!!true",
            "!false",
            "true && true",
            "true || false",
            "false || true",
            "\"a\" == \"a\"",
            "\"a\" != \"b\"",
            "nil == nil",
        ] {
            assert!(eval_true(src), "{src}");
        }
        for src in [
            "false",
            "!true",
            "true && false",
            "false || false",
            "\"a\" == \"A\"",
            "nil != nil",
        ] {
            assert!(!eval_true(src), "{src}");
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert!(eval_true("17 == 3 * 4 + 5"));
        assert!(eval_true("1 + 2 * 3 == 7"));
        assert!(eval_true("(1 + 2) * 3 == 9"));
        assert!(eval_true("10 - 2 - 3 == 5"));
        assert_eq!(expr("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(
            expr("1 + 2 * 3").evaluate_value(&bindings()),
            Any::Uint32(7)
        );
    }

    #[test]
    fn non_boolean_top_reads_false() {
        let e = expr("1 + 1");
        assert!(e.ok());
        assert!(!e.evaluate(&bindings()));
        assert_eq!(e.evaluate_value(&bindings()), Any::Uint32(2));
    }

    #[test]
    fn structural_errors() {
        assert_eq!(expr("(1 + 2").error(), Some(&ExprError::UnbalancedParens));
        assert_eq!(expr("1 + 2)").error(), Some(&ExprError::UnbalancedParens));
        assert_eq!(expr(") (").error(), Some(&ExprError::UnbalancedParens));
        assert_eq!(expr("!").error(), Some(&ExprError::DanglingOperator));
        assert_eq!(expr("1 +").error(), Some(&ExprError::DanglingOperator));
        assert_eq!(expr("").error(), Some(&ExprError::Empty));
        assert_eq!(expr("()").error(), Some(&ExprError::Empty));
        assert_eq!(expr("1 2").error(), Some(&ExprError::Malformed));
        assert!(expr("((1+2))").ok());
        assert_eq!(expr("1 $ 2").error(), Some(&ExprError::UnknownToken(2)));
    }

    #[test]
    fn semantic_errors() {
        assert_eq!(
            expr("5 == \"5\"").error(),
            Some(&ExprError::TypeNegotiation)
        );
        assert_eq!(
            expr("unheardOf == 1").error(),
            Some(&ExprError::UnknownMethod("unheardOf".into()))
        );
        // Two literals with no common concrete type fail before any
        // operator lookup.
        assert_eq!(expr("5 && true").error(), Some(&ExprError::TypeNegotiation));
        assert_eq!(
            expr("!5").error(),
            Some(&ExprError::UnsupportedOperator(Token::Neg, TypeName::Uint32))
        );
        assert_eq!(
            expr("missingVar && missingVar").error(),
            Some(&ExprError::UnsupportedOperator(Token::And, TypeName::Uint32))
        );
        assert!(matches!(
            expr("table@val == 1").error(),
            Some(ExprError::IndexCountMismatch { .. })
        ));
        assert!(matches!(
            expr("test.status.t1[1]@zzz == 1").error(),
            Some(ExprError::UnresolvedPath { .. })
        ));
    }

    #[test]
    fn null_propagation_for_absent_bindings() {
        // Constructed against the schema, evaluated with no snapshots.
        assert!(!eval_true("missingVar == 5"));
        assert!(eval_true("missingVar != 5"));
        assert!(!eval_true("missingFlag && true"));
        assert!(eval_true("missingFlag || true"));
        assert!(!eval_true("missingFlag || false"));
        assert!(eval_true("missingVar == nil"));
        // Disjunction of two absent values is a definite false, not Null.
        assert_eq!(
            expr("missingFlag || missingFlag").evaluate_value(&bindings()),
            Any::Bool(false)
        );
        assert_eq!(
            expr("nil || nil").evaluate_value(&bindings()),
            Any::Bool(false)
        );
        assert_eq!(
            expr("missingVar + 1").evaluate_value(&bindings()),
            Any::Null
        );
    }

    #[test]
    fn keyed_table_lookup() {
        assert!(eval_true("table[0]@val == 42"));
        assert!(eval_true("table[1]@val == 7"));
        assert!(!eval_true("table[2]@val == 42"));
        assert!(eval_true("table[2]@val == nil"));
        assert!(eval_true("test.status.t1[1]@a"));
        assert!(!eval_true("test.status.t1[2]@a"));
        assert!(eval_true("test.status.t1[2]@b == 20"));
        // Key placement is free within the dotted name.
        assert!(eval_true("test[1].status.t1@a == test.status.t1[1]@a"));
    }

    #[test]
    fn enum_variables() {
        assert!(eval_true("test.s1@e_a == \"A\""));
        assert!(!eval_true("test.s1@e_a == \"B\""));
        assert!(eval_true("test.s1@e_a != \"B\""));
        assert!(eval_true("test.status.t1[2]@c == \"B\""));
        assert!(eval_true("test.status.t1[9]@c == nil"));
        assert!(matches!(
            expr("test.s1@e_a < \"B\"").error(),
            Some(ExprError::UnsupportedOperator(Token::Less, _))
        ));
    }

    #[test]
    fn uint8_narrowing_of_snapshot_values() {
        let e = expr("u8 > 0");
        assert!(e.ok(), "{:?}", e.error());
        let mut b = bindings();
        b.insert("u8".into(), r#"{"id":1,"error":null,"result":200}"#.into());
        assert!(e.evaluate(&b));
        // 300 does not fit a uint8; the variable degrades to Null.
        b.insert("u8".into(), r#"{"id":1,"error":null,"result":300}"#.into());
        assert!(!e.evaluate(&b));
        assert_eq!(e.evaluate_value(&b), Any::Bool(false));
    }

    #[test]
    fn display_round_trips() {
        let inv = inventory();
        let b = bindings();
        for src in [
            "17 == 3 * 4 + 5",
            "!!true",
            "test.status.t1[1]@a || false",
            "(1 + 2) * 3 > 8",
            "test.s1@e_a == \"A\" && table[0]@val == 42",
        ] {
            let first = Expression::new(src, &inv);
            assert!(first.ok(), "{src}: {:?}", first.error());
            let printed = first.to_string();
            let second = Expression::new(&printed, &inv);
            assert!(second.ok(), "{printed}: {:?}", second.error());
            assert_eq!(
                first.evaluate_value(&b),
                second.evaluate_value(&b),
                "{src} vs {printed}"
            );
            // Printing is a fixed point.
            assert_eq!(second.to_string(), printed);
        }
    }

    #[test]
    fn method_name_collection() {
        let e = expr("test.status.t1[1]@a && test.s1@e_a == \"A\"");
        assert!(e.ok());
        let names: Vec<_> = e.method_names().into_iter().collect();
        assert_eq!(names, ["test.s1", "test.status.t1"]);
    }

    #[test]
    fn concurrent_evaluation() {
        let e = expr("table[0]@val == 42 && test.status.t1[1]@a");
        assert!(e.ok());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let b = bindings();
                    for _ in 0..100 {
                        assert!(e.evaluate(&b));
                    }
                });
            }
        });
    }

    #[test]
    fn failed_construction_displays_source() {
        let e = expr("(1 + 2");
        assert_eq!(e.to_string(), "(1 + 2");
        assert_eq!(e.evaluate_value(&bindings()), Any::Null);
        assert!(!e.evaluate(&bindings()));
    }
}
