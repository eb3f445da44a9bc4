//! Small expression language evaluated against JSON contexts.
//!
//! Expressions are compiled once and evaluated many times:
//!
//! ```
//! use expressions::Expression;
//! use serde_json::json;
//!
//! let label = Expression::compile("d.name + ' (' + d.pop + ')'").unwrap();
//! let ctx = json!({"d": {"name": "Lyon", "pop": 513275}});
//! assert_eq!(label.evaluate(&ctx).unwrap(), json!("Lyon (513275)"));
//! ```

pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use eval::{number_value, parse_float, to_display_string, to_number, truthy};
pub use parser::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    Lex { position: usize, message: String },
    Parse { position: usize, message: String },
    Eval(String),
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::Lex { position, message } => {
                write!(f, "lex error at {position}: {message}")
            }
            ExprError::Parse { position, message } => {
                write!(f, "parse error at {position}: {message}")
            }
            ExprError::Eval(message) => write!(f, "evaluation error: {message}"),
        }
    }
}

impl std::error::Error for ExprError {}

/// A compiled expression. Cloning shares the syntax tree.
#[derive(Debug, Clone)]
pub struct Expression {
    source: Arc<str>,
    ast: Arc<Expr>,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(source)?;
        let ast = parser::parse(&tokens, source.len())?;
        Ok(Self {
            source: Arc::from(source),
            ast: Arc::new(ast),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn evaluate(&self, ctx: &Value) -> Result<Value, ExprError> {
        eval::evaluate(&self.ast, ctx)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Compile and evaluate in one go.
pub fn evaluate(source: &str, ctx: &Value) -> Result<Value, ExprError> {
    Expression::compile(source)?.evaluate(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eval_empty(src: &str) -> Value {
        evaluate(src, &json!({})).unwrap()
    }

    #[test]
    fn literals() {
        assert_eq!(eval_empty("10"), json!(10));
        assert_eq!(eval_empty("10.1"), json!(10.1));
        assert_eq!(eval_empty("\"10\""), json!("10"));
        assert_eq!(eval_empty("'ten'"), json!("ten"));
    }

    #[test]
    fn concatenation() {
        assert_eq!(eval_empty("\"10\"+\"11\""), json!("1011"));
        assert_eq!(eval_empty("10+11"), json!("21"));
        assert_eq!(eval_empty("'a' + 1"), json!("a1"));
    }

    #[test]
    fn arrays() {
        assert_eq!(eval_empty("[\"10\", \"11\"]"), json!(["10", "11"]));
        assert_eq!(eval_empty("[10, 11]"), json!([10, 11]));
    }

    #[test]
    fn identifiers_return_raw_values() {
        assert_eq!(evaluate("test", &json!({"test": 10})).unwrap(), json!(10));
        assert_eq!(evaluate("test", &json!({"test": 10.1})).unwrap(), json!(10.1));
        assert_eq!(evaluate("test", &json!({"test": "10"})).unwrap(), json!("10"));
        assert_eq!(evaluate("missing", &json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn identifiers_concatenate_as_text() {
        let ctx = json!({"test": 10, "test1": 11});
        assert_eq!(evaluate("test+test1", &ctx).unwrap(), json!("1011"));
        assert_eq!(evaluate("[test, test1]", &ctx).unwrap(), json!(["10", "11"]));
    }

    #[test]
    fn ternary_with_strict_equality() {
        let e = Expression::compile("test === 10 ? \"first\" : \"second\"").unwrap();
        assert_eq!(e.evaluate(&json!({"test": 10})).unwrap(), json!("first"));
        assert_eq!(e.evaluate(&json!({"test": 10.1})).unwrap(), json!("second"));
        assert_eq!(e.evaluate(&json!({"test": "10"})).unwrap(), json!("second"));
    }

    #[test]
    fn members_and_arithmetic() {
        let ctx = json!({"d": {"name": "FRA", "v": "4", "pts": [[1, 2], [3, 4]]}, "i": 2});
        assert_eq!(evaluate("d.name", &ctx).unwrap(), json!("FRA"));
        assert_eq!(evaluate("d['name']", &ctx).unwrap(), json!("FRA"));
        assert_eq!(evaluate("d.v * 2", &ctx).unwrap(), json!(8));
        assert_eq!(evaluate("d.v - i", &ctx).unwrap(), json!(2));
        assert_eq!(evaluate("i % 2 == 0", &ctx).unwrap(), json!(true));
        assert_eq!(evaluate("d.pts[1][0]", &ctx).unwrap(), json!(3));
        assert_eq!(evaluate("d.pts.length", &ctx).unwrap(), json!(2));
        assert_eq!(evaluate("-i", &ctx).unwrap(), json!(-2));
        assert_eq!(evaluate("!d.missing", &ctx).unwrap(), json!(true));
        assert_eq!(evaluate("d.v == 4", &ctx).unwrap(), json!(true));
        assert_eq!(evaluate("d.v === 4", &ctx).unwrap(), json!(false));
        assert_eq!(evaluate("d.v / 0", &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn logical_operators_return_operands() {
        let ctx = json!({"a": 0, "b": "x"});
        assert_eq!(evaluate("a || b", &ctx).unwrap(), json!("x"));
        assert_eq!(evaluate("a && b", &ctx).unwrap(), json!(0));
        assert_eq!(evaluate("a < 1 && b != 'y'", &ctx).unwrap(), json!(true));
    }

    #[test]
    fn builtin_functions() {
        let ctx = json!({"d": {"lon": "2.35", "lat": "48.85", "r": "2.6"}});
        assert_eq!(
            evaluate("[parseFloat(d.lon), parseFloat(d.lat)]", &ctx).unwrap(),
            json!([2.35, 48.85])
        );
        assert_eq!(evaluate("parseFloat(d.lon)", &ctx).unwrap(), json!(2.35));
        assert_eq!(evaluate("Math.round(d.r)", &ctx).unwrap(), json!(3));
        assert_eq!(evaluate("Math.max(1, d.r, 2)", &ctx).unwrap(), json!(2.6));
        assert_eq!(evaluate("parseInt('12px')", &ctx).unwrap(), json!(12));
        assert!(matches!(
            evaluate("alert(1)", &ctx),
            Err(ExprError::Eval(m)) if m.contains("alert")
        ));
    }

    #[test]
    fn object_literals_keep_raw_values() {
        let ctx = json!({"d": {"v": 3}});
        assert_eq!(
            evaluate("{value: d.v, label: 'n'}", &ctx).unwrap(),
            json!({"value": 3, "label": "n"})
        );
    }

    #[test]
    fn compile_errors_carry_positions() {
        let err = Expression::compile("d.").unwrap_err();
        assert_eq!(err.to_string(), "parse error at 2: unexpected end of expression");
    }

    #[test]
    fn compiled_expression_is_reusable() {
        let e = Expression::compile("d * 2").unwrap();
        let cloned = e.clone();
        assert_eq!(e.evaluate(&json!({"d": 2})).unwrap(), json!(4));
        assert_eq!(cloned.evaluate(&json!({"d": 5})).unwrap(), json!(10));
        assert_eq!(cloned.source(), "d * 2");
    }
}
