use serde_json::Value;

use crate::ExprError;
use crate::lexer::{Spanned, Token};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    And,
    Or,
}

impl BinaryOp {
    fn from_punct(p: &str) -> Option<Self> {
        Some(match p {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::LooseEq,
            "!=" => BinaryOp::LooseNe,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNe,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    fn binding_power(self) -> u8 {
        match self {
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::LooseEq | BinaryOp::LooseNe | BinaryOp::StrictEq | BinaryOp::StrictNe => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 7,
        }
    }
}

const TERNARY_BP: u8 = 1;
const UNARY_BP: u8 = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    /// `object.name` or `object[expr]`.
    Member(Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
}

pub fn parse(tokens: &[Spanned], source_len: usize) -> Result<Expr, ExprError> {
    let mut p = Parser {
        tokens,
        pos: 0,
        source_len,
    };
    let expr = p.expression(0)?;
    if let Some(t) = p.peek() {
        return Err(ExprError::Parse {
            position: t.position,
            message: format!("unexpected {}", describe(&t.token)),
        });
    }
    Ok(expr)
}

fn describe(t: &Token) -> String {
    match t {
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string \"{s}\""),
        Token::Ident(s) => format!("identifier `{s}`"),
        Token::Punct(p) => format!("`{p}`"),
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    source_len: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Spanned { token: Token::Punct(q), .. }) if *q == p)
    }

    fn next(&mut self) -> Result<&Spanned, ExprError> {
        let tokens = self.tokens;
        let t = tokens.get(self.pos).ok_or(ExprError::Parse {
            position: self.source_len,
            message: "unexpected end of expression".to_string(),
        })?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, p: &str) -> Result<(), ExprError> {
        let t = self.next()?;
        match &t.token {
            Token::Punct(q) if *q == p => Ok(()),
            other => Err(ExprError::Parse {
                position: t.position,
                message: format!("expected `{p}`, found {}", describe(other)),
            }),
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<Expr, ExprError> {
        let mut lhs = self.prefix()?;

        loop {
            let Some(Spanned {
                token: Token::Punct(p),
                ..
            }) = self.peek()
            else {
                break;
            };
            let p = *p;

            if p == "?" {
                if TERNARY_BP < min_bp {
                    break;
                }
                self.pos += 1;
                let then = self.expression(0)?;
                self.expect(":")?;
                // Right associative: `a ? b : c ? d : e`.
                let otherwise = self.expression(TERNARY_BP)?;
                lhs = Expr::Conditional(Box::new(lhs), Box::new(then), Box::new(otherwise));
                continue;
            }

            let Some(op) = BinaryOp::from_punct(p) else {
                break;
            };
            let bp = op.binding_power();
            if bp <= min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, ExprError> {
        let t = self.next()?.clone();
        let expr = match t.token {
            Token::Number(n) => Expr::Literal(crate::eval::number_value(n)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            },
            Token::Punct("(") => {
                let inner = self.expression(0)?;
                self.expect(")")?;
                inner
            }
            Token::Punct("[") => Expr::Array(self.list("]")?),
            Token::Punct("{") => self.object()?,
            Token::Punct("-") => Expr::Unary(UnaryOp::Neg, Box::new(self.expression(UNARY_BP)?)),
            Token::Punct("+") => Expr::Unary(UnaryOp::Plus, Box::new(self.expression(UNARY_BP)?)),
            Token::Punct("!") => Expr::Unary(UnaryOp::Not, Box::new(self.expression(UNARY_BP)?)),
            other => {
                return Err(ExprError::Parse {
                    position: t.position,
                    message: format!("unexpected {}", describe(&other)),
                });
            }
        };
        self.postfix(expr)
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, ExprError> {
        loop {
            if self.peek_punct(".") {
                self.pos += 1;
                let t = self.next()?;
                let Token::Ident(name) = &t.token else {
                    return Err(ExprError::Parse {
                        position: t.position,
                        message: format!("expected property name, found {}", describe(&t.token)),
                    });
                };
                let key = Expr::Literal(Value::String(name.clone()));
                expr = Expr::Member(Box::new(expr), Box::new(key));
            } else if self.peek_punct("[") {
                self.pos += 1;
                let key = self.expression(0)?;
                self.expect("]")?;
                expr = Expr::Member(Box::new(expr), Box::new(key));
            } else if self.peek_punct("(") {
                self.pos += 1;
                let args = self.list(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to `close`; the opener is consumed.
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.peek_punct(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.expression(0)?);
            if self.peek_punct(",") {
                self.pos += 1;
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }

    fn object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        if self.peek_punct("}") {
            self.pos += 1;
            return Ok(Expr::Object(entries));
        }
        loop {
            let t = self.next()?;
            let key = match &t.token {
                Token::Ident(s) | Token::Str(s) => s.clone(),
                Token::Number(n) => foundation::math::format_number(*n),
                other => {
                    return Err(ExprError::Parse {
                        position: t.position,
                        message: format!("expected object key, found {}", describe(other)),
                    });
                }
            };
            self.expect(":")?;
            entries.push((key, self.expression(0)?));
            if self.peek_punct(",") {
                self.pos += 1;
                continue;
            }
            self.expect("}")?;
            return Ok(Expr::Object(entries));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ast(src: &str) -> Expr {
        parse(&tokenize(src).unwrap(), src.len()).unwrap()
    }

    fn ident(s: &str) -> Box<Expr> {
        Box::new(Expr::Ident(s.into()))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            ast("a + b * 2"),
            Expr::Binary(
                BinaryOp::Add,
                ident("a"),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    ident("b"),
                    Box::new(Expr::Literal(json!(2)))
                ))
            )
        );
    }

    #[test]
    fn member_chains_and_calls() {
        assert_eq!(
            ast("Math.round(d['v'])"),
            Expr::Call(
                Box::new(Expr::Member(
                    ident("Math"),
                    Box::new(Expr::Literal(json!("round")))
                )),
                vec![Expr::Member(ident("d"), Box::new(Expr::Literal(json!("v"))))]
            )
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        let Expr::Conditional(_, _, otherwise) = ast("a ? 1 : b ? 2 : 3") else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn object_literals() {
        assert_eq!(
            ast("{label: d, 'x': 1}"),
            Expr::Object(vec![
                ("label".into(), Expr::Ident("d".into())),
                ("x".into(), Expr::Literal(json!(1))),
            ])
        );
    }

    #[test]
    fn rejects_trailing_tokens_and_truncation() {
        let src = "1 2";
        let err = parse(&tokenize(src).unwrap(), src.len()).unwrap_err();
        assert!(matches!(err, ExprError::Parse { position: 2, .. }));

        let src = "(1 + ";
        let err = parse(&tokenize(src).unwrap(), src.len()).unwrap_err();
        assert!(matches!(err, ExprError::Parse { position: 5, .. }));
    }
}
