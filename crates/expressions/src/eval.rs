//! Tree-walking evaluation over `serde_json::Value` contexts.
//!
//! Values read out of the context (identifiers and member accesses) are
//! coerced to text when they feed a `+` or an array literal; literals keep
//! their type. `+` always produces text: the numeric sum when both sides are
//! number literals or computed numbers, the concatenation otherwise.

use serde_json::{Map, Number, Value};

use foundation::math::format_number;

use crate::ExprError;
use crate::parser::{BinaryOp, Expr, UnaryOp};

/// An evaluated value plus whether it was read out of the context.
struct Evaluated {
    value: Value,
    from_context: bool,
}

impl Evaluated {
    fn computed(value: Value) -> Self {
        Self {
            value,
            from_context: false,
        }
    }

    fn coerced(self) -> Value {
        if self.from_context {
            Value::String(to_display_string(&self.value))
        } else {
            self.value
        }
    }
}

pub fn evaluate(expr: &Expr, ctx: &Value) -> Result<Value, ExprError> {
    Ok(eval(expr, ctx)?.value)
}

fn eval(expr: &Expr, ctx: &Value) -> Result<Evaluated, ExprError> {
    Ok(match expr {
        Expr::Literal(v) => Evaluated::computed(v.clone()),
        Expr::Ident(name) => Evaluated {
            value: ctx.get(name).cloned().unwrap_or(Value::Null),
            from_context: true,
        },
        Expr::Member(object, key) => {
            let object = eval(object, ctx)?.value;
            let key = eval(key, ctx)?.value;
            Evaluated {
                value: member(&object, &key),
                from_context: true,
            }
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ctx)?.coerced());
            }
            Evaluated::computed(Value::Array(out))
        }
        Expr::Object(entries) => {
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), eval(v, ctx)?.value);
            }
            Evaluated::computed(Value::Object(out))
        }
        Expr::Unary(op, operand) => {
            let v = eval(operand, ctx)?.value;
            Evaluated::computed(match op {
                UnaryOp::Neg => number_value(-to_number(&v)),
                UnaryOp::Plus => number_value(to_number(&v)),
                UnaryOp::Not => Value::Bool(!truthy(&v)),
            })
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            if truthy(&l.value) { eval(rhs, ctx)? } else { l }
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            if truthy(&l.value) { l } else { eval(rhs, ctx)? }
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            Evaluated::computed(binary(*op, l, r))
        }
        Expr::Conditional(cond, then, otherwise) => {
            if truthy(&eval(cond, ctx)?.value) {
                eval(then, ctx)?
            } else {
                eval(otherwise, ctx)?
            }
        }
        Expr::Call(callee, args) => {
            let name = callee_name(callee).ok_or_else(|| {
                ExprError::Eval("only named functions can be called".to_string())
            })?;
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval(a, ctx)?.value);
            }
            Evaluated::computed(call(&name, &values)?)
        }
    })
}

fn binary(op: BinaryOp, l: Evaluated, r: Evaluated) -> Value {
    match op {
        BinaryOp::Add => {
            let numeric = !l.from_context
                && !r.from_context
                && l.value.is_number()
                && r.value.is_number();
            if numeric {
                let sum = to_number(&l.value) + to_number(&r.value);
                Value::String(format_number(sum))
            } else {
                let mut s = to_display_string(&l.value);
                s.push_str(&to_display_string(&r.value));
                Value::String(s)
            }
        }
        BinaryOp::Sub => number_value(to_number(&l.value) - to_number(&r.value)),
        BinaryOp::Mul => number_value(to_number(&l.value) * to_number(&r.value)),
        BinaryOp::Div => number_value(to_number(&l.value) / to_number(&r.value)),
        BinaryOp::Rem => number_value(to_number(&l.value) % to_number(&r.value)),
        BinaryOp::Lt => Value::Bool(compare(&l.value, &r.value, |o| o.is_lt())),
        BinaryOp::Le => Value::Bool(compare(&l.value, &r.value, |o| o.is_le())),
        BinaryOp::Gt => Value::Bool(compare(&l.value, &r.value, |o| o.is_gt())),
        BinaryOp::Ge => Value::Bool(compare(&l.value, &r.value, |o| o.is_ge())),
        BinaryOp::LooseEq => Value::Bool(loose_eq(&l.value, &r.value)),
        BinaryOp::LooseNe => Value::Bool(!loose_eq(&l.value, &r.value)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(&l.value, &r.value)),
        BinaryOp::StrictNe => Value::Bool(!strict_eq(&l.value, &r.value)),
        // Short-circuit operators are handled before operands are evaluated.
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}

fn compare(l: &Value, r: &Value, pick: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return pick(a.cmp(b));
    }
    to_number(l).partial_cmp(&to_number(r)).is_some_and(pick)
}

fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(_), Value::Number(_)) => to_number(l) == to_number(r),
        _ => l == r,
    }
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            l == r
        }
        _ => to_number(l) == to_number(r),
    }
}

fn member(object: &Value, key: &Value) -> Value {
    let name = to_display_string(key);
    match object {
        Value::Object(map) => map.get(&name).cloned().unwrap_or(Value::Null),
        Value::Array(items) if name == "length" => Value::from(items.len()),
        Value::Array(items) => name
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null),
        Value::String(s) if name == "length" => Value::from(s.chars().count()),
        Value::String(s) => name
            .parse::<usize>()
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn callee_name(callee: &Expr) -> Option<String> {
    match callee {
        Expr::Ident(name) => Some(name.clone()),
        Expr::Member(object, key) => {
            let Expr::Literal(Value::String(key)) = key.as_ref() else {
                return None;
            };
            Some(format!("{}.{key}", callee_name(object)?))
        }
        _ => None,
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let first = args.first().unwrap_or(&Value::Null);
    let unary = |f: fn(f64) -> f64| number_value(f(to_number(first)));
    Ok(match name {
        "parseFloat" => number_value(parse_float(first)),
        "parseInt" => number_value(parse_int_prefix(&to_display_string(first))),
        "Number" => number_value(to_number(first)),
        "String" => Value::String(to_display_string(first)),
        "isNaN" => Value::Bool(to_number(first).is_nan()),
        // Halves round toward +infinity.
        "Math.round" => unary(|x| (x + 0.5).floor()),
        "Math.floor" => unary(f64::floor),
        "Math.ceil" => unary(f64::ceil),
        "Math.abs" => unary(f64::abs),
        "Math.sqrt" => unary(f64::sqrt),
        "Math.min" => number_value(args.iter().map(to_number).fold(f64::INFINITY, nan_min)),
        "Math.max" => number_value(args.iter().map(to_number).fold(f64::NEG_INFINITY, nan_max)),
        other => return Err(ExprError::Eval(format!("unknown function `{other}`"))),
    })
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
}

/// `parseFloat` of a value's text form: the longest leading decimal literal,
/// NaN when there is none.
pub fn parse_float(v: &Value) -> f64 {
    parse_float_prefix(&to_display_string(v))
}

/// Longest leading decimal literal of `s` (after leading whitespace).
fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut j = end + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > end + 1 || has_digits {
            has_digits |= j > end + 1;
            end = j;
        }
    }
    if !has_digits {
        return if s[digits_start..].starts_with("Infinity") {
            if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY }
        } else {
            f64::NAN
        };
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut j = end + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            end = j;
        }
    }
    s[..end].trim_end_matches('.').parse().unwrap_or(f64::NAN)
}

fn parse_int_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == start {
        return f64::NAN;
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

/// Numeric coercion: numbers as-is, numeric text parsed, booleans as 0/1,
/// everything else NaN. Blank text is 0.
pub fn to_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return 0.0;
            }
            match t {
                "Infinity" | "+Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                _ if t.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
                    f64::NAN
                }
                _ => t.parse().unwrap_or(f64::NAN),
            }
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Text form used for concatenation and rendered labels.
pub fn to_display_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| n.to_string()),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|i| match i {
                Value::Null => String::new(),
                other => to_display_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0 && !x.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// JSON value for a number. Integral values become integers; NaN and
/// infinities, which JSON cannot hold, become `null`.
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
