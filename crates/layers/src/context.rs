//! The dictionary every layer expression is evaluated against.

use serde_json::{Map, Value};

/// Extra values exposed at the top level of every context, such as the
/// drill-down `shape` and `bounds`.
pub type ExtraContext = Map<String, Value>;

/// `{ ...extra, d: record, i: index }`. An absent index is `null`.
pub fn expression_context(record: &Value, index: Option<usize>, extra: &ExtraContext) -> Value {
    let mut ctx = extra.clone();
    ctx.insert("d".to_string(), record.clone());
    ctx.insert(
        "i".to_string(),
        index.map(Value::from).unwrap_or(Value::Null),
    );
    Value::Object(ctx)
}

/// Context with a looked-up `value` alongside the record.
pub fn with_value(mut ctx: Value, value: Value) -> Value {
    if let Value::Object(map) = &mut ctx {
        map.insert("value".to_string(), value);
    }
    ctx
}

/// String key used for id lookups, so `250` and `"250"` address the same
/// record.
pub fn lookup_key(id: &Value) -> Option<String> {
    match id {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(expressions::to_display_string(other)),
    }
}
