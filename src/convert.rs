//! Conversion between `serde_json` values and script values.

use std::path::Path;

use crate::value::{Context, Value};

/// Reads a JSON document from disk as a root context.
pub fn load_data_file(path: &Path) -> Result<Context, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| format!("JSON parse error: {}", e))?;
    Ok(json_to_context(json))
}

pub fn json_to_value(json_val: serde_json::Value) -> Value {
    match json_val {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(json_number) => {
            let numeric_value = json_number.as_f64().unwrap_or(0.0);
            let is_float = !(json_number.is_i64() || json_number.is_u64());
            Value::Number(numeric_value, is_float)
        }
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(array) => Value::Context(Context::from_values(array.into_iter().map(json_to_value))),
        serde_json::Value::Object(object) => {
            let map = object.into_iter().map(|(k, v)| (k, json_to_value(v))).collect();
            Value::Context(Context::from_map(map))
        }
    }
}

/// A JSON object seeding a root context. Non-object JSON is stored under
/// the key `data`.
pub fn json_to_context(json_val: serde_json::Value) -> Context {
    match json_to_value(json_val) {
        Value::Context(ctx) if !ctx.is_array() => ctx,
        other => {
            let ctx = Context::new();
            ctx.set("data", other);
            ctx
        }
    }
}

/// Values with no JSON shape (functions, classes, host objects) become
/// their display text.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    value_to_json_at(value, 0)
}

fn value_to_json_at(value: &Value, depth: usize) -> serde_json::Value {
    const MAX_DEPTH: usize = 64;
    if depth > MAX_DEPTH {
        return serde_json::Value::Null;
    }
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n, is_float) if !is_float && n.fract() == 0.0 && n.abs() < 9.0e15 => {
            serde_json::Value::from(*n as i64)
        }
        Value::Number(n, _) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Context(ctx) if ctx.is_array() => {
            serde_json::Value::Array(ctx.values().iter().map(|v| value_to_json_at(v, depth + 1)).collect())
        }
        Value::Context(ctx) => object(&ctx.entries(), depth),
        Value::Instance(instance) => object(&instance.fields.entries(), depth),
        other => serde_json::Value::String(other.to_string()),
    }
}

fn object(entries: &[(String, Value)], depth: usize) -> serde_json::Value {
    serde_json::Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), value_to_json_at(v, depth + 1)))
            .collect(),
    )
}
