//! Ambient operations on a map: the last step of the call cascade.
//!
//! `list.push(4)` or a bare `count()` land here when nothing else claims
//! the name. Bare calls act on the current frame's scope.

use super::super::error::InterpreterError;
use super::key_text;
use crate::interpreter::value_utils::deep_equals;
use crate::value::{Context, Value};

/// Runs the ambient operation `name` on `scope`. `None` when `name` is not
/// one.
pub fn ambient(name: &str, scope: &Context, args: &[Value]) -> Option<Result<Value, InterpreterError>> {
    let value = match name {
        "count" => Value::int(scope.len() as i64),
        "keys" => Value::Context(Context::from_values(scope.keys().into_iter().map(Value::from))),
        "values" => Value::Context(Context::from_values(scope.values())),
        "contains" => {
            let Some(needle) = args.first() else {
                return Some(Err(InterpreterError::invalid_operation("contains requires 1 argument(s)")));
            };
            // Arrays are searched by element, maps by key.
            let found = if scope.is_array() {
                scope.values().iter().any(|v| deep_equals(v, needle))
            } else {
                scope.contains_key(&key_text(needle))
            };
            Value::Bool(found)
        }
        "remove" => {
            let Some(key) = args.first() else {
                return Some(Err(InterpreterError::invalid_operation("remove requires 1 argument(s)")));
            };
            scope.remove(&key_text(key)).unwrap_or_default()
        }
        "push" => {
            for value in args {
                scope.push(value.clone());
            }
            Value::int(scope.len() as i64)
        }
        "clear" => {
            scope.clear();
            Value::Null
        }
        _ => return None,
    };
    Some(Ok(value))
}
