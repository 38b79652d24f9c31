use std::sync::Arc;

use super::super::error::InterpreterError;
use super::{require_args, with_string};
use crate::value::{Context, Value};

pub fn builtin_split(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 2, "split");
    match (&args[0], &args[1]) {
        (Value::String(s), Value::String(delim)) => {
            let parts = s.split(delim.as_ref()).map(Value::string);
            Ok(Value::Context(Context::from_values(parts)))
        }
        (Value::Null, _) => Ok(Value::Null),
        _ => Err(InterpreterError::type_error("split requires string and delimiter")),
    }
}

/// `join(list, sep)`; the separator defaults to `,`.
pub fn builtin_join(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "join");
    let delim = match args.get(1) {
        Some(Value::Null) | None => ",".to_string(),
        Some(sep) => sep.as_str().map_or_else(|| sep.render(), str::to_string),
    };
    match &args[0] {
        Value::Context(items) => {
            let parts: Vec<String> = items.values().iter().map(Value::render).collect();
            Ok(Value::from(parts.join(&delim)))
        }
        Value::Null => Ok(Value::Null),
        _ => Err(InterpreterError::type_error("join requires array")),
    }
}

pub fn builtin_trim(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "trim");
    with_string!(args, "trim", |s: &Arc<str>| Ok(Value::string(s.trim())))
}

pub fn builtin_upper(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "upper");
    with_string!(args, "upper", |s: &Arc<str>| Ok(Value::from(s.to_uppercase())))
}

pub fn builtin_lower(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "lower");
    with_string!(args, "lower", |s: &Arc<str>| Ok(Value::from(s.to_lowercase())))
}

pub fn builtin_replace(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 3, "replace");
    match (&args[0], &args[1], &args[2]) {
        (Value::String(s), Value::String(from), to) => Ok(Value::from(s.replace(from.as_ref(), &to.render()))),
        (Value::Null, _, _) => Ok(Value::Null),
        _ => Err(InterpreterError::type_error("replace requires string and pattern")),
    }
}

/// Characters in a string, entries in a map or array.
pub fn builtin_len(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "len");
    match &args[0] {
        Value::Context(ctx) => Ok(Value::int(ctx.len() as i64)),
        Value::Instance(instance) => Ok(Value::int(instance.fields.len() as i64)),
        _ => with_string!(args, "len", |s: &Arc<str>| Ok(Value::int(s.chars().count() as i64))),
    }
}
