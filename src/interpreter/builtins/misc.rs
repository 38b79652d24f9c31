//! Output, conversion and type built-in functions.

use std::time::Duration;

use super::super::error::InterpreterError;
use super::require_args;
use crate::value::{Context, Value};

pub fn builtin_print(args: &[Value]) -> Result<Value, InterpreterError> {
    use std::io::Write;
    let output: Vec<String> = args.iter().map(Value::render).collect();
    println!("{}", output.join(" "));
    std::io::stdout().flush().ok();
    Ok(Value::Null)
}

pub fn builtin_str(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "str");
    Ok(Value::from(args[0].render()))
}

fn to_number(value: &Value) -> Option<(f64, bool)> {
    match value {
        Value::Number(n, is_float) => Some((*n, *is_float)),
        Value::Bool(b) => Some((if *b { 1.0 } else { 0.0 }, false)),
        Value::String(s) => {
            let s = s.trim();
            let n: f64 = s.parse().ok()?;
            Some((n, s.contains(['.', 'e', 'E'])))
        }
        _ => None,
    }
}

/// Number from a number, bool or numeric string; `null` otherwise.
pub fn builtin_num(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "num");
    Ok(to_number(&args[0])
        .map(|(n, is_float)| Value::Number(n, is_float))
        .unwrap_or_default())
}

pub fn builtin_int(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "int");
    Ok(to_number(&args[0])
        .map(|(n, _)| Value::Number(n.trunc(), false))
        .unwrap_or_default())
}

pub fn builtin_typeof(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "typeof");
    Ok(Value::string(args[0].type_name()))
}

pub fn builtin_keys(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "keys");
    let keys = match &args[0] {
        Value::Context(ctx) => ctx.keys(),
        Value::Instance(instance) => instance.fields.keys(),
        _ => return Ok(Value::Null),
    };
    Ok(Value::Context(Context::from_values(keys.into_iter().map(Value::from))))
}

/// Blocks the calling thread for the given number of milliseconds.
pub fn builtin_sleep(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "sleep");
    match &args[0] {
        Value::Number(ms, _) if *ms > 0.0 => std::thread::sleep(Duration::from_millis(*ms as u64)),
        Value::Number(..) | Value::Null => {}
        other => {
            return Err(InterpreterError::type_error(format!(
                "sleep requires number, got {}",
                other.type_name()
            )))
        }
    }
    Ok(Value::Null)
}
