//! Mathematical built-in functions.

use super::super::error::InterpreterError;
use super::{require_args, with_number};
use crate::value::Value;

macro_rules! unary_math {
    ($name:ident, $op:ident) => {
        pub fn $name(args: &[Value]) -> Result<Value, InterpreterError> {
            require_args!(args, 1, stringify!($op));
            with_number!(args, stringify!($op), |n: f64, _| Ok(Value::Number(n.$op(), false)))
        }
    };
}

unary_math!(builtin_floor, floor);
unary_math!(builtin_ceil, ceil);
unary_math!(builtin_round, round);

pub fn builtin_abs(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "abs");
    with_number!(args, "abs", |n: f64, is_float: bool| Ok(Value::Number(n.abs(), is_float)))
}

/// Numbers among the arguments, or among the elements of a single array
/// argument.
fn numbers(args: &[Value]) -> Vec<(f64, bool)> {
    let values = match args {
        [Value::Context(items)] => items.values(),
        _ => args.to_vec(),
    };
    values
        .iter()
        .filter_map(|v| match v {
            Value::Number(n, is_float) => Some((*n, *is_float)),
            _ => None,
        })
        .collect()
}

fn extreme(args: &[Value], pick: fn(f64, f64) -> bool) -> Value {
    numbers(args)
        .into_iter()
        .reduce(|best, next| if pick(next.0, best.0) { next } else { best })
        .map(|(n, is_float)| Value::Number(n, is_float))
        .unwrap_or_default()
}

pub fn builtin_min(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "min");
    Ok(extreme(args, |a, b| a < b))
}

pub fn builtin_max(args: &[Value]) -> Result<Value, InterpreterError> {
    require_args!(args, 1, "max");
    Ok(extreme(args, |a, b| a > b))
}
