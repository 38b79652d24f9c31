//! Built-in functions.
//!
//! Builtins sit in the call cascade after script functions and classes.
//! A call with a receiver passes the receiver as the first argument, so
//! `name.upper()` and `upper(name)` are the same call.
//!
//! - **String**: `len`, `upper`, `lower`, `trim`, `split`, `join`, `replace`
//! - **Math**: `floor`, `ceil`, `abs`, `round`, `min`, `max`
//! - **Misc**: `print`, `str`, `num`, `int`, `typeof`, `keys`, `sleep`
//!
//! The `context` module holds the ambient operations tried last in the
//! cascade.

pub mod context;
mod math;
mod misc;
mod string;

use crate::value::{format_number, Value};
use super::error::InterpreterError;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, InterpreterError>;

pub struct Builtin {
    pub name: &'static str,
    /// Calls with fewer arguments fall through to the next strategy.
    pub min_args: usize,
    pub call: BuiltinFn,
}

macro_rules! builtin {
    ($name:literal, $min:literal, $call:path) => {
        Builtin { name: $name, min_args: $min, call: $call }
    };
}

pub static BUILTINS: &[Builtin] = &[
    builtin!("print", 0, misc::builtin_print),
    builtin!("len", 1, string::builtin_len),
    builtin!("str", 1, misc::builtin_str),
    builtin!("num", 1, misc::builtin_num),
    builtin!("int", 1, misc::builtin_int),
    builtin!("upper", 1, string::builtin_upper),
    builtin!("lower", 1, string::builtin_lower),
    builtin!("trim", 1, string::builtin_trim),
    builtin!("split", 2, string::builtin_split),
    builtin!("join", 1, string::builtin_join),
    builtin!("replace", 3, string::builtin_replace),
    builtin!("typeof", 1, misc::builtin_typeof),
    builtin!("keys", 1, misc::builtin_keys),
    builtin!("sleep", 1, misc::builtin_sleep),
    builtin!("floor", 1, math::builtin_floor),
    builtin!("ceil", 1, math::builtin_ceil),
    builtin!("abs", 1, math::builtin_abs),
    builtin!("round", 1, math::builtin_round),
    builtin!("min", 1, math::builtin_min),
    builtin!("max", 1, math::builtin_max),
];

/// Index of the builtin called `name`.
pub fn lookup(name: &str) -> Option<usize> {
    BUILTINS.iter().position(|b| b.name == name)
}

/// Text used as a map key: numbers without a fractional part lose it.
pub(crate) fn key_text(value: &Value) -> String {
    match value {
        Value::Number(n, is_float) => format_number(*n, *is_float),
        other => other.render(),
    }
}

macro_rules! require_args {
    ($args:expr, $n:expr, $name:expr) => {
        if $args.len() < $n {
            return Err(InterpreterError::invalid_operation(format!(
                "{} requires {} argument(s)",
                $name, $n
            )));
        }
    };
}

/// Runs `$body` on a string first argument. `null` passes through.
macro_rules! with_string {
    ($args:expr, $name:expr, $body:expr) => {
        match &$args[0] {
            Value::String(s) => $body(s),
            Value::Null => Ok(Value::Null),
            _ => Err(InterpreterError::type_error(format!("{} requires string", $name))),
        }
    };
}

/// Runs `$body` on a numeric first argument. `null` passes through.
macro_rules! with_number {
    ($args:expr, $name:expr, $body:expr) => {
        match &$args[0] {
            Value::Number(n, is_float) => $body(*n, *is_float),
            Value::Null => Ok(Value::Null),
            _ => Err(InterpreterError::type_error(format!("{} requires number", $name))),
        }
    };
}

pub(crate) use require_args;
pub(crate) use with_number;
pub(crate) use with_string;
