use std::sync::Arc;

use super::error::InterpreterError;
use crate::ast::{BinaryOp, UnaryOp};
use crate::value::{Context, Value};

/// Nesting depth after which contexts are compared by identity only.
const MAX_COMPARE_DEPTH: usize = 64;

/// Structural equality. Contexts compare entry by entry, callables and
/// handles by identity, numbers by value regardless of spelling.
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    equals_at(a, b, 0)
}

fn equals_at(a: &Value, b: &Value, depth: usize) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a, _), Value::Number(b, _)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Context(a), Value::Context(b)) => contexts_equal(a, b, depth),
        (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
        (Value::Future(a), Value::Future(b)) => a.ptr_eq(b),
        (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
        (Value::Exception(a), Value::Exception(b)) => a.to_string() == b.to_string(),
        _ => false,
    }
}

fn contexts_equal(a: &Context, b: &Context, depth: usize) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    if depth >= MAX_COMPARE_DEPTH || a.is_array() != b.is_array() {
        return false;
    }
    let (a, b) = (a.read(), b.read());
    if a.len() != b.len() {
        return false;
    }
    let equal = a.iter().all(|(key, va)| match b.get(key) {
        Some(vb) => equals_at(va, vb, depth + 1),
        None => false,
    });
    equal
}

/// Numeric view of an operand; `Null` counts as zero.
fn numeric(value: &Value) -> Option<(f64, bool)> {
    match value {
        Value::Number(n, is_float) => Some((*n, *is_float)),
        Value::Null => Some((0.0, false)),
        _ => None,
    }
}

fn number(n: f64, is_float: bool) -> Value {
    Value::Number(n, is_float || n.fract() != 0.0)
}

fn add(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Number(a, fa), Value::Number(b, fb)) => number(a + b, fa || fb),
        (Value::String(a), other) => Value::from(format!("{}{}", a, other.render())),
        (other, Value::String(b)) => Value::from(format!("{}{}", other.render(), b)),
        (Value::Null, other) | (other, Value::Null) => other,
        (Value::Context(a), Value::Context(b)) if a.is_array() && b.is_array() => {
            Value::Context(Context::from_values(a.values().into_iter().chain(b.values())))
        }
        _ => Value::Null,
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Number(a, _), Value::Number(b, _)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Applies a non-short-circuit binary operator. Operand combinations the
/// operator has no meaning for produce `Null`.
pub fn binary_op(op: BinaryOp, left: Value, right: Value) -> Result<Value, InterpreterError> {
    use std::cmp::Ordering::*;

    let value = match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let (Some((a, fa)), Some((b, fb))) = (numeric(&left), numeric(&right)) else {
                return Ok(Value::Null);
            };
            match op {
                BinaryOp::Sub => number(a - b, fa || fb),
                BinaryOp::Mul => number(a * b, fa || fb),
                BinaryOp::Div if b == 0.0 => return Err(InterpreterError::DivisionByZero { span: Default::default() }),
                BinaryOp::Div => number(a / b, fa || fb),
                BinaryOp::Mod if b == 0.0 => return Err(InterpreterError::DivisionByZero { span: Default::default() }),
                _ => number(a % b, fa || fb),
            }
        }
        BinaryOp::Eq => Value::Bool(deep_equals(&left, &right)),
        BinaryOp::NotEq => Value::Bool(!deep_equals(&left, &right)),
        BinaryOp::Less => compare(&left, &right).map_or(Value::Null, |o| Value::Bool(o == Less)),
        BinaryOp::LessEq => compare(&left, &right).map_or(Value::Null, |o| Value::Bool(o != Greater)),
        BinaryOp::Greater => compare(&left, &right).map_or(Value::Null, |o| Value::Bool(o == Greater)),
        BinaryOp::GreaterEq => compare(&left, &right).map_or(Value::Null, |o| Value::Bool(o != Less)),
        BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
        BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
    };
    Ok(value)
}

pub fn unary_op(op: UnaryOp, value: Value) -> Value {
    match (op, value) {
        (UnaryOp::Not, value) => Value::Bool(!value.is_truthy()),
        (UnaryOp::Neg, Value::Number(n, is_float)) => Value::Number(-n, is_float),
        (UnaryOp::Neg, _) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(op: BinaryOp, a: Value, b: Value) -> Value {
        binary_op(op, a, b).unwrap()
    }

    #[test]
    fn test_null_is_additive_identity() {
        assert_eq!(op(BinaryOp::Add, Value::Null, Value::int(4)), Value::int(4));
        assert_eq!(op(BinaryOp::Sub, Value::int(4), Value::Null), Value::int(4));
    }

    #[test]
    fn test_string_concatenation_renders_operand() {
        assert_eq!(op(BinaryOp::Add, Value::string("n="), Value::int(3)), Value::string("n=3"));
        assert_eq!(op(BinaryOp::Add, Value::string("a"), Value::Null), Value::string("a"));
    }

    #[test]
    fn test_division_by_zero_raises() {
        assert!(matches!(
            binary_op(BinaryOp::Div, Value::int(1), Value::int(0)),
            Err(InterpreterError::DivisionByZero { .. })
        ));
        assert!(binary_op(BinaryOp::Mod, Value::int(1), Value::Null).is_err());
    }

    #[test]
    fn test_integer_division_keeps_int_when_exact() {
        assert_eq!(op(BinaryOp::Div, Value::int(9), Value::int(3)).to_string(), "3");
        assert_eq!(op(BinaryOp::Div, Value::int(7), Value::int(2)).to_string(), "3.5");
    }

    #[test]
    fn test_unsupported_combination_is_null() {
        assert_eq!(op(BinaryOp::Mul, Value::string("a"), Value::int(2)), Value::Null);
        assert_eq!(op(BinaryOp::Less, Value::Bool(true), Value::int(2)), Value::Null);
    }

    #[test]
    fn test_contexts_compare_structurally() {
        let a = Context::from_values([Value::int(1), Value::string("x")]);
        let b = Context::from_values([Value::int(1), Value::string("x")]);
        assert!(deep_equals(&Value::Context(a.clone()), &Value::Context(b)));
        let c = Context::new();
        c.set("0", Value::int(1));
        c.set("1", Value::string("x"));
        assert!(!deep_equals(&Value::Context(a), &Value::Context(c)));
    }

    #[test]
    fn test_self_referencing_context_terminates() {
        let a = Context::new();
        a.set("me", Value::Context(a.clone()));
        let b = Context::new();
        b.set("me", Value::Context(b.clone()));
        assert!(!deep_equals(&Value::Context(a), &Value::Context(b)));
    }
}
