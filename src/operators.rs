//! Binary and unary operator dispatch over runtime values
//!
//! Numeric work is delegated to [`crate::numeric`]; this module adds the
//! text/sequence overloads, comparisons and membership.

use std::cmp::Ordering;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::error::{EvalResult, RuntimeError};
use crate::numeric::{self, ArithOp, Number};
use crate::value::{self, Value};

/// Evaluate `left op right` on already evaluated operands
///
/// `and`/`or` are accepted for completeness, but the evaluator short-circuits
/// them before both sides are computed.
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Multiply => multiply(left, right),
        BinaryOperator::Subtract => numeric_only(op, ArithOp::Sub, left, right),
        BinaryOperator::Divide => numeric_only(op, ArithOp::Div, left, right),
        BinaryOperator::FloorDiv => numeric_only(op, ArithOp::FloorDiv, left, right),
        BinaryOperator::Modulo => numeric_only(op, ArithOp::Mod, left, right),
        BinaryOperator::Power => numeric_only(op, ArithOp::Pow, left, right),

        BinaryOperator::Equal => Ok(Value::Bool(left.equals(right))),
        BinaryOperator::NotEqual => Ok(Value::Bool(!left.equals(right))),

        BinaryOperator::LessThan => ordered(op, left, right, Ordering::is_lt),
        BinaryOperator::LessThanOrEqual => ordered(op, left, right, Ordering::is_le),
        BinaryOperator::GreaterThan => ordered(op, left, right, Ordering::is_gt),
        BinaryOperator::GreaterThanOrEqual => ordered(op, left, right, Ordering::is_ge),

        BinaryOperator::In => Ok(Value::Bool(right.contains(left)?)),
        BinaryOperator::NotIn => Ok(Value::Bool(!right.contains(left)?)),

        BinaryOperator::And => Ok(if left.truthy() {
            right.clone()
        } else {
            left.clone()
        }),
        BinaryOperator::Or => Ok(if left.truthy() {
            left.clone()
        } else {
            right.clone()
        }),
    }
}

/// Evaluate a unary operator
pub fn unary(op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOperator::Negate => match Number::from_value(operand) {
            Some(n) => Ok(numeric::negate(n)?.into_value()),
            None => Err(bad_unary("-", operand)),
        },
        UnaryOperator::Plus => match Number::from_value(operand) {
            Some(n) => Ok(n.into_value()),
            None => Err(bad_unary("+", operand)),
        },
    }
}

/// Total order used by `<`-style operators, `min` and `max`
///
/// `Ok(None)` means the operands are comparable but unordered (NaN).
pub fn compare(left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
    if let (Some(l), Some(r)) = (Number::from_value(left), Number::from_value(right)) {
        return Ok(l.compare(r));
    }
    match (left, right) {
        (Value::Text(l), Value::Text(r)) => Ok(Some(l.cmp(r))),
        _ => Err(RuntimeError::type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn ordered(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    test: fn(Ordering) -> bool,
) -> EvalResult<Value> {
    match compare(left, right) {
        Ok(ordering) => Ok(Value::Bool(ordering.is_some_and(test))),
        Err(_) => Err(RuntimeError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Text(l), Value::Text(r)) => {
            let mut joined = String::with_capacity(l.len() + r.len());
            joined.push_str(l);
            joined.push_str(r);
            Ok(Value::text(joined))
        }
        (Value::Sequence(l), Value::Sequence(r)) => {
            let mut items = l.borrow().clone();
            items.extend(r.borrow().iter().cloned());
            Ok(Value::sequence(items))
        }
        _ => numeric_only(BinaryOperator::Add, ArithOp::Add, left, right),
    }
}

fn multiply(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Sequence(items), count) | (count, Value::Sequence(items)) => {
            let n = repeat_count(count, "sequence")?;
            let repeated = value::repeat(&items.borrow(), n)?;
            Ok(Value::sequence(repeated))
        }
        (Value::Text(s), count) | (count, Value::Text(s)) => {
            let n = repeat_count(count, "sequence")?;
            Ok(Value::text(value::repeat_text(s, n)?))
        }
        _ => numeric_only(BinaryOperator::Multiply, ArithOp::Mul, left, right),
    }
}

fn repeat_count(count: &Value, what: &str) -> EvalResult<i64> {
    count.as_index().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "can't multiply {} by non-int of type '{}'",
            what,
            count.type_name()
        ))
    })
}

fn numeric_only(
    op: BinaryOperator,
    arith: ArithOp,
    left: &Value,
    right: &Value,
) -> EvalResult<Value> {
    match (Number::from_value(left), Number::from_value(right)) {
        (Some(l), Some(r)) => Ok(numeric::arithmetic(arith, l, r)?.into_value()),
        _ => Err(RuntimeError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn bad_unary(symbol: &str, operand: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "bad operand type for unary {}: '{}'",
        symbol,
        operand.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> Value {
        Value::sequence(values.iter().map(|&i| Value::Int(i)).collect())
    }

    #[test]
    fn test_sequence_repetition_either_side() {
        let seq = ints(&[1, 2, 3]);
        let doubled = binary(BinaryOperator::Multiply, &seq, &Value::Int(2)).unwrap();
        assert_eq!(doubled.stringify(), "[1, 2, 3, 1, 2, 3]");
        let doubled = binary(BinaryOperator::Multiply, &Value::Int(2), &seq).unwrap();
        assert_eq!(doubled.len().unwrap(), 6);
        let err = binary(BinaryOperator::Multiply, &seq, &Value::Float(2.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_huge_repetition_is_an_error() {
        let count = Value::Int(1 << 62);
        let too_big = |err: RuntimeError| {
            matches!(err.kind, ErrorKind::MemoryError | ErrorKind::OverflowError)
        };
        let err = binary(BinaryOperator::Multiply, &ints(&[1]), &count).unwrap_err();
        assert!(too_big(err));
        let err = binary(BinaryOperator::Multiply, &Value::text("ab"), &count).unwrap_err();
        assert!(too_big(err));
        let err = binary(BinaryOperator::Multiply, &count, &Value::text("ab")).unwrap_err();
        assert!(too_big(err));
    }

    #[test]
    fn test_text_repetition() {
        let s = binary(BinaryOperator::Multiply, &Value::text("ab"), &Value::Int(3)).unwrap();
        assert_eq!(s, Value::text("ababab"));
        let s = binary(BinaryOperator::Multiply, &Value::text("ab"), &Value::Int(-1)).unwrap();
        assert_eq!(s, Value::text(""));
    }

    #[test]
    fn test_concatenation_makes_new_sequence() {
        let a = ints(&[1]);
        let b = ints(&[2]);
        let c = binary(BinaryOperator::Add, &a, &b).unwrap();
        c.index_set(&Value::Int(0), Value::Int(9)).unwrap();
        assert_eq!(a.stringify(), "[1]");
        assert_eq!(c.stringify(), "[9, 2]");
        let s = binary(BinaryOperator::Add, &Value::text("ab"), &Value::text("cd")).unwrap();
        assert_eq!(s, Value::text("abcd"));
    }

    #[test]
    fn test_mixed_type_errors_name_operator() {
        let err = binary(BinaryOperator::Add, &Value::Int(1), &Value::text("x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(
            err.message,
            "unsupported operand type(s) for +: 'int' and 'str'"
        );
        let err = binary(BinaryOperator::LessThan, &Value::Int(1), &Value::None).unwrap_err();
        assert!(err.message.starts_with("'<' not supported"));
    }

    #[test]
    fn test_comparisons() {
        let t = |op, l: Value, r: Value| binary(op, &l, &r).unwrap();
        assert_eq!(t(BinaryOperator::LessThan, Value::Int(1), Value::Float(1.5)), Value::Bool(true));
        assert_eq!(t(BinaryOperator::GreaterThanOrEqual, Value::text("b"), Value::text("a")), Value::Bool(true));
        assert_eq!(t(BinaryOperator::LessThan, Value::Float(f64::NAN), Value::Int(1)), Value::Bool(false));
        assert_eq!(t(BinaryOperator::NotEqual, Value::Int(1), Value::text("1")), Value::Bool(true));
    }

    #[test]
    fn test_membership() {
        let seq = ints(&[1, 2]);
        assert_eq!(binary(BinaryOperator::In, &Value::Int(2), &seq).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::NotIn, &Value::Int(3), &seq).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOperator::Negate, &Value::Float(1.9)).unwrap(), Value::Float(-1.9));
        assert_eq!(unary(UnaryOperator::Negate, &Value::Bool(true)).unwrap(), Value::Int(-1));
        assert_eq!(unary(UnaryOperator::Not, &ints(&[])).unwrap(), Value::Bool(true));
        assert!(unary(UnaryOperator::Negate, &Value::text("x")).is_err());
    }
}
