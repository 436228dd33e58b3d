//! Integer/float promotion and truncation
//!
//! Pure functions only. `Int ⊕ Int` stays integral except for true division;
//! a Float on either side promotes the other operand. `%` and `//` use floor
//! semantics so the remainder takes the divisor's sign.

use std::cmp::Ordering;

use crate::error::{EvalResult, RuntimeError};
use crate::value::Value;

/// Numeric view of a value; Bool participates as 0/1
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Arithmetic operators the coercion rules cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl Number {
    pub fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn numeric_eq(self, other: Number) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (Number::Int(a), Number::Float(b)) => compare_int_float(a, b),
            (Number::Float(a), Number::Int(b)) => compare_int_float(b, a).map(Ordering::reverse),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
        }
    }
}

/// Apply a binary arithmetic operator
pub fn arithmetic(op: ArithOp, left: Number, right: Number) -> EvalResult<Number> {
    match (left, right) {
        (Number::Int(l), Number::Int(r)) => int_arithmetic(op, l, r),
        (l, r) => float_arithmetic(op, l.as_f64(), r.as_f64()),
    }
}

fn overflow(op: ArithOp) -> RuntimeError {
    RuntimeError::overflow(format!("integer overflow in {:?}", op))
}

fn int_arithmetic(op: ArithOp, l: i64, r: i64) -> EvalResult<Number> {
    let result = match op {
        ArithOp::Add => l.checked_add(r),
        ArithOp::Sub => l.checked_sub(r),
        ArithOp::Mul => l.checked_mul(r),
        ArithOp::Div => {
            if r == 0 {
                return Err(RuntimeError::zero_division("division by zero"));
            }
            return Ok(Number::Float(l as f64 / r as f64));
        }
        ArithOp::FloorDiv => {
            if r == 0 {
                return Err(RuntimeError::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            floor_div_int(l, r)
        }
        ArithOp::Mod => {
            if r == 0 {
                return Err(RuntimeError::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            Some(floor_mod_int(l, r))
        }
        ArithOp::Pow => return int_power(l, r),
    };
    result.map(Number::Int).ok_or_else(|| overflow(op))
}

fn float_arithmetic(op: ArithOp, l: f64, r: f64) -> EvalResult<Number> {
    let result = match op {
        ArithOp::Add => l + r,
        ArithOp::Sub => l - r,
        ArithOp::Mul => l * r,
        ArithOp::Div => {
            if r == 0.0 {
                return Err(RuntimeError::zero_division("float division by zero"));
            }
            l / r
        }
        ArithOp::FloorDiv => {
            if r == 0.0 {
                return Err(RuntimeError::zero_division(
                    "float floor division by zero",
                ));
            }
            floor_div_float(l, r)
        }
        ArithOp::Mod => {
            if r == 0.0 {
                return Err(RuntimeError::zero_division("float modulo"));
            }
            floor_mod_float(l, r)
        }
        ArithOp::Pow => {
            if l == 0.0 && r < 0.0 {
                return Err(RuntimeError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            l.powf(r)
        }
    };
    Ok(Number::Float(result))
}

/// Exact ordering of an int against a float, without rounding the int
fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, the first float above every i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= LIMIT {
        return Some(Ordering::Less);
    }
    if f < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    // exact: |whole| < 2^63 and integral
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}

/// Floor division for floats, consistent with [`floor_mod_float`]
///
/// `l // r` is derived from the remainder so that `(l // r) * r + l % r`
/// reproduces `l` as closely as floats allow.
pub fn floor_div_float(l: f64, r: f64) -> f64 {
    let m = l % r;
    let mut div = (l - m) / r;
    if m != 0.0 && ((r < 0.0) != (m < 0.0)) {
        div -= 1.0;
    }
    if div == 0.0 {
        return 0.0_f64.copysign(l / r);
    }
    let floored = div.floor();
    if div - floored > 0.5 {
        floored + 1.0
    } else {
        floored
    }
}

/// Floor division for integers; `None` on overflow (`i64::MIN // -1`)
pub fn floor_div_int(l: i64, r: i64) -> Option<i64> {
    let q = l.checked_div(r)?;
    if (l % r != 0) && ((l < 0) != (r < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Floor modulo for integers: the result has the divisor's sign
pub fn floor_mod_int(l: i64, r: i64) -> i64 {
    let m = l.wrapping_rem(r);
    if m != 0 && ((m < 0) != (r < 0)) {
        m + r
    } else {
        m
    }
}

/// Floor modulo for floats, matching the integer rule
pub fn floor_mod_float(l: f64, r: f64) -> f64 {
    let m = l % r;
    if m != 0.0 && ((m < 0.0) != (r < 0.0)) {
        m + r
    } else if m == 0.0 {
        // zero takes the divisor's sign
        0.0_f64.copysign(r)
    } else {
        m
    }
}

fn int_power(base: i64, exp: i64) -> EvalResult<Number> {
    if exp < 0 {
        if base == 0 {
            return Err(RuntimeError::zero_division(
                "0.0 cannot be raised to a negative power",
            ));
        }
        return Ok(Number::Float((base as f64).powf(exp as f64)));
    }
    let exp = u32::try_from(exp).map_err(|_| overflow(ArithOp::Pow))?;
    base.checked_pow(exp)
        .map(Number::Int)
        .ok_or_else(|| overflow(ArithOp::Pow))
}

/// Convert a float to an integer by dropping the fractional part
pub fn truncate(f: f64) -> EvalResult<i64> {
    if f.is_nan() {
        return Err(RuntimeError::value("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(RuntimeError::overflow(
            "cannot convert float infinity to integer",
        ));
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(RuntimeError::overflow("float too large to convert to integer"));
    }
    Ok(t as i64)
}

/// Truncating assignment: Float becomes Int, other values pass through
pub fn coerce_integral(value: Value) -> EvalResult<Value> {
    match value {
        Value::Float(f) => Ok(Value::Int(truncate(f)?)),
        other => Ok(other),
    }
}

pub fn negate(n: Number) -> EvalResult<Number> {
    match n {
        Number::Int(i) => i
            .checked_neg()
            .map(Number::Int)
            .ok_or_else(|| RuntimeError::overflow("integer overflow in negation")),
        Number::Float(f) => Ok(Number::Float(-f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_int_division_yields_float() {
        assert_eq!(
            arithmetic(ArithOp::Div, Number::Int(7), Number::Int(2)).unwrap(),
            Number::Float(3.5)
        );
        assert_eq!(
            arithmetic(ArithOp::Div, Number::Int(8), Number::Int(2)).unwrap(),
            Number::Float(4.0)
        );
    }

    #[test]
    fn test_promotion() {
        assert_eq!(
            arithmetic(ArithOp::Add, Number::Int(1), Number::Float(0.5)).unwrap(),
            Number::Float(1.5)
        );
        assert_eq!(
            arithmetic(ArithOp::Mul, Number::Int(3), Number::Int(4)).unwrap(),
            Number::Int(12)
        );
    }

    #[test]
    fn test_floor_modulo_follows_divisor() {
        assert_eq!(floor_mod_int(-7, 3), 2);
        assert_eq!(floor_mod_int(7, -3), -2);
        assert_eq!(floor_mod_int(-7, -3), -1);
        assert_eq!(floor_mod_float(-7.5, 2.0), 0.5);
        assert_eq!(floor_mod_float(7.5, -2.0), -0.5);
        assert_eq!(floor_div_int(-7, 2), Some(-4));
        assert_eq!(floor_div_int(7, 2), Some(3));
    }

    #[test]
    fn test_division_by_zero() {
        for op in [ArithOp::Div, ArithOp::Mod, ArithOp::FloorDiv] {
            let err = arithmetic(op, Number::Int(1), Number::Int(0)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
            let err = arithmetic(op, Number::Float(1.0), Number::Int(0)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
        }
    }

    #[test]
    fn test_power_rules() {
        assert_eq!(
            arithmetic(ArithOp::Pow, Number::Int(3), Number::Int(3)).unwrap(),
            Number::Int(27)
        );
        assert_eq!(
            arithmetic(ArithOp::Pow, Number::Int(2), Number::Int(-1)).unwrap(),
            Number::Float(0.5)
        );
        assert_eq!(
            arithmetic(ArithOp::Pow, Number::Float(4.0), Number::Float(0.5)).unwrap(),
            Number::Float(2.0)
        );
        let err = arithmetic(ArithOp::Pow, Number::Int(10), Number::Int(40)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverflowError);
    }

    #[test]
    fn test_truncation_toward_zero() {
        assert_eq!(truncate(-1.9).unwrap(), -1);
        assert_eq!(truncate(2.99).unwrap(), 2);
        assert_eq!(coerce_integral(Value::Float(-1.9)).unwrap(), Value::Int(-1));
        assert_eq!(coerce_integral(Value::text("x")).unwrap(), Value::text("x"));
        assert_eq!(truncate(f64::NAN).unwrap_err().kind, ErrorKind::ValueError);
        assert_eq!(
            truncate(f64::INFINITY).unwrap_err().kind,
            ErrorKind::OverflowError
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = arithmetic(ArithOp::Add, Number::Int(i64::MAX), Number::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverflowError);
        assert!(negate(Number::Int(i64::MIN)).is_err());
    }

    #[test]
    fn test_float_floor_division_matches_modulo() {
        assert_eq!(floor_div_float(1.0, 0.1), 9.0);
        assert_eq!(floor_mod_float(1.0, 0.1), 0.09999999999999995);
        assert_eq!(floor_div_float(-7.5, 2.0), -4.0);
        assert_eq!(floor_div_float(7.5, -2.0), -4.0);
        assert_eq!(floor_div_float(7.0, 2.0), 3.0);
        assert_eq!(floor_div_float(-0.5, 2.0), -1.0);
        assert!(floor_div_float(-0.0, 2.0).is_sign_negative());
        assert_eq!(
            arithmetic(ArithOp::FloorDiv, Number::Int(1), Number::Float(0.1)).unwrap(),
            Number::Float(9.0)
        );
    }

    #[test]
    fn test_mixed_comparison_is_exact() {
        let big = (1i64 << 53) + 1;
        let float = 2f64.powi(53);
        assert!(!Number::Int(big).numeric_eq(Number::Float(float)));
        assert_eq!(
            Number::Int(big).compare(Number::Float(float)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Number::Float(float).compare(Number::Int(big)),
            Some(Ordering::Less)
        );
        assert!(Number::Int(1 << 53).numeric_eq(Number::Float(float)));
        assert_eq!(
            Number::Int(2).compare(Number::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Number::Int(-2).compare(Number::Float(-2.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Number::Int(i64::MAX).compare(Number::Float(9.3e18)),
            Some(Ordering::Less)
        );
        assert_eq!(Number::Int(0).compare(Number::Float(f64::NAN)), None);
        assert!(Number::Int(3).numeric_eq(Number::Float(3.0)));
    }

    proptest! {
        #[test]
        fn prop_float_floor_div_recombines(l in -1.0e6f64..1.0e6, r in 0.01f64..1.0e3) {
            let d = floor_div_float(l, r);
            prop_assert_eq!(d, d.floor());
            let back = d * r + floor_mod_float(l, r);
            prop_assert!((back - l).abs() <= 1e-6 * l.abs().max(1.0));
        }

        #[test]
        fn prop_floor_mod_sign_matches_divisor(l in -10_000i64..10_000, r in -500i64..500) {
            prop_assume!(r != 0);
            let m = floor_mod_int(l, r);
            prop_assert!(m == 0 || (m < 0) == (r < 0));
            prop_assert!(m.abs() < r.abs());
            prop_assert_eq!(floor_div_int(l, r).unwrap() * r + m, l);
        }

        #[test]
        fn prop_truncate_never_rounds_away_from_zero(f in -1.0e12f64..1.0e12) {
            let t = truncate(f).unwrap() as f64;
            prop_assert!(t.abs() <= f.abs());
            prop_assert!((f - t).abs() < 1.0);
        }
    }
}
