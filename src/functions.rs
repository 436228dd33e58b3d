//! Built-in functions for Tern
//!
//! Builtins are plain function pointers registered by name. They are looked
//! up after the scope chain, so a program may shadow any of them.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::error::{EvalResult, RuntimeError};
use crate::numeric::{self, Number};
use crate::operators;
use crate::output::Output;
use crate::value::{IntRange, Value};

/// Function signature
pub type BuiltinFunction = fn(&mut dyn Output, &[Value]) -> EvalResult<Value>;

/// A native function value; two builtins are equal when their names are
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFunction,
}

impl Builtin {
    pub fn call(&self, out: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
        (self.func)(out, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

/// Function registry
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, Builtin>,
}

impl FunctionRegistry {
    /// Create a new function registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        // Output
        registry.register("print", fn_print);

        // Collections
        registry.register("len", fn_len);
        registry.register("range", fn_range);

        // Numeric
        registry.register("abs", fn_abs);
        registry.register("min", fn_min);
        registry.register("max", fn_max);

        // Type conversion
        registry.register("int", fn_int);
        registry.register("float", fn_float);
        registry.register("str", fn_str);
        registry.register("bool", fn_bool);

        registry
    }

    /// Register a function
    pub fn register(&mut self, name: &'static str, func: BuiltinFunction) {
        self.functions.insert(name, Builtin { name, func });
    }

    /// Builtin value bound to `name`, if any
    pub fn get(&self, name: &str) -> Option<Value> {
        self.functions.get(name).copied().map(Value::Builtin)
    }

    /// Check if a function exists
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// List all function names, sorted
    pub fn list_functions(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn require_args(args: &[Value], count: usize, name: &str) -> EvalResult<()> {
    if args.len() != count {
        return Err(RuntimeError::type_error(format!(
            "{}() takes exactly {} argument{} ({} given)",
            name,
            count,
            if count == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn require_args_range(args: &[Value], min: usize, max: usize, name: &str) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        return Err(RuntimeError::type_error(format!(
            "{}() takes from {} to {} arguments ({} given)",
            name,
            min,
            max,
            args.len()
        )));
    }
    Ok(())
}

fn as_int(value: &Value, name: &str) -> EvalResult<i64> {
    value.as_index().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "{}() argument must be int, not '{}'",
            name,
            value.type_name()
        ))
    })
}

// =============================================================================
// OUTPUT
// =============================================================================

fn fn_print(out: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    let mut line = args
        .iter()
        .map(Value::stringify)
        .collect::<Vec<_>>()
        .join(" ");
    line.push('\n');
    out.write(&line);
    Ok(Value::None)
}

// =============================================================================
// COLLECTION FUNCTIONS
// =============================================================================

fn fn_len(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args(args, 1, "len")?;
    let len = args[0].len()?;
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| RuntimeError::overflow("length does not fit in an int"))
}

fn fn_range(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args_range(args, 1, 3, "range")?;
    let ints = args
        .iter()
        .map(|arg| as_int(arg, "range"))
        .collect::<EvalResult<Vec<_>>>()?;
    let (start, stop, step) = match ints[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step, ..] => (start, stop, step),
        [] => (0, 0, 1),
    };
    IntRange::new(start, stop, step).map(Value::Range)
}

// =============================================================================
// NUMERIC FUNCTIONS
// =============================================================================

fn fn_abs(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args(args, 1, "abs")?;
    match Number::from_value(&args[0]) {
        Some(Number::Int(i)) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("integer overflow in abs()")),
        Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(RuntimeError::type_error(format!(
            "bad operand type for abs(): '{}'",
            args[0].type_name()
        ))),
    }
}

/// Shared body of `min` and `max`: one sequence argument or several values
fn extreme(args: &[Value], name: &str, replace: fn(Ordering) -> bool) -> EvalResult<Value> {
    let candidates = match args {
        [] => {
            return Err(RuntimeError::type_error(format!(
                "{}() expected at least 1 argument, got 0",
                name
            )))
        }
        [Value::Sequence(items)] => items.borrow().clone(),
        [Value::Range(range)] => {
            let ends = [range.first(), range.last()];
            ends.into_iter().flatten().map(Value::Int).collect()
        }
        [single] => {
            return Err(RuntimeError::type_error(format!(
                "'{}' object is not iterable",
                single.type_name()
            )))
        }
        many => many.to_vec(),
    };

    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(RuntimeError::value(format!(
            "{}() arg is an empty sequence",
            name
        )));
    };
    for candidate in iter {
        if operators::compare(&candidate, &best)?.is_some_and(replace) {
            best = candidate;
        }
    }
    Ok(best)
}

fn fn_min(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    extreme(args, "min", Ordering::is_lt)
}

fn fn_max(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    extreme(args, "max", Ordering::is_gt)
}

// =============================================================================
// TYPE CONVERSION FUNCTIONS
// =============================================================================

fn fn_int(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args_range(args, 0, 1, "int")?;
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) => Ok(Value::Int(numeric::truncate(*f)?)),
        Value::Text(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                RuntimeError::value(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            }),
        other => Err(RuntimeError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn fn_float(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args_range(args, 0, 1, "float")?;
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    if let Some(n) = Number::from_value(value) {
        return Ok(Value::Float(n.as_f64()));
    }
    match value {
        Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::value(format!(
                "could not convert string to float: {}",
                value.repr()
            ))
        }),
        other => Err(RuntimeError::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn fn_str(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args_range(args, 0, 1, "str")?;
    Ok(Value::text(
        args.first().map(Value::stringify).unwrap_or_default(),
    ))
}

fn fn_bool(_: &mut dyn Output, args: &[Value]) -> EvalResult<Value> {
    require_args_range(args, 0, 1, "bool")?;
    Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
}
