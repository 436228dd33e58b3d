//! Runtime values
//!
//! Sequences and mappings are reference types: a [`Value`] holding one is a
//! handle, and cloning the handle aliases the same storage. Everything else
//! is an immutable scalar.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::ast::{Expression, Statement};
use crate::environment::ScopeId;
use crate::error::{EvalResult, RuntimeError};
use crate::functions::Builtin;

pub type SequenceRef = Rc<RefCell<Vec<Value>>>;
pub type MappingRef = Rc<RefCell<Mapping>>;

/// Runtime value
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    Sequence(SequenceRef),
    Mapping(MappingRef),
    Range(IntRange),
    Closure(Rc<Closure>),
    Builtin(Builtin),
}

/// Opaque identity token of a closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureId(pub u64);

/// Code of a user function
#[derive(Debug)]
pub enum FunctionBody {
    /// `def` body
    Block(Rc<[Statement]>),
    /// `lambda` body
    Expression(Rc<Expression>),
}

/// A function value: code plus the scope it was defined in
#[derive(Debug)]
pub struct Closure {
    pub id: ClosureId,
    pub name: Rc<str>,
    pub params: Rc<[String]>,
    pub body: Rc<FunctionBody>,
    /// Captured by reference: later rebindings there stay visible
    pub env: ScopeId,
}

impl Value {
    pub fn text(s: impl Into<Rc<str>>) -> Self {
        Value::Text(s.into())
    }

    pub fn sequence(items: Vec<Value>) -> Self {
        Value::Sequence(Rc::new(RefCell::new(items)))
    }

    pub fn mapping(mapping: Mapping) -> Self {
        Value::Mapping(Rc::new(RefCell::new(mapping)))
    }

    /// Type name as the language spells it in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "str",
            Value::Sequence(_) => "list",
            Value::Mapping(_) => "dict",
            Value::Range(_) => "range",
            Value::Closure(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Sequence(items) => !items.borrow().is_empty(),
            Value::Mapping(map) => !map.borrow().is_empty(),
            Value::Range(range) => !range.is_empty(),
            Value::Closure(_) | Value::Builtin(_) => true,
        }
    }

    /// Integer view used for indexing: Bool counts as 0/1
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn len(&self) -> EvalResult<usize> {
        match self {
            Value::Text(s) => Ok(s.chars().count()),
            Value::Sequence(items) => Ok(items.borrow().len()),
            Value::Mapping(map) => Ok(map.borrow().len()),
            Value::Range(range) => range.len(),
            other => Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    /// `container[key]`
    pub fn index_get(&self, key: &Value) -> EvalResult<Value> {
        match self {
            Value::Sequence(items) => {
                let items = items.borrow();
                let idx = normalize_index(items.len(), key, "list")?
                    .ok_or_else(|| RuntimeError::index("list index out of range"))?;
                Ok(items[idx].clone())
            }
            Value::Mapping(map) => map
                .borrow()
                .get(key)?
                .ok_or_else(|| RuntimeError::key(key.repr())),
            Value::Text(s) => {
                let len = s.chars().count();
                let idx = normalize_index(len, key, "string")?
                    .ok_or_else(|| RuntimeError::index("string index out of range"))?;
                Ok(s.chars().nth(idx).map(|c| Value::text(c.to_string())).unwrap_or(Value::None))
            }
            Value::Range(range) => {
                let raw = key.as_index().ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "range indices must be integers, not {}",
                        key.type_name()
                    ))
                })?;
                range
                    .get(raw)
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::index("range object index out of range"))
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `container[key] = value`, in place
    pub fn index_set(&self, key: &Value, value: Value) -> EvalResult<()> {
        match self {
            Value::Sequence(items) => {
                let mut items = items.borrow_mut();
                let idx = normalize_index(items.len(), key, "list")?
                    .ok_or_else(|| RuntimeError::index("list assignment index out of range"))?;
                items[idx] = value;
                Ok(())
            }
            Value::Mapping(map) => map.borrow_mut().insert(key.clone(), value),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    /// Membership test backing `in`
    pub fn contains(&self, needle: &Value) -> EvalResult<bool> {
        match self {
            Value::Sequence(items) => Ok(items.borrow().iter().any(|item| item.equals(needle))),
            Value::Mapping(map) => Ok(map.borrow().get(needle)?.is_some()),
            Value::Range(range) => Ok(match needle {
                Value::Int(_) | Value::Bool(_) => needle.as_index().is_some_and(|n| range.contains(n)),
                Value::Float(f) => f.fract() == 0.0 && range.contains_float(*f),
                _ => false,
            }),
            Value::Text(haystack) => match needle {
                Value::Text(n) => Ok(haystack.contains(n.as_ref())),
                other => Err(RuntimeError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            other => Err(RuntimeError::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Language-level `==`
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => a.id == b.id,
            (Value::Range(a), Value::Range(b)) => a.same_items(b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Sequence(a), Value::Sequence(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Mapping(a), Value::Mapping(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        matches!(b.get(k), Ok(Some(other)) if other.equals(v))
                    })
            }
            _ => match (crate::numeric::Number::from_value(self), crate::numeric::Number::from_value(other)) {
                (Some(a), Some(b)) => a.numeric_eq(b),
                _ => false,
            },
        }
    }

    /// Text handed to the output collaborator: strings raw, everything else as repr
    pub fn stringify(&self) -> String {
        match self {
            Value::Text(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// Canonical source-like rendering
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    fn write_repr(&self, out: &mut String, active: &mut Vec<usize>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Text(s) => out.push_str(&quote_text(s)),
            Value::Sequence(items) => {
                let addr = Rc::as_ptr(items) as *const () as usize;
                if active.contains(&addr) {
                    out.push_str("[...]");
                    return;
                }
                active.push(addr);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, active);
                }
                out.push(']');
                active.pop();
            }
            Value::Mapping(map) => {
                let addr = Rc::as_ptr(map) as *const () as usize;
                if active.contains(&addr) {
                    out.push_str("{...}");
                    return;
                }
                active.push(addr);
                out.push('{');
                for (i, (k, v)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_repr(out, active);
                    out.push_str(": ");
                    v.write_repr(out, active);
                }
                out.push('}');
                active.pop();
            }
            Value::Range(range) => out.push_str(&range.to_string()),
            Value::Closure(c) => out.push_str(&format!("<function {}>", c.name)),
            Value::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name)),
        }
    }

    /// Scopes reachable from this value, for the environment's mark phase
    pub(crate) fn trace_scopes(&self, scopes: &mut Vec<ScopeId>, seen: &mut HashSet<usize>) {
        match self {
            Value::Closure(c) => scopes.push(c.env),
            Value::Sequence(items) => {
                if seen.insert(Rc::as_ptr(items) as *const () as usize) {
                    for item in items.borrow().iter() {
                        item.trace_scopes(scopes, seen);
                    }
                }
            }
            Value::Mapping(map) => {
                if seen.insert(Rc::as_ptr(map) as *const () as usize) {
                    for (k, v) in map.borrow().iter() {
                        k.trace_scopes(scopes, seen);
                        v.trace_scopes(scopes, seen);
                    }
                }
            }
            _ => {}
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

/// Lazy `range(start, stop, step)`; `step` is never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl IntRange {
    pub fn new(start: i64, stop: i64, step: i64) -> EvalResult<Self> {
        if step == 0 {
            return Err(RuntimeError::value("range() arg 3 must not be zero"));
        }
        Ok(IntRange { start, stop, step })
    }

    fn count(&self) -> u128 {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        if step > 0 && start < stop {
            ((stop - start - 1) / step + 1) as u128
        } else if step < 0 && start > stop {
            ((start - stop - 1) / -step + 1) as u128
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn len(&self) -> EvalResult<usize> {
        i64::try_from(self.count())
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| RuntimeError::overflow("range has too many items"))
    }

    /// Item at `index`, negative indices counting from the end
    pub fn get(&self, index: i64) -> Option<i64> {
        let count = self.count() as i128;
        let index = if index < 0 { index as i128 + count } else { index as i128 };
        if index < 0 || index >= count {
            return None;
        }
        // in range by construction: the item lies between start and stop
        Some((self.start as i128 + index * self.step as i128) as i64)
    }

    pub fn contains(&self, n: i64) -> bool {
        let (n, start, step) = (n as i128, self.start as i128, self.step as i128);
        let stop = self.stop as i128;
        let within = if step > 0 {
            start <= n && n < stop
        } else {
            stop < n && n <= start
        };
        within && (n - start) % step == 0
    }

    fn contains_float(&self, f: f64) -> bool {
        f >= i64::MIN as f64 && f < i64::MAX as f64 && self.contains(f as i64)
    }

    pub fn first(&self) -> Option<i64> {
        self.get(0)
    }

    pub fn last(&self) -> Option<i64> {
        self.get(-1)
    }

    /// Ranges compare by the items they produce
    fn same_items(&self, other: &IntRange) -> bool {
        let count = self.count();
        count == other.count()
            && (count == 0
                || (self.start == other.start && (count == 1 || self.step == other.step)))
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "range({}, {})", self.start, self.stop)
        } else {
            write!(f, "range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

/// `seq * n`: shallow repetition, nested containers are shared across repeats
pub fn repeat(items: &[Value], count: i64) -> EvalResult<Vec<Value>> {
    if count <= 0 || items.is_empty() {
        return Ok(Vec::new());
    }
    let total = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(items.len()))
        .ok_or_else(|| RuntimeError::overflow("repeated sequence is too long"))?;
    let mut out = Vec::new();
    out.try_reserve_exact(total)
        .map_err(|_| RuntimeError::memory("cannot allocate repeated sequence"))?;
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

/// `text * n`
pub fn repeat_text(text: &str, count: i64) -> EvalResult<String> {
    if count <= 0 || text.is_empty() {
        return Ok(String::new());
    }
    let total = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(text.len()))
        .ok_or_else(|| RuntimeError::overflow("repeated string is too long"))?;
    let mut out = String::new();
    out.try_reserve_exact(total)
        .map_err(|_| RuntimeError::memory("cannot allocate repeated string"))?;
    for _ in 0..count {
        out.push_str(text);
    }
    Ok(out)
}

/// Resolve a possibly negative index; `Ok(None)` means out of range
fn normalize_index(len: usize, key: &Value, container: &str) -> EvalResult<Option<usize>> {
    let raw = key.as_index().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "{} indices must be integers, not {}",
            container,
            key.type_name()
        ))
    })?;
    let len = len as i64;
    let idx = if raw < 0 { raw + len } else { raw };
    if idx < 0 || idx >= len {
        Ok(None)
    } else {
        Ok(Some(idx as usize))
    }
}

/// Hash key for mappings; numerically equal keys collapse to one entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    None,
    Int(i64),
    Float(u64),
    Text(Rc<str>),
    Closure(ClosureId),
    Builtin(&'static str),
}

impl MapKey {
    pub fn from_value(value: &Value) -> EvalResult<Self> {
        match value {
            Value::None => Ok(MapKey::None),
            Value::Bool(b) => Ok(MapKey::Int(*b as i64)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Ok(MapKey::Int(*f as i64))
                } else {
                    Ok(MapKey::Float(f.to_bits()))
                }
            }
            Value::Text(s) => Ok(MapKey::Text(s.clone())),
            Value::Closure(c) => Ok(MapKey::Closure(c.id)),
            Value::Builtin(b) => Ok(MapKey::Builtin(b.name)),
            other => Err(RuntimeError::type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }
}

/// Insertion-ordered associative container
#[derive(Debug, Default)]
pub struct Mapping {
    entries: Vec<(Value, Value)>,
    index: HashMap<MapKey, usize>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> EvalResult<Option<Value>> {
        let key = MapKey::from_value(key)?;
        Ok(self.index.get(&key).map(|&i| self.entries[i].1.clone()))
    }

    /// Upsert; an existing entry keeps its original key and position
    pub fn insert(&mut self, key: Value, value: Value) -> EvalResult<()> {
        let hashed = MapKey::from_value(&key)?;
        match self.index.get(&hashed) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hashed, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// Python-style float repr: shortest round-trip digits
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:e}", f);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let positional = f.to_string();
        if positional.contains('.') {
            positional
        } else {
            format!("{}.0", positional)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn quote_text(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
