//! Scope chains and their storage
//!
//! Scopes live in an arena owned by [`Environment`] and are addressed by
//! [`ScopeId`] handles. A closure stores the handle of its defining scope, so
//! a closure bound inside the very scope it captures forms a cycle only at the
//! handle level; the arena reclaims such cycles by tracing from the roots the
//! evaluator supplies.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::{ErrorKind, EvalResult, RuntimeError};
use crate::value::Value;

/// Handle to a scope in the arena
///
/// The generation detects use of a handle whose slot was reclaimed and reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

/// One level of the chain
#[derive(Debug, Default)]
struct Scope {
    cells: HashMap<String, Value>,
    parent: Option<ScopeId>,
    /// Names declared `global` in this scope
    globals: HashSet<String>,
    /// Names declared `nonlocal` in this scope
    nonlocals: HashSet<String>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    scope: Option<Scope>,
}

/// Arena of scopes plus the reclamation bookkeeping
#[derive(Debug)]
pub struct Environment {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ScopeId,
    allocated_since_collect: usize,
    gc_threshold: usize,
}

/// Outcome of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    pub live: usize,
    pub freed: usize,
}

impl Environment {
    /// Create an environment holding only the root scope
    pub fn new(gc_threshold: usize) -> Self {
        let mut env = Environment {
            slots: Vec::new(),
            free: Vec::new(),
            root: ScopeId {
                index: 0,
                generation: 0,
            },
            allocated_since_collect: 0,
            gc_threshold,
        };
        env.root = env.push_scope(None);
        env.allocated_since_collect = 0;
        env
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    /// Allocate a child scope (or a new root when `parent` is None)
    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.allocated_since_collect += 1;
        let scope = Scope {
            parent,
            ..Scope::default()
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.scope = Some(scope);
                ScopeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    scope: Some(scope),
                });
                ScopeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn scope(&self, id: ScopeId) -> EvalResult<&Scope> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.scope.as_ref())
            .ok_or_else(|| stale(id))
    }

    fn scope_mut(&mut self, id: ScopeId) -> EvalResult<&mut Scope> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.scope.as_mut())
            .ok_or_else(|| stale(id))
    }

    /// Create or overwrite `name` in `scope` itself
    pub fn define(&mut self, scope: ScopeId, name: &str, value: Value) -> EvalResult<()> {
        let cells = &mut self.scope_mut(scope)?.cells;
        match cells.get_mut(name) {
            Some(cell) => *cell = value,
            None => {
                cells.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Find the scope whose cell currently holds `name`
    pub fn resolve(&self, scope: ScopeId, name: &str) -> EvalResult<Option<ScopeId>> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id)?;
            if s.cells.contains_key(name) {
                return Ok(Some(id));
            }
            current = s.parent;
        }
        Ok(None)
    }

    /// Read `name`, innermost scope first
    pub fn lookup(&self, scope: ScopeId, name: &str) -> EvalResult<Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id)?;
            if let Some(value) = s.cells.get(name) {
                return Ok(value.clone());
            }
            current = s.parent;
        }
        Err(RuntimeError::name(name))
    }

    /// Overwrite the existing cell for `name` wherever it resolves
    pub fn rebind(&mut self, scope: ScopeId, name: &str, value: Value) -> EvalResult<()> {
        let owner = self
            .resolve(scope, name)?
            .ok_or_else(|| RuntimeError::name(name))?;
        trace!(name, "rebind");
        if let Some(cell) = self.scope_mut(owner)?.cells.get_mut(name) {
            *cell = value;
        }
        Ok(())
    }

    /// Assignment statement semantics: honours `global` / `nonlocal` declarations
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value) -> EvalResult<()> {
        let (is_global, is_nonlocal, parent) = {
            let s = self.scope(scope)?;
            (s.globals.contains(name), s.nonlocals.contains(name), s.parent)
        };
        if is_global {
            let root = self.root;
            return self.define(root, name, value);
        }
        if is_nonlocal {
            let parent = parent.ok_or_else(|| nonlocal_missing(name))?;
            return match self.resolve(parent, name)? {
                Some(owner) if owner != self.root => self.rebind(owner, name, value),
                _ => Err(nonlocal_missing(name)),
            };
        }
        self.define(scope, name, value)
    }

    pub fn declare_global(&mut self, scope: ScopeId, name: &str) -> EvalResult<()> {
        if scope == self.root {
            return Ok(());
        }
        self.scope_mut(scope)?.globals.insert(name.to_string());
        Ok(())
    }

    pub fn declare_nonlocal(&mut self, scope: ScopeId, name: &str) -> EvalResult<()> {
        let Some(parent) = self.scope(scope)?.parent else {
            return Err(RuntimeError::new(
                ErrorKind::SyntaxError,
                "nonlocal declaration not allowed at module level",
            ));
        };
        match self.resolve(parent, name)? {
            Some(owner) if owner != self.root => {
                self.scope_mut(scope)?.nonlocals.insert(name.to_string());
                Ok(())
            }
            _ => Err(nonlocal_missing(name)),
        }
    }

    /// Number of scopes currently allocated
    pub fn live_scopes(&self) -> usize {
        self.slots.iter().filter(|slot| slot.scope.is_some()).count()
    }

    pub fn should_collect(&self) -> bool {
        self.gc_threshold > 0 && self.allocated_since_collect >= self.gc_threshold
    }

    /// Mark-and-sweep
    ///
    /// Roots are the root scope, `frames` (scopes of active calls) and
    /// `values` (values the evaluator holds outside any scope). Every scope
    /// not reachable from them is freed.
    pub fn collect<'a>(
        &mut self,
        frames: &[ScopeId],
        values: impl IntoIterator<Item = &'a Value>,
    ) -> CollectStats {
        let mut marked = vec![false; self.slots.len()];
        let mut seen_containers = HashSet::new();
        let mut worklist = vec![self.root];
        worklist.extend_from_slice(frames);
        for value in values {
            value.trace_scopes(&mut worklist, &mut seen_containers);
        }

        while let Some(id) = worklist.pop() {
            let Some(slot) = self.slots.get(id.index as usize) else {
                continue;
            };
            if slot.generation != id.generation || marked[id.index as usize] {
                continue;
            }
            let Some(scope) = slot.scope.as_ref() else {
                continue;
            };
            marked[id.index as usize] = true;
            if let Some(parent) = scope.parent {
                worklist.push(parent);
            }
            for value in scope.cells.values() {
                value.trace_scopes(&mut worklist, &mut seen_containers);
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.scope.is_some() && !marked[index] {
                slot.scope = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.allocated_since_collect = 0;

        let stats = CollectStats {
            live: self.live_scopes(),
            freed,
        };
        debug!(live = stats.live, freed = stats.freed, "collected scopes");
        stats
    }
}

fn stale(id: ScopeId) -> RuntimeError {
    RuntimeError::new(
        ErrorKind::SystemError,
        format!("scope {}#{} was reclaimed while still in use", id.index, id.generation),
    )
}

fn nonlocal_missing(name: &str) -> RuntimeError {
    RuntimeError::new(
        ErrorKind::SyntaxError,
        format!("no binding for nonlocal '{}' found", name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Closure, ClosureId, FunctionBody};
    use std::rc::Rc;

    fn closure_over(env: ScopeId, id: u64) -> Value {
        Value::Closure(Rc::new(Closure {
            id: ClosureId(id),
            name: "f".into(),
            params: Rc::from(Vec::<String>::new()),
            body: Rc::new(FunctionBody::Block(Rc::from(Vec::new()))),
            env,
        }))
    }

    #[test]
    fn test_lookup_walks_chain() {
        let mut env = Environment::new(0);
        let root = env.root();
        env.define(root, "x", Value::Int(1)).unwrap();
        let child = env.push_scope(Some(root));
        assert_eq!(env.lookup(child, "x").unwrap(), Value::Int(1));
        env.define(child, "x", Value::Int(2)).unwrap();
        assert_eq!(env.lookup(child, "x").unwrap(), Value::Int(2));
        assert_eq!(env.lookup(root, "x").unwrap(), Value::Int(1));
        let err = env.lookup(child, "y").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameError);
    }

    #[test]
    fn test_rebind_is_visible_to_children_created_earlier() {
        let mut env = Environment::new(0);
        let root = env.root();
        env.define(root, "f", Value::Int(1)).unwrap();
        let child = env.push_scope(Some(root));
        env.rebind(child, "f", Value::Int(2)).unwrap();
        assert_eq!(env.lookup(root, "f").unwrap(), Value::Int(2));
        assert_eq!(env.lookup(child, "f").unwrap(), Value::Int(2));
        assert!(env.rebind(child, "nope", Value::None).is_err());
    }

    #[test]
    fn test_global_and_nonlocal_assignment() {
        let mut env = Environment::new(0);
        let root = env.root();
        env.define(root, "g", Value::Int(0)).unwrap();
        let outer = env.push_scope(Some(root));
        env.define(outer, "n", Value::Int(0)).unwrap();
        let inner = env.push_scope(Some(outer));

        env.declare_global(inner, "g").unwrap();
        env.declare_nonlocal(inner, "n").unwrap();
        env.assign(inner, "g", Value::Int(5)).unwrap();
        env.assign(inner, "n", Value::Int(6)).unwrap();
        env.assign(inner, "local", Value::Int(7)).unwrap();

        assert_eq!(env.lookup(root, "g").unwrap(), Value::Int(5));
        assert_eq!(env.lookup(outer, "n").unwrap(), Value::Int(6));
        assert!(env.lookup(outer, "local").is_err());
        assert!(env.declare_nonlocal(inner, "g").is_err());
    }

    #[test]
    fn test_collect_reclaims_self_referential_closure_scope() {
        let mut env = Environment::new(1);
        let root = env.root();
        let call = env.push_scope(Some(root));
        // the closure lives in the scope it captures
        env.define(call, "inner", closure_over(call, 1)).unwrap();
        assert_eq!(env.live_scopes(), 2);

        let stats = env.collect(&[], std::iter::empty());
        assert_eq!(stats.freed, 1);
        assert_eq!(env.live_scopes(), 1);
        assert_eq!(env.lookup(call, "inner").unwrap_err().kind, ErrorKind::SystemError);
    }

    #[test]
    fn test_collect_keeps_scopes_reachable_from_values() {
        let mut env = Environment::new(1);
        let root = env.root();
        let call = env.push_scope(Some(root));
        env.define(call, "x", Value::Int(3)).unwrap();
        let escaped = Value::sequence(vec![closure_over(call, 2)]);

        let stats = env.collect(&[], [&escaped]);
        assert_eq!(stats.freed, 0);
        assert_eq!(env.lookup(call, "x").unwrap(), Value::Int(3));

        env.define(root, "keep", escaped).unwrap();
        let stats = env.collect(&[], std::iter::empty());
        assert_eq!(stats.freed, 0);
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut env = Environment::new(2);
        let root = env.root();
        let first = env.push_scope(Some(root));
        env.collect(&[], std::iter::empty());
        let second = env.push_scope(Some(root));
        assert_ne!(first, second);
        assert!(env.define(first, "x", Value::None).is_err());
        assert!(env.define(second, "x", Value::None).is_ok());
        assert!(!env.should_collect());
    }
}
