//! Evaluator for Tern - executes statements and evaluates expressions
//!
//! Statement execution yields a [`Signal`]; expressions yield a [`Value`].
//! Values the evaluator holds across a nested evaluation (a binary operator's
//! left operand, a callee while its arguments run, ...) are pushed on a
//! shadow stack so a collection triggered by a nested call still sees them.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{AssignTarget, BinaryOperator, Expression, Literal, Module, Statement};
use crate::config::RuntimeConfig;
use crate::control::{LoopFrame, LoopStep, Signal};
use crate::environment::{CollectStats, Environment, ScopeId};
use crate::error::{ErrorKind, EvalResult, RuntimeError};
use crate::functions::FunctionRegistry;
use crate::numeric;
use crate::operators;
use crate::output::{Output, StdoutOutput};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Closure, ClosureId, FunctionBody, IntRange, Mapping, Value};

/// Name reported for the module-level frame
const MODULE_FRAME: &str = "<module>";

/// One active activation: the module or a function call
#[derive(Debug)]
struct Frame {
    scope: ScopeId,
    function: Rc<str>,
    /// Loops currently open in this activation
    loop_depth: usize,
}

/// Where a `for` loop draws its items from
enum ForSource {
    /// Sequences are walked live, so appends during iteration are visited
    Live(crate::value::SequenceRef),
    Snapshot(Vec<Value>),
    /// Ranges produce their items on demand
    Range(IntRange),
}

impl ForSource {
    fn item(&self, position: usize) -> Option<Value> {
        match self {
            ForSource::Live(items) => items.borrow().get(position).cloned(),
            ForSource::Snapshot(items) => items.get(position).cloned(),
            ForSource::Range(range) => i64::try_from(position)
                .ok()
                .and_then(|i| range.get(i))
                .map(Value::Int),
        }
    }
}

/// Evaluator context
pub struct Interpreter {
    env: Environment,
    frames: Vec<Frame>,
    temps: Vec<Value>,
    builtins: FunctionRegistry,
    output: Box<dyn Output>,
    config: RuntimeConfig,
    next_closure_id: u64,
}

impl Interpreter {
    /// Create an interpreter printing to stdout
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_output(config, Box::new(StdoutOutput))
    }

    /// Create an interpreter with a custom output sink
    pub fn with_output(config: RuntimeConfig, output: Box<dyn Output>) -> Self {
        let env = Environment::new(config.gc_threshold);
        let root = env.root();
        Interpreter {
            env,
            frames: vec![Frame {
                scope: root,
                function: Rc::from(MODULE_FRAME),
                loop_depth: 0,
            }],
            temps: Vec::new(),
            builtins: FunctionRegistry::new(),
            output,
            config,
            next_closure_id: 0,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Execute every top-level statement of `module` in the root scope
    pub fn run_module(&mut self, module: &Module) -> EvalResult<()> {
        debug!(statements = module.statements.len(), "running module");
        self.exec_block(&module.statements)?;
        Ok(())
    }

    /// Read a binding of the root scope, falling back to the builtins
    pub fn get_global(&self, name: &str) -> EvalResult<Value> {
        match self.env.lookup(self.env.root(), name) {
            Err(err) if err.kind == ErrorKind::NameError => {
                self.builtins.get(name).ok_or(err)
            }
            other => other,
        }
    }

    /// Bind `name` in the root scope
    pub fn set_global(&mut self, name: &str, value: Value) -> EvalResult<()> {
        let root = self.env.root();
        self.env.define(root, name, value)
    }

    /// Run a mark-and-sweep collection now
    pub fn collect_garbage(&mut self) -> CollectStats {
        let frames: Vec<ScopeId> = self.frames.iter().map(|f| f.scope).collect();
        self.env.collect(&frames, self.temps.iter())
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    /// Execute statements until one interrupts the block
    pub fn exec_block(&mut self, statements: &[Statement]) -> EvalResult<Signal> {
        for statement in statements {
            let signal = self.exec_statement(statement)?;
            if signal.interrupts() {
                return Ok(signal);
            }
        }
        Ok(Signal::Normal)
    }

    /// Execute one statement; errors pick up its span
    pub fn exec_statement(&mut self, statement: &Statement) -> EvalResult<Signal> {
        let mark = self.temps.len();
        let result = ensure_sufficient_stack(|| self.exec_statement_inner(statement));
        self.temps.truncate(mark);
        result.map_err(|err| err.with_span(statement.span()))
    }

    fn exec_statement_inner(&mut self, statement: &Statement) -> EvalResult<Signal> {
        match statement {
            Statement::Expression { expr, .. } => {
                self.eval_expression(expr)?;
                Ok(Signal::Normal)
            }

            Statement::Assign {
                target,
                value,
                integral,
                ..
            } => {
                let mut value = self.eval_expression(value)?;
                if *integral {
                    value = numeric::coerce_integral(value)?;
                }
                self.temps.push(value.clone());
                self.assign_target(target, value)?;
                Ok(Signal::Normal)
            }

            Statement::AugAssign {
                target,
                op,
                value,
                integral,
                ..
            } => {
                self.exec_aug_assign(target, *op, value, *integral)?;
                Ok(Signal::Normal)
            }

            Statement::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                if self.eval_expression(condition)?.truthy() {
                    self.exec_block(then_body)
                } else {
                    self.exec_block(else_body)
                }
            }

            Statement::While {
                condition,
                body,
                orelse,
                ..
            } => {
                let mut frame = LoopFrame::enter();
                self.frame_mut().loop_depth += 1;
                let outcome = self.run_while(condition, body, &mut frame);
                self.frame_mut().loop_depth -= 1;
                self.finish_loop("while", outcome?, &frame, orelse)
            }

            Statement::For {
                target,
                iterable,
                body,
                orelse,
                ..
            } => {
                let iterable = self.eval_expression(iterable)?;
                self.temps.push(iterable.clone());
                let source = self.for_source(&iterable)?;

                let mut frame = LoopFrame::enter();
                self.frame_mut().loop_depth += 1;
                let outcome = self.run_for(target, &source, body, &mut frame);
                self.frame_mut().loop_depth -= 1;
                self.finish_loop("for", outcome?, &frame, orelse)
            }

            Statement::Break { .. } => {
                self.require_loop("break")?;
                Ok(Signal::Break)
            }

            Statement::Continue { .. } => {
                self.require_loop("continue")?;
                Ok(Signal::Continue)
            }

            Statement::Return { value, .. } => {
                if self.frames.len() == 1 {
                    return Err(RuntimeError::new(
                        ErrorKind::SyntaxError,
                        "'return' outside function",
                    ));
                }
                let value = match value {
                    Some(expr) => self.eval_expression(expr)?,
                    None => Value::None,
                };
                Ok(Signal::Return(value))
            }

            Statement::Pass { .. } => Ok(Signal::Normal),

            Statement::FunctionDef {
                name, params, body, ..
            } => {
                let closure = self.make_closure(
                    name,
                    params,
                    FunctionBody::Block(Rc::clone(body)),
                );
                debug!(function = %name, params = params.len(), "define function");
                let scope = self.current_scope();
                self.env.assign(scope, name, closure)?;
                Ok(Signal::Normal)
            }

            Statement::Global { names, .. } => {
                let scope = self.current_scope();
                for name in names {
                    self.env.declare_global(scope, name)?;
                }
                Ok(Signal::Normal)
            }

            Statement::Nonlocal { names, .. } => {
                let scope = self.current_scope();
                for name in names {
                    self.env.declare_nonlocal(scope, name)?;
                }
                Ok(Signal::Normal)
            }
        }
    }

    /// `Some(signal)` when the loop must unwind instead of finishing normally
    fn run_while(
        &mut self,
        condition: &Expression,
        body: &[Statement],
        frame: &mut LoopFrame,
    ) -> EvalResult<Option<Signal>> {
        while self.eval_expression(condition)?.truthy() {
            let signal = self.exec_block(body)?;
            match frame.absorb(signal) {
                LoopStep::Next => {}
                LoopStep::Exit => return Ok(None),
                LoopStep::Unwind(signal) => return Ok(Some(signal)),
            }
        }
        Ok(None)
    }

    fn run_for(
        &mut self,
        target: &AssignTarget,
        source: &ForSource,
        body: &[Statement],
        frame: &mut LoopFrame,
    ) -> EvalResult<Option<Signal>> {
        let mut position = 0;
        while let Some(item) = source.item(position) {
            position += 1;
            self.assign_target(target, item)?;
            let signal = self.exec_block(body)?;
            match frame.absorb(signal) {
                LoopStep::Next => {}
                LoopStep::Exit => return Ok(None),
                LoopStep::Unwind(signal) => return Ok(Some(signal)),
            }
        }
        Ok(None)
    }

    fn finish_loop(
        &mut self,
        kind: &str,
        unwind: Option<Signal>,
        frame: &LoopFrame,
        orelse: &[Statement],
    ) -> EvalResult<Signal> {
        if let Some(signal) = unwind {
            trace!(kind, iterations = frame.iterations(), "loop unwound");
            return Ok(signal);
        }
        if frame.runs_exhaustion_clause() {
            trace!(kind, iterations = frame.iterations(), "loop exhausted");
            // break/continue here belong to the enclosing loop
            return self.exec_block(orelse);
        }
        trace!(kind, iterations = frame.iterations(), "loop broken");
        Ok(Signal::Normal)
    }

    fn for_source(&mut self, iterable: &Value) -> EvalResult<ForSource> {
        match iterable {
            Value::Sequence(items) => Ok(ForSource::Live(items.clone())),
            Value::Range(range) => Ok(ForSource::Range(*range)),
            Value::Mapping(map) => {
                let keys = map.borrow().keys();
                self.temps.extend(keys.iter().cloned());
                Ok(ForSource::Snapshot(keys))
            }
            Value::Text(s) => Ok(ForSource::Snapshot(
                s.chars().map(|c| Value::text(c.to_string())).collect(),
            )),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    fn require_loop(&self, keyword: &str) -> EvalResult<()> {
        if self.frame().loop_depth == 0 {
            return Err(RuntimeError::new(
                ErrorKind::SyntaxError,
                format!("'{}' outside loop", keyword),
            ));
        }
        Ok(())
    }

    fn assign_target(&mut self, target: &AssignTarget, value: Value) -> EvalResult<()> {
        match target {
            AssignTarget::Name(name) => {
                let scope = self.current_scope();
                self.env.assign(scope, name, value)
            }
            AssignTarget::Index { object, index } => {
                let container = self.eval_expression(object)?;
                self.temps.push(container.clone());
                let key = self.eval_expression(index)?;
                container.index_set(&key, value)
            }
        }
    }

    fn exec_aug_assign(
        &mut self,
        target: &AssignTarget,
        op: BinaryOperator,
        value: &Expression,
        integral: bool,
    ) -> EvalResult<()> {
        match target {
            AssignTarget::Name(name) => {
                let current = self.lookup(name)?;
                self.temps.push(current.clone());
                let rhs = self.eval_expression(value)?;
                let result = self.combine(op, current, &rhs, integral)?;
                let scope = self.current_scope();
                self.env.assign(scope, name, result)
            }
            AssignTarget::Index { object, index } => {
                let container = self.eval_expression(object)?;
                self.temps.push(container.clone());
                let key = self.eval_expression(index)?;
                self.temps.push(key.clone());
                let current = container.index_get(&key)?;
                self.temps.push(current.clone());
                let rhs = self.eval_expression(value)?;
                let result = self.combine(op, current, &rhs, integral)?;
                container.index_set(&key, result)
            }
        }
    }

    /// `current op= rhs`; sequences are extended or repeated in place
    fn combine(
        &mut self,
        op: BinaryOperator,
        current: Value,
        rhs: &Value,
        integral: bool,
    ) -> EvalResult<Value> {
        if let Value::Sequence(items) = &current {
            match (op, rhs) {
                (BinaryOperator::Add, Value::Sequence(other)) => {
                    let extra = other.borrow().clone();
                    items.borrow_mut().extend(extra);
                    return Ok(current);
                }
                (BinaryOperator::Add, Value::Range(range)) => {
                    let mut items = items.borrow_mut();
                    items
                        .try_reserve(range.len()?)
                        .map_err(|_| RuntimeError::memory("cannot extend list"))?;
                    items.extend((0..).map_while(|i| range.get(i)).map(Value::Int));
                    drop(items);
                    return Ok(current);
                }
                (BinaryOperator::Multiply, count) if count.as_index().is_some() => {
                    let repeated = operators::binary(op, &current, count)?;
                    if let Value::Sequence(new_items) = repeated {
                        let new_items = new_items.borrow().clone();
                        *items.borrow_mut() = new_items;
                    }
                    return Ok(current);
                }
                _ => {}
            }
        }
        let result = operators::binary(op, &current, rhs)?;
        if integral {
            numeric::coerce_integral(result)
        } else {
            Ok(result)
        }
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    /// Evaluate an expression
    pub fn eval_expression(&mut self, expr: &Expression) -> EvalResult<Value> {
        let mark = self.temps.len();
        let result = ensure_sufficient_stack(|| self.eval_expression_inner(expr));
        self.temps.truncate(mark);
        result
    }

    fn eval_expression_inner(&mut self, expr: &Expression) -> EvalResult<Value> {
        match expr {
            Expression::Literal { value, .. } => Ok(match value {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Text(s) => Value::text(s.as_str()),
                Literal::None => Value::None,
            }),

            Expression::Name { name, .. } => self.lookup(name),

            Expression::List { elements, .. } => {
                let mark = self.temps.len();
                for element in elements {
                    let value = self.eval_expression(element)?;
                    self.temps.push(value);
                }
                Ok(Value::sequence(self.temps.split_off(mark)))
            }

            Expression::Map { entries, .. } => {
                let mut mapping = Mapping::new();
                for (key_expr, value_expr) in entries {
                    let key = self.eval_expression(key_expr)?;
                    self.temps.push(key.clone());
                    let value = self.eval_expression(value_expr)?;
                    self.temps.push(value.clone());
                    mapping.insert(key, value)?;
                }
                Ok(Value::mapping(mapping))
            }

            Expression::Index { object, index, .. } => {
                let container = self.eval_expression(object)?;
                self.temps.push(container.clone());
                let key = self.eval_expression(index)?;
                container.index_get(&key)
            }

            Expression::Call { callee, args, .. } => {
                let function = self.eval_expression(callee)?;
                self.temps.push(function.clone());
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let value = self.eval_expression(arg)?;
                    self.temps.push(value.clone());
                    values.push(value);
                }
                self.call_value(&function, values)
            }

            Expression::BinaryOp {
                op: BinaryOperator::And,
                left,
                right,
                ..
            } => {
                let left = self.eval_expression(left)?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval_expression(right)
            }

            Expression::BinaryOp {
                op: BinaryOperator::Or,
                left,
                right,
                ..
            } => {
                let left = self.eval_expression(left)?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval_expression(right)
            }

            Expression::BinaryOp {
                op, left, right, ..
            } => {
                let left = self.eval_expression(left)?;
                self.temps.push(left.clone());
                let right = self.eval_expression(right)?;
                operators::binary(*op, &left, &right)
            }

            Expression::UnaryOp { op, operand, .. } => {
                let operand = self.eval_expression(operand)?;
                operators::unary(*op, &operand)
            }

            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval_expression(condition)?.truthy() {
                    self.eval_expression(then_expr)
                } else {
                    self.eval_expression(else_expr)
                }
            }

            Expression::Lambda { params, body, .. } => Ok(self.make_closure(
                "<lambda>",
                params,
                FunctionBody::Expression(Rc::clone(body)),
            )),
        }
    }

    /// Scope chain first, then the builtins
    fn lookup(&self, name: &str) -> EvalResult<Value> {
        match self.env.lookup(self.current_scope(), name) {
            Err(err) if err.kind == ErrorKind::NameError => {
                self.builtins.get(name).ok_or(err)
            }
            other => other,
        }
    }

    fn make_closure(&mut self, name: &str, params: &[String], body: FunctionBody) -> Value {
        self.next_closure_id += 1;
        Value::Closure(Rc::new(Closure {
            id: ClosureId(self.next_closure_id),
            name: Rc::from(name),
            params: Rc::from(params),
            body: Rc::new(body),
            env: self.current_scope(),
        }))
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Call any callable value with already evaluated arguments
    pub fn call_value(&mut self, function: &Value, args: Vec<Value>) -> EvalResult<Value> {
        match function {
            Value::Closure(closure) => self.call_closure(closure.clone(), args),
            Value::Builtin(builtin) => builtin.call(self.output.as_mut(), &args),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, args: Vec<Value>) -> EvalResult<Value> {
        if closure.params.len() != args.len() {
            return Err(RuntimeError::type_error(format!(
                "{}() takes {} positional argument{} but {} {} given",
                closure.name,
                closure.params.len(),
                if closure.params.len() == 1 { "" } else { "s" },
                args.len(),
                if args.len() == 1 { "was" } else { "were" }
            )));
        }
        let depth = self.frames.len();
        if depth > self.config.max_call_depth {
            return Err(RuntimeError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }

        let scope = self.env.push_scope(Some(closure.env));
        for (param, arg) in closure.params.iter().zip(args) {
            self.env.define(scope, param, arg)?;
        }
        self.frames.push(Frame {
            scope,
            function: closure.name.clone(),
            loop_depth: 0,
        });
        debug!(function = %closure.name, depth, "call");
        if self.env.should_collect() {
            self.collect_garbage();
        }

        let result = ensure_sufficient_stack(|| match closure.body.as_ref() {
            FunctionBody::Block(body) => self.exec_block(body).map(|signal| match signal {
                Signal::Return(value) => value,
                _ => Value::None,
            }),
            FunctionBody::Expression(body) => self.eval_expression(body),
        });
        self.frames.pop();
        result.map_err(|err| err.unwound_through(&closure.name))
    }

    fn frame(&self) -> &Frame {
        // the module frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn current_scope(&self) -> ScopeId {
        self.frame().scope
    }

    /// Names of the active activations, outermost first
    pub fn call_stack(&self) -> Vec<String> {
        self.frames.iter().map(|f| f.function.to_string()).collect()
    }
}
