//! Shorthand constructors for building syntax trees in Rust
//!
//! Spans are left empty. The functions mirror the surface syntax closely
//! enough that a program reads top to bottom:
//!
//! ```
//! use tern::builder::*;
//!
//! let program = module(vec![
//!     def("twice", &["x"], vec![return_(mul(name("x"), int(2)))]),
//!     print(vec![call(name("twice"), vec![int(21)])]),
//! ]);
//! assert_eq!(program.statements.len(), 2);
//! ```

use std::rc::Rc;

use crate::ast::{
    AssignTarget, BinaryOperator, Expression, Literal, Module, Statement, UnaryOperator,
};

pub fn module(statements: Vec<Statement>) -> Module {
    Module { statements }
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

fn literal(value: Literal) -> Expression {
    Expression::Literal { value, span: None }
}

pub fn int(value: i64) -> Expression {
    literal(Literal::Int(value))
}

pub fn float(value: f64) -> Expression {
    literal(Literal::Float(value))
}

pub fn boolean(value: bool) -> Expression {
    literal(Literal::Bool(value))
}

pub fn text(value: &str) -> Expression {
    literal(Literal::Text(value.to_string()))
}

pub fn none() -> Expression {
    literal(Literal::None)
}

pub fn name(name: &str) -> Expression {
    Expression::Name {
        name: name.to_string(),
        span: None,
    }
}

pub fn list(elements: Vec<Expression>) -> Expression {
    Expression::List {
        elements,
        span: None,
    }
}

pub fn map(entries: Vec<(Expression, Expression)>) -> Expression {
    Expression::Map {
        entries,
        span: None,
    }
}

pub fn index(object: Expression, index: Expression) -> Expression {
    Expression::Index {
        object: Box::new(object),
        index: Box::new(index),
        span: None,
    }
}

pub fn call(callee: Expression, args: Vec<Expression>) -> Expression {
    Expression::Call {
        callee: Box::new(callee),
        args,
        span: None,
    }
}

pub fn binop(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span: None,
    }
}

pub fn add(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::Add, left, right)
}

pub fn sub(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::Subtract, left, right)
}

pub fn mul(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::Multiply, left, right)
}

pub fn div(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::Divide, left, right)
}

pub fn eq(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::Equal, left, right)
}

pub fn ne(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::NotEqual, left, right)
}

pub fn lt(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::LessThan, left, right)
}

pub fn le(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::LessThanOrEqual, left, right)
}

pub fn gt(left: Expression, right: Expression) -> Expression {
    binop(BinaryOperator::GreaterThan, left, right)
}

pub fn unary(op: UnaryOperator, operand: Expression) -> Expression {
    Expression::UnaryOp {
        op,
        operand: Box::new(operand),
        span: None,
    }
}

pub fn neg(operand: Expression) -> Expression {
    unary(UnaryOperator::Negate, operand)
}

/// `then_expr if condition else else_expr`
pub fn cond(condition: Expression, then_expr: Expression, else_expr: Expression) -> Expression {
    Expression::Conditional {
        condition: Box::new(condition),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
        span: None,
    }
}

pub fn lambda(params: &[&str], body: Expression) -> Expression {
    Expression::Lambda {
        params: params.iter().map(|p| p.to_string()).collect(),
        body: Rc::new(body),
        span: None,
    }
}

// =============================================================================
// STATEMENTS
// =============================================================================

pub fn expr(expr: Expression) -> Statement {
    Statement::Expression { expr, span: None }
}

/// `print(args...)` as a statement
pub fn print(args: Vec<Expression>) -> Statement {
    expr(call(name("print"), args))
}

pub fn assign(target: &str, value: Expression) -> Statement {
    assign_to(AssignTarget::Name(target.to_string()), value, false)
}

/// Assignment to a slot the author treats as an integer
pub fn assign_integral(target: &str, value: Expression) -> Statement {
    assign_to(AssignTarget::Name(target.to_string()), value, true)
}

/// `object[key] = value`
pub fn assign_index(object: Expression, key: Expression, value: Expression) -> Statement {
    assign_to(slot(object, key), value, false)
}

pub fn assign_to(target: AssignTarget, value: Expression, integral: bool) -> Statement {
    Statement::Assign {
        target,
        value,
        integral,
        span: None,
    }
}

pub fn aug(target: &str, op: BinaryOperator, value: Expression) -> Statement {
    aug_to(AssignTarget::Name(target.to_string()), op, value, false)
}

pub fn aug_integral(target: &str, op: BinaryOperator, value: Expression) -> Statement {
    aug_to(AssignTarget::Name(target.to_string()), op, value, true)
}

pub fn aug_to(
    target: AssignTarget,
    op: BinaryOperator,
    value: Expression,
    integral: bool,
) -> Statement {
    Statement::AugAssign {
        target,
        op,
        value,
        integral,
        span: None,
    }
}

/// Assignment target `object[key]`
pub fn slot(object: Expression, key: Expression) -> AssignTarget {
    AssignTarget::Index {
        object: Box::new(object),
        index: Box::new(key),
    }
}

pub fn if_(condition: Expression, then_body: Vec<Statement>, else_body: Vec<Statement>) -> Statement {
    Statement::If {
        condition,
        then_body,
        else_body,
        span: None,
    }
}

pub fn while_(condition: Expression, body: Vec<Statement>) -> Statement {
    while_else(condition, body, Vec::new())
}

pub fn while_else(condition: Expression, body: Vec<Statement>, orelse: Vec<Statement>) -> Statement {
    Statement::While {
        condition,
        body,
        orelse,
        span: None,
    }
}

pub fn for_(target: &str, iterable: Expression, body: Vec<Statement>) -> Statement {
    for_else(target, iterable, body, Vec::new())
}

pub fn for_else(
    target: &str,
    iterable: Expression,
    body: Vec<Statement>,
    orelse: Vec<Statement>,
) -> Statement {
    Statement::For {
        target: AssignTarget::Name(target.to_string()),
        iterable,
        body,
        orelse,
        span: None,
    }
}

pub fn break_() -> Statement {
    Statement::Break { span: None }
}

pub fn continue_() -> Statement {
    Statement::Continue { span: None }
}

pub fn return_(value: Expression) -> Statement {
    Statement::Return {
        value: Some(value),
        span: None,
    }
}

pub fn pass() -> Statement {
    Statement::Pass { span: None }
}

pub fn def(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    Statement::FunctionDef {
        name: name.to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
        body: body.into(),
        span: None,
    }
}

pub fn global(names: &[&str]) -> Statement {
    Statement::Global {
        names: names.iter().map(|n| n.to_string()).collect(),
        span: None,
    }
}

pub fn nonlocal(names: &[&str]) -> Statement {
    Statement::Nonlocal {
        names: names.iter().map(|n| n.to_string()).collect(),
        span: None,
    }
}
