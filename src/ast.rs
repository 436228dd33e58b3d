//! Abstract Syntax Tree definitions for tern
//!
//! The front end (not part of this crate) produces these nodes; the evaluator
//! only depends on their structure. Every node is serde-serializable so a
//! tree can be handed over as JSON or YAML.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Source location information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub length: usize,
}

impl SourceSpan {
    pub fn at(line: usize, column: usize) -> Self {
        SourceSpan {
            line,
            column,
            offset: 0,
            length: 0,
        }
    }
}

/// A program (one source file)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub statements: Vec<Statement>,
}

/// Assignment target: a plain name or a container slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    /// `name = ...`
    Name(String),
    /// `object[index] = ...`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Expression statement (for side effects)
    Expression {
        expr: Expression,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Assignment: `target = value`
    ///
    /// `integral` marks a slot the author treats as an integer: a Float
    /// result is truncated toward zero before it is stored.
    Assign {
        target: AssignTarget,
        value: Expression,
        #[serde(default)]
        integral: bool,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Augmented assignment: `target op= value`
    AugAssign {
        target: AssignTarget,
        op: BinaryOperator,
        value: Expression,
        #[serde(default)]
        integral: bool,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// `if cond: ... elif ...: ... else: ...` (elif is a nested If in `else_body`)
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        #[serde(default)]
        else_body: Vec<Statement>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// `while cond: body else: orelse`
    While {
        condition: Expression,
        body: Vec<Statement>,
        #[serde(default)]
        orelse: Vec<Statement>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// `for target in iterable: body else: orelse`
    For {
        target: AssignTarget,
        iterable: Expression,
        body: Vec<Statement>,
        #[serde(default)]
        orelse: Vec<Statement>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    Break {
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    Continue {
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// `return` or `return value`
    Return {
        #[serde(default)]
        value: Option<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    Pass {
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Function definition: `def name(params): body`
    FunctionDef {
        name: String,
        params: Vec<String>,
        /// Shared with every closure the definition creates
        body: Rc<[Statement]>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// `global a, b`
    Global {
        names: Vec<String>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// `nonlocal a, b`
    Nonlocal {
        names: Vec<String>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },
}

/// Literal constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    None,
}

/// Expression (produces a value)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal {
        value: Literal,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Variable reference
    Name {
        name: String,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// List literal: `[1, 2, 3]`
    List {
        elements: Vec<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Mapping literal: `{key: value, ...}`
    Map {
        entries: Vec<(Expression, Expression)>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Index access: `list[0]` or `map["key"]`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Call: `callee(args)`; the callee is any expression
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Binary operation: `a + b`, `a == b`, etc.
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Unary operation: `not a`, `-a`
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Conditional expression: `then_expr if condition else else_expr`
    Conditional {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },

    /// Lambda function: `lambda x, y: x + y`
    Lambda {
        params: Vec<String>,
        body: Rc<Expression>,
        #[serde(default)]
        span: Option<SourceSpan>,
    },
}

impl Expression {
    /// Get the span of this expression, if available
    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            Expression::Literal { span, .. } => span.as_ref(),
            Expression::Name { span, .. } => span.as_ref(),
            Expression::List { span, .. } => span.as_ref(),
            Expression::Map { span, .. } => span.as_ref(),
            Expression::Index { span, .. } => span.as_ref(),
            Expression::Call { span, .. } => span.as_ref(),
            Expression::BinaryOp { span, .. } => span.as_ref(),
            Expression::UnaryOp { span, .. } => span.as_ref(),
            Expression::Conditional { span, .. } => span.as_ref(),
            Expression::Lambda { span, .. } => span.as_ref(),
        }
    }
}

impl Statement {
    /// Get the span of this statement, if available
    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            Statement::Expression { span, .. } => span.as_ref(),
            Statement::Assign { span, .. } => span.as_ref(),
            Statement::AugAssign { span, .. } => span.as_ref(),
            Statement::If { span, .. } => span.as_ref(),
            Statement::While { span, .. } => span.as_ref(),
            Statement::For { span, .. } => span.as_ref(),
            Statement::Break { span } => span.as_ref(),
            Statement::Continue { span } => span.as_ref(),
            Statement::Return { span, .. } => span.as_ref(),
            Statement::Pass { span } => span.as_ref(),
            Statement::FunctionDef { span, .. } => span.as_ref(),
            Statement::Global { span, .. } => span.as_ref(),
            Statement::Nonlocal { span, .. } => span.as_ref(),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    FloorDiv, // //
    Modulo,   // %
    Power,    // **

    // Comparison
    Equal,              // ==
    NotEqual,           // !=
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=

    // Membership
    In,    // in
    NotIn, // not in

    // Logical (short-circuit)
    And, // and
    Or,  // or
}

impl BinaryOperator {
    /// Source spelling, used in diagnostics
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "not in",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,    // not
    Negate, // -
    Plus,   // +
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_json_round_trip_keeps_spans() {
        let module = Module {
            statements: vec![Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::Literal {
                    value: Literal::Int(1),
                    span: None,
                },
                integral: false,
                span: Some(SourceSpan::at(3, 5)),
            }],
        };
        let json = serde_json::to_string(&module).unwrap();
        let back: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(back, module);
        assert_eq!(back.statements[0].span().unwrap().line, 3);
    }

    #[test]
    fn test_optional_fields_default_when_missing() {
        let json = r#"{"statements": [{"Pass": {}}, {"Break": {}}]}"#;
        let module: Module = serde_json::from_str(json).unwrap();
        assert_eq!(module.statements.len(), 2);
        assert!(module.statements[0].span().is_none());
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(BinaryOperator::FloorDiv.to_string(), "//");
        assert_eq!(BinaryOperator::NotIn.symbol(), "not in");
    }
}
