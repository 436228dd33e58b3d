//! Runtime errors and their formatting
//!
//! Every evaluator operation fails through [`RuntimeError`]. The language has
//! no catch construct yet, so an error unwinds the whole call chain; keeping a
//! single error type means a handler can be added later without touching the
//! evaluator's signatures.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::ast::SourceSpan;

/// Error kind, named after the corresponding exception of the source language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IndexError,
    KeyError,
    NameError,
    TypeError,
    ZeroDivisionError,
    OverflowError,
    ValueError,
    RecursionError,
    MemoryError,
    SyntaxError,
    SystemError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::IndexError => "IndexError",
            ErrorKind::KeyError => "KeyError",
            ErrorKind::NameError => "NameError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::OverflowError => "OverflowError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::RecursionError => "RecursionError",
            ErrorKind::MemoryError => "MemoryError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::SystemError => "SystemError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed evaluation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Innermost statement that raised the error
    pub span: Option<SourceSpan>,
    /// Functions the error unwound through, innermost first
    pub trace: Vec<String>,
}

pub type EvalResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            span: None,
            trace: Vec::new(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexError, message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyError, message)
    }

    pub fn name(name: &str) -> Self {
        Self::new(ErrorKind::NameError, format!("name '{}' is not defined", name))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ZeroDivisionError, message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OverflowError, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueError, message)
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MemoryError, message)
    }

    /// Attach a span unless a more precise one is already recorded
    pub fn with_span(mut self, span: Option<&SourceSpan>) -> Self {
        if self.span.is_none() {
            self.span = span.cloned();
        }
        self
    }

    /// Record a function frame the error is unwinding through
    pub fn unwound_through(mut self, function: &str) -> Self {
        self.trace.push(function.to_string());
        self
    }
}

/// Format a runtime error as a colored traceback
///
/// `source` is the program text when the front end has it; the offending
/// line is echoed under the location header.
pub fn format_runtime_error(error: &RuntimeError, source: Option<&str>) -> String {
    let mut output = String::new();

    if !error.trace.is_empty() || error.span.is_some() {
        output.push_str(&format!("{}\n", "Traceback (most recent call last):".bold()));
        for function in error.trace.iter().rev() {
            output.push_str(&format!("  {} {}\n", "in".dimmed(), function.cyan()));
        }
    }

    if let Some(span) = &error.span {
        output.push_str(&format!(
            "  {} {}\n",
            "-->".blue().bold(),
            format!("{}:{}", span.line, span.column).cyan()
        ));

        if let Some(line) = source.and_then(|s| s.lines().nth(span.line.saturating_sub(1))) {
            output.push_str(&format!("   {}\n", "|".blue()));
            output.push_str(&format!(
                " {} | {}\n",
                format!("{:3}", span.line).blue().bold(),
                line
            ));
            let indicator = format!("{}^", " ".repeat(span.column.saturating_sub(1)));
            output.push_str(&format!("   {} {}\n", "|".blue(), indicator.red().bold()));
        }
    }

    output.push_str(&format!(
        "{} {}\n",
        format!("{}:", error.kind).red().bold(),
        error.message
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_kind_and_message() {
        let err = RuntimeError::key("'missing'");
        assert_eq!(err.to_string(), "KeyError: 'missing'");
        assert_eq!(
            RuntimeError::name("foo").to_string(),
            "NameError: name 'foo' is not defined"
        );
    }

    #[test]
    fn test_with_span_keeps_innermost() {
        let err = RuntimeError::index("list index out of range")
            .with_span(Some(&SourceSpan::at(4, 2)))
            .with_span(Some(&SourceSpan::at(9, 1)));
        assert_eq!(err.span.unwrap().line, 4);
    }

    #[test]
    fn test_format_includes_trace_and_source_line() {
        colored::control::set_override(false);
        let err = RuntimeError::zero_division("division by zero")
            .with_span(Some(&SourceSpan::at(2, 9)))
            .unwound_through("inner")
            .unwound_through("main");
        let text = format_runtime_error(&err, Some("def f():\n    x = 1 / 0\n"));
        assert!(text.contains("Traceback"));
        assert!(text.find("main").unwrap() < text.find("inner").unwrap());
        assert!(text.contains("x = 1 / 0"));
        assert!(text.contains("ZeroDivisionError: division by zero"));
    }
}
